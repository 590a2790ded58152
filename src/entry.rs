//! Directory entries and the Active Directory attributes we touch.

use std::collections::HashMap;

use ldap3::SearchEntry;

use crate::error::{Error, Result};

/// Attribute names used by the rotation workflow.
pub mod field {
    pub const DISTINGUISHED_NAME: &str = "distinguishedName";
    pub const USER_PRINCIPAL_NAME: &str = "userPrincipalName";
    pub const PASSWORD_LAST_SET: &str = "pwdLastSet";
    pub const USER_ACCOUNT_CONTROL: &str = "userAccountControl";
    pub const UNICODE_PASSWORD: &str = "unicodePwd";
}

/// An object returned by a directory search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    attrs: HashMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add values to an attribute.
    pub fn with(mut self, name: &str, values: &[&str]) -> Self {
        self.attrs
            .entry(name.to_owned())
            .or_default()
            .extend(values.iter().map(|v| (*v).to_owned()));
        self
    }

    /// Get attribute values. LDAP attribute names are case-insensitive.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Get the value of an attribute that must hold exactly one value.
    pub fn single(&self, name: &'static str) -> Result<&str> {
        let values = self.get(name).ok_or_else(|| Error::MissingAttribute {
            dn: self.dn.clone(),
            attribute: name,
        })?;

        match values {
            [value] => Ok(value.as_str()),
            _ => Err(Error::InvalidAttribute {
                attribute: name,
                details: format!("expected only one value, but received {values:?}"),
            }),
        }
    }
}

impl From<SearchEntry> for Entry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let entry = Entry::new("CN=svc").with("pwdlastset", &["0"]);
        assert_eq!(entry.get(field::PASSWORD_LAST_SET).unwrap(), ["0"]);
    }

    #[test]
    fn test_single_value() {
        let entry = Entry::new("CN=svc")
            .with(field::USER_ACCOUNT_CONTROL, &["512"])
            .with(field::PASSWORD_LAST_SET, &["1", "2"]);

        assert_eq!(entry.single(field::USER_ACCOUNT_CONTROL).unwrap(), "512");
        assert!(matches!(
            entry.single(field::PASSWORD_LAST_SET),
            Err(Error::InvalidAttribute { .. })
        ));
        assert!(matches!(
            entry.single(field::UNICODE_PASSWORD),
            Err(Error::MissingAttribute { .. })
        ));
    }
}
