//! LDAP support.

use std::collections::HashSet;

use ldap3::{Ldap as Ldap3, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};

use crate::config;
use crate::entry::{Entry, field};
use crate::error::Result;

/// Bound LDAP connection.
#[derive(Debug)]
pub struct Ldap {
    conn: Ldap3,
}

impl Ldap {
    /// Open a new connection and bind with the configured identity.
    pub async fn connect(config: &config::Ldap) -> Result<Self> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.timeout())
            .set_starttls(config.start_tls)
            .set_no_tls_verify(config.insecure_tls);

        let (handle, mut conn) =
            LdapConnAsync::with_settings(settings, &config.url).await?;
        ldap3::drive!(handle);

        conn.with_timeout(config.timeout())
            .simple_bind(&config.bind_dn, &config.bind_password)
            .await?
            .success()?;

        Ok(Self { conn })
    }

    /// Search the subtree under `base` for entries matching every
    /// `(attribute, value)` pair.
    pub async fn search(
        &mut self,
        base: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Entry>> {
        let filter = build_filter(filters);
        tracing::debug!(%base, %filter, "searching directory");

        let (results, _) = self
            .conn
            .search(base, Scope::Subtree, &filter, vec!["*"])
            .await?
            .success()?;

        Ok(results
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).into())
            .collect())
    }

    /// Replace attributes of the entry at `dn`.
    pub async fn replace(
        &mut self,
        dn: &str,
        changes: Vec<(&str, Vec<u8>)>,
    ) -> Result<()> {
        let mods = changes
            .into_iter()
            .map(|(attr, value)| {
                Mod::Replace(attr.as_bytes().to_vec(), HashSet::from([value]))
            })
            .collect();

        self.conn.modify(dn, mods).await?.success()?;
        Ok(())
    }

    /// Close the connection.
    pub async fn unbind(mut self) -> Result<()> {
        self.conn.unbind().await?;
        Ok(())
    }
}

/// Build an equality filter, joined with `&` when there are several pairs.
pub fn build_filter(filters: &[(&str, &str)]) -> String {
    let parts: String = filters
        .iter()
        .map(|(attr, value)| format!("({attr}={})", escape_ldap(value)))
        .collect();

    if filters.len() == 1 {
        parts
    } else {
        format!("(&{parts})")
    }
}

/// Encode a password for `unicodePwd`: UTF-16LE of the double-quoted value.
pub fn encode_password(password: &str) -> (&'static str, Vec<u8>) {
    let quoted = format!("\"{password}\"");
    let bytes = quoted.encode_utf16().flat_map(u16::to_le_bytes).collect();
    (field::UNICODE_PASSWORD, bytes)
}

fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape_ldap("a*(b)\\"), r"a\2a\28b\29\5c");
        assert_eq!(escape_ldap("jöhn@example.com"), "jöhn@example.com");
    }

    #[test]
    fn test_filter() {
        assert_eq!(
            build_filter(&[(field::USER_PRINCIPAL_NAME, "svc@example.com")]),
            "(userPrincipalName=svc@example.com)"
        );
        assert_eq!(
            build_filter(&[("cn", "a"), ("sn", "b*")]),
            r"(&(cn=a)(sn=b\2a))"
        );
    }

    #[test]
    fn test_encode_password() {
        let (attr, bytes) = encode_password("ab");
        assert_eq!(attr, "unicodePwd");
        assert_eq!(bytes, [b'"', 0, b'a', 0, b'b', 0, b'"', 0]);
    }
}
