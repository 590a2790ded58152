//! Error handler for adsecrets.

use ldap3::LdapError;
use thiserror::Error;

use crate::cancel::CancelReason;
use crate::config::Ldap;

pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing directory and rotation errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("LDAP request failed: {0}")]
    Ldap(#[from] LdapError),

    #[error("invalid configuration, {0}")]
    Config(#[from] ConfigError),

    #[error(
        "unable to find service account named {0} in active directory, searches are case sensitive"
    )]
    AccountNotFound(String),

    #[error("bind entry {0} not found, check `bind_dn`")]
    BindEntryNotFound(String),

    #[error("expected one matching account for {filter}, but received {count}")]
    AmbiguousAccount { filter: String, count: usize },

    #[error("{dn} lacks a {attribute} field")]
    MissingAttribute { dn: String, attribute: &'static str },

    #[error("invalid value for {attribute}: {details}")]
    InvalidAttribute {
        attribute: &'static str,
        details: String,
    },

    #[error("password of {0} was written but `pwdLastSet` did not advance")]
    PasswordNotUpdated(String),

    #[error("root password rotation could not be confirmed, rolled back")]
    RotationUnconfirmed(#[source] Box<Error>),

    /// The directory most likely still holds the password in `unconfirmed`.
    #[error(
        "root password rotation could not be confirmed and rollback stopped ({reason}), directory may hold the new password"
    )]
    RollbackAbandoned {
        reason: CancelReason,
        unconfirmed: Box<Ldap>,
    },

    #[error("password formatter must contain `{{{{PASSWORD}}}}` exactly once")]
    InvalidFormatter,

    #[error("request was cancelled")]
    Cancelled,
}

/// Errors that may occur during the configuration loading process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("URL is invalid: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported URL scheme `{0}`, expected ldap or ldaps")]
    Scheme(String),
    #[error("failed to deserialize `config.yaml`: {0}")]
    Deserialize(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing `{0}` entry on `config.yaml` file")]
    Missing(&'static str),
    #[error("password length must be at least {minimum}, got {got}")]
    PasswordLength { minimum: usize, got: usize },
}

impl Error {
    /// Create an [`Error::InvalidAttribute`] from any displayable error.
    pub fn invalid(attribute: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidAttribute {
            attribute,
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_message() {
        assert_eq!(
            Error::InvalidFormatter.to_string(),
            "password formatter must contain `{{PASSWORD}}` exactly once"
        );
    }

    #[test]
    fn test_config_error_wraps() {
        let err: Error = ConfigError::Missing("ldap").into();
        assert_eq!(
            err.to_string(),
            "invalid configuration, missing `ldap` entry on `config.yaml` file"
        );
    }
}
