//! Configuration manager for adsecrets.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_REQUEST_TIMEOUT: u64 = 90;
const DEFAULT_PASSWORD_LENGTH: usize = 64;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);
/// Active Directory complexity rules are not met below this length.
pub const MIN_PASSWORD_LENGTH: usize = 14;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Related to directory connection and bind identity.
    pub ldap: Option<Ldap>,
    /// Related to password generation and rollback cadence.
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(skip)]
    path: PathBuf,
}

/// Directory connection parameters and bind identity.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Ldap {
    /// `ldap://` or `ldaps://` URL of a domain controller.
    pub url: String,
    /// Distinguished name used to bind, and subject of root rotation.
    pub bind_dn: String,
    /// Password credential to connect.
    pub bind_password: String,
    /// Search base for managed service accounts.
    pub user_dn: String,
    /// Upgrade a plain `ldap://` connection with StartTLS.
    #[serde(default)]
    pub start_tls: bool,
    /// Skip certificate verification.
    #[serde(default)]
    pub insecure_tls: bool,
    /// Seconds before a single LDAP operation times out.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Password generation and retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Total length of generated passwords.
    #[serde(default = "default_password_length")]
    pub password_length: usize,
    /// Template containing `{{PASSWORD}}`, e.g. to add a fixed prefix.
    pub password_formatter: Option<String>,
    /// Pause between two rollback attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_password_length() -> usize {
    DEFAULT_PASSWORD_LENGTH
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            password_length: DEFAULT_PASSWORD_LENGTH,
            password_formatter: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Rotation {
    /// Delay between rollback attempts, never below 10 milliseconds.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms).max(MIN_RETRY_DELAY)
    }
}

// Never print the bind password.
impl std::fmt::Debug for Ldap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ldap")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<redacted>")
            .field("user_dn", &self.user_dn)
            .field("start_tls", &self.start_tls)
            .field("insecure_tls", &self.insecure_tls)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Ldap {
    /// Copy of this configuration authenticating with another password.
    pub fn with_bind_password(&self, password: impl Into<String>) -> Self {
        Self {
            bind_password: password.into(),
            ..self.clone()
        }
    }

    /// Timeout applied to every LDAP operation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Check that the URL is an LDAP one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ldap" | "ldaps" => Ok(()),
            scheme => Err(ConfigError::Scheme(scheme.to_owned())),
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Self, ConfigError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let config: Configuration = serde_yaml::from_reader(file)?;
                config.validate()?;
                Ok(config)
            },
            Err(err) => {
                tracing::error!(error = %err, path = %file_path.display(), "`config.yaml` file not found");
                Ok(Self::default())
            },
        }
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Return the `ldap` section or fail.
    pub fn ldap(&self) -> Result<&Ldap, ConfigError> {
        self.ldap.as_ref().ok_or(ConfigError::Missing("ldap"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ldap) = &self.ldap {
            ldap.validate()?;
        }

        if self.rotation.password_length < MIN_PASSWORD_LENGTH {
            return Err(ConfigError::PasswordLength {
                minimum: MIN_PASSWORD_LENGTH,
                got: self.rotation.password_length,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
ldap:
  url: ldaps://dc.example.com
  bind_dn: CN=vault,OU=Security,DC=example,DC=com
  bind_password: hunter2
  user_dn: OU=Accounting,DC=example,DC=com
rotation:
  password_formatter: "pre{{PASSWORD}}"
  retry_delay_ms: 250
"#;

    #[test]
    fn test_read_yaml() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let ldap = config.ldap().unwrap();

        assert_eq!(ldap.bind_dn, "CN=vault,OU=Security,DC=example,DC=com");
        assert!(!ldap.start_tls);
        assert_eq!(ldap.timeout(), Duration::from_secs(90));
        assert_eq!(config.rotation.password_length, 64);
        assert_eq!(config.rotation.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_reject_http_url() {
        let yaml = CONFIG.replace("ldaps://", "https://");
        assert!(matches!(
            Configuration::from_yaml(&yaml),
            Err(ConfigError::Scheme(scheme)) if scheme == "https"
        ));
    }

    #[test]
    fn test_reject_short_password() {
        let yaml = format!("{CONFIG}  password_length: 8\n");
        assert!(matches!(
            Configuration::from_yaml(&yaml),
            Err(ConfigError::PasswordLength { got: 8, .. })
        ));
    }

    #[test]
    fn test_retry_delay_clamped() {
        let rotation = Rotation {
            retry_delay_ms: 0,
            ..Default::default()
        };
        assert_eq!(rotation.retry_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_missing_ldap() {
        let config = Configuration::default();
        assert!(matches!(config.ldap(), Err(ConfigError::Missing("ldap"))));
    }

    #[test]
    fn test_with_bind_password() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let ldap = config.ldap().unwrap();
        let rotated = ldap.with_bind_password("new");

        assert_eq!(rotated.bind_password, "new");
        assert_eq!(ldap.bind_password, "hunter2");
        assert_eq!(rotated.url, ldap.url);
    }
}
