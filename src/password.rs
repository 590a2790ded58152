//! Password generation.

use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;

use crate::config::Rotation;
use crate::error::{ConfigError, Error, Result};

const PLACEHOLDER: &str = "{{PASSWORD}}";

/// Generate a random alphanumeric password of `password_length` characters,
/// wrapped by `password_formatter` if one is set.
pub fn generate_password(rotation: &Rotation) -> Result<String> {
    let Some(formatter) = &rotation.password_formatter else {
        return Ok(Alphanumeric.sample_string(&mut OsRng, rotation.password_length));
    };

    if formatter.matches(PLACEHOLDER).count() != 1 {
        return Err(Error::InvalidFormatter);
    }

    let fixed = formatter.chars().count() - PLACEHOLDER.len();
    if fixed >= rotation.password_length {
        return Err(ConfigError::PasswordLength {
            minimum: fixed + 1,
            got: rotation.password_length,
        }
        .into());
    }

    let random = Alphanumeric.sample_string(&mut OsRng, rotation.password_length - fixed);
    Ok(formatter.replacen(PLACEHOLDER, &random, 1))
}
