//! adsecrets rotates Active Directory passwords.
//!
//! Root (bind) credentials are rotated with confirmation, and rolled back
//! with an unbounded, cancellable retry loop when the confirmation fails.

#![forbid(unsafe_code)]

pub mod cancel;
pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod flags;
mod ldap;
pub mod password;
pub mod rotation;
pub mod telemetry;
pub mod ticks;

pub use cancel::{CancelReason, RequestContext};
pub use client::{DirectoryClient, SecretsClient};
pub use config::Configuration;
pub use error::{Error, Result};
pub use rotation::Rotator;
