//! Root and service account password rotation.
//!
//! Forward rotations are verified after the write. When a new root password
//! cannot be confirmed, the previous one is re-applied by
//! [`Rotator::roll_back_password`], which retries without an attempt cap
//! until the directory accepts it or the request context ends.

use std::sync::Arc;

use crate::cancel::{CancelReason, RequestContext};
use crate::client::DirectoryClient;
use crate::config::{Ldap, Rotation};
use crate::error::{Error, Result};
use crate::password::generate_password;

/// Terminal state of a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Confirmed,
    Cancelled,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Confirmed => "confirmed",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Drives password changes against a [`DirectoryClient`].
#[derive(Clone)]
pub struct Rotator {
    client: Arc<dyn DirectoryClient>,
    rotation: Rotation,
}

impl Rotator {
    pub fn new(client: Arc<dyn DirectoryClient>, rotation: Rotation) -> Self {
        Self { client, rotation }
    }

    /// Re-apply `previous_password` to the bind identity of `conf`.
    ///
    /// A first successful attempt returns without waiting. Failed attempts
    /// are retried every `retry_delay` for as long as `ctx` is live. When
    /// `ctx` ends the loop stops and still returns `Ok(())`: callers tell a
    /// confirmed rollback from an abandoned one through `ctx.err()`.
    #[tracing::instrument(skip_all, fields(bind_dn = %conf.bind_dn))]
    pub async fn roll_back_password(
        &self,
        ctx: &RequestContext,
        conf: &Ldap,
        previous_password: &str,
    ) -> Result<()> {
        self.roll_back(ctx, conf, previous_password).await;
        Ok(())
    }

    async fn roll_back(
        &self,
        ctx: &RequestContext,
        conf: &Ldap,
        previous_password: &str,
    ) -> Outcome {
        let delay = self.rotation.retry_delay();
        let mut attempt: u64 = 0;

        let outcome = loop {
            attempt += 1;
            metrics::counter!("rollback_attempts_total").increment(1);

            let err = match self
                .client
                .update_root_password(conf, &conf.bind_dn, previous_password)
                .await
            {
                Ok(()) => break Outcome::Confirmed,
                Err(err) => err,
            };

            tracing::debug!(attempt, error = %err, "rollback attempt failed");

            if !ctx.sleep(delay).await {
                let reason = ctx.err().map(|r| r.to_string()).unwrap_or_default();
                tracing::warn!(attempt, last_error = %err, %reason, "rollback stopped before confirmation");
                break Outcome::Cancelled;
            }
        };

        if outcome == Outcome::Confirmed {
            tracing::info!(attempt, "root password rolled back");
        }
        metrics::counter!("rollback_total", "outcome" => outcome.as_str()).increment(1);

        outcome
    }

    /// Rotate the bind identity's password and return the configuration
    /// carrying the new one.
    ///
    /// The change is confirmed by reading the bind entry with the new
    /// credentials. On failure the old password is rolled back; if the
    /// context ends before the rollback lands, [`Error::RollbackAbandoned`]
    /// hands back the configuration with the new password.
    #[tracing::instrument(skip_all, fields(bind_dn = %conf.bind_dn))]
    pub async fn rotate_root_credentials(
        &self,
        ctx: &RequestContext,
        conf: &Ldap,
    ) -> Result<Ldap> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let new_password = generate_password(&self.rotation)?;
        if let Err(err) = self
            .client
            .update_root_password(conf, &conf.bind_dn, &new_password)
            .await
        {
            record_rotation("root", "failed");
            return Err(err);
        }

        // From here on only the new password is known to work.
        let rotated = conf.with_bind_password(new_password);

        match self.client.get_root(&rotated).await {
            Ok(_) => {
                tracing::info!("root password rotated");
                record_rotation("root", "rotated");
                Ok(rotated)
            },
            Err(err) => {
                tracing::error!(error = %err, "root password rotation unconfirmed, rolling back");
                match self.roll_back(ctx, &rotated, &conf.bind_password).await {
                    Outcome::Confirmed => {
                        record_rotation("root", "rolled_back");
                        Err(Error::RotationUnconfirmed(Box::new(err)))
                    },
                    // Rollback gave up: the new password is the only one known to work.
                    Outcome::Cancelled => {
                        record_rotation("root", "abandoned");
                        Err(Error::RollbackAbandoned {
                            reason: ctx.err().unwrap_or(CancelReason::Cancelled),
                            unconfirmed: Box::new(rotated),
                        })
                    },
                }
            },
        }
    }

    /// Set a new password on a service account and check that `pwdLastSet`
    /// moved forward. Returns the new password.
    #[tracing::instrument(skip_all, fields(%account))]
    pub async fn rotate_account_password(
        &self,
        ctx: &RequestContext,
        conf: &Ldap,
        account: &str,
    ) -> Result<String> {
        let before = self.client.password_last_set(conf, account).await?;

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let new_password = generate_password(&self.rotation)?;
        if let Err(err) = self
            .client
            .update_password(conf, account, &new_password)
            .await
        {
            record_rotation("account", "failed");
            return Err(err);
        }

        let after = self.client.password_last_set(conf, account).await?;
        if after <= before {
            tracing::error!(?before, ?after, "password write not reflected by directory");
            record_rotation("account", "unconfirmed");
            return Err(Error::PasswordNotUpdated(account.to_owned()));
        }

        tracing::info!(last_set = ?after, "service account password rotated");
        record_rotation("account", "rotated");
        Ok(new_password)
    }
}

fn record_rotation(kind: &'static str, status: &'static str) {
    metrics::counter!("rotations_total", "kind" => kind, "status" => status)
        .increment(1);
}
