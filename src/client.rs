//! Directory operations needed by the rotation workflow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Ldap as Conf;
use crate::entry::{Entry, field};
use crate::error::{Error, Result};
use crate::flags::{ACCOUNTDISABLE, Bits};
use crate::ldap::{Ldap, build_filter, encode_password};
use crate::ticks::parse_ticks;

/// Port for the directory operations used by rotation.
///
/// Every call may fail transiently. Implementations must be reentrant.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Find a service account by user principal name under `user_dn`.
    async fn get(&self, conf: &Conf, account: &str) -> Result<Entry>;

    /// Find the bind entry, authenticating with `conf`'s own credentials.
    async fn get_root(&self, conf: &Conf) -> Result<Entry>;

    /// Last time the account password was set, `None` if never rotated.
    async fn password_last_set(
        &self,
        conf: &Conf,
        account: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Set a service account password.
    async fn update_password(
        &self,
        conf: &Conf,
        account: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Set the password of the bind identity itself.
    async fn update_root_password(
        &self,
        conf: &Conf,
        bind_dn: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Replace `userAccountControl` of a service account.
    async fn update_account_control(
        &self,
        conf: &Conf,
        account: &str,
        flags: Bits,
    ) -> Result<()>;
}

/// [`DirectoryClient`] over LDAP. Opens one connection per operation.
#[derive(Debug, Default, Clone)]
pub struct SecretsClient;

impl SecretsClient {
    pub fn new() -> Self {
        Self
    }

    async fn find_one(
        &self,
        conf: &Conf,
        base: &str,
        filter: (&str, &str),
    ) -> Result<Entry> {
        let mut ldap = Ldap::connect(conf).await?;
        let found = search_one(&mut ldap, base, filter).await;
        release(ldap, found).await
    }

    /// Search and modify over a single bind.
    async fn replace(
        &self,
        conf: &Conf,
        base: &str,
        filter: (&str, &str),
        changes: Vec<(&str, Vec<u8>)>,
    ) -> Result<()> {
        let mut ldap = Ldap::connect(conf).await?;
        let changed = match search_one(&mut ldap, base, filter).await {
            Ok(entry) => ldap.replace(&entry.dn, changes).await,
            Err(err) => Err(err),
        };
        release(ldap, changed).await
    }

    /// Disable the account if it is not already disabled.
    pub async fn disable_account(&self, conf: &Conf, account: &str) -> Result<()> {
        set_disabled(self, conf, account, true).await
    }

    /// Enable the account if it is not already enabled.
    pub async fn enable_account(&self, conf: &Conf, account: &str) -> Result<()> {
        set_disabled(self, conf, account, false).await
    }
}

#[async_trait]
impl DirectoryClient for SecretsClient {
    async fn get(&self, conf: &Conf, account: &str) -> Result<Entry> {
        self.find_one(conf, &conf.user_dn, (field::USER_PRINCIPAL_NAME, account))
            .await
    }

    async fn get_root(&self, conf: &Conf) -> Result<Entry> {
        self.find_one(conf, &conf.bind_dn, (field::DISTINGUISHED_NAME, &conf.bind_dn))
            .await
            .map_err(bind_entry_error)
    }

    async fn password_last_set(
        &self,
        conf: &Conf,
        account: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let entry = self.get(conf, account).await?;
        password_last_set_of(&entry)
    }

    async fn update_password(
        &self,
        conf: &Conf,
        account: &str,
        new_password: &str,
    ) -> Result<()> {
        self.replace(
            conf,
            &conf.user_dn,
            (field::USER_PRINCIPAL_NAME, account),
            vec![encode_password(new_password)],
        )
        .await
    }

    async fn update_root_password(
        &self,
        conf: &Conf,
        bind_dn: &str,
        new_password: &str,
    ) -> Result<()> {
        // The bind account may live outside `user_dn` (e.g. a "Security" OU
        // while managed users sit in "Accounting"), so search from itself.
        self.replace(
            conf,
            bind_dn,
            (field::DISTINGUISHED_NAME, bind_dn),
            vec![encode_password(new_password)],
        )
        .await
        .map_err(bind_entry_error)
    }

    async fn update_account_control(
        &self,
        conf: &Conf,
        account: &str,
        flags: Bits,
    ) -> Result<()> {
        tracing::debug!(%account, uac = %format!("{flags:x}"), "updating account control");
        self.replace(
            conf,
            &conf.user_dn,
            (field::USER_PRINCIPAL_NAME, account),
            vec![(field::USER_ACCOUNT_CONTROL, flags.0.to_string().into_bytes())],
        )
        .await
    }
}

/// Search `base` for exactly one entry matching `filter`.
async fn search_one(ldap: &mut Ldap, base: &str, filter: (&str, &str)) -> Result<Entry> {
    let entries = ldap.search(base, &[filter]).await?;
    single_match(entries, filter)
}

fn single_match(entries: Vec<Entry>, filter: (&str, &str)) -> Result<Entry> {
    match <[Entry; 1]>::try_from(entries) {
        Ok([entry]) => Ok(entry),
        Err(entries) if entries.is_empty() => Err(Error::AccountNotFound(filter.1.to_owned())),
        Err(entries) => Err(Error::AmbiguousAccount {
            filter: build_filter(&[filter]),
            count: entries.len(),
        }),
    }
}

/// Unbind whatever `result` holds. A failed unbind does not undo the
/// operation, so it is only logged.
async fn release<T>(ldap: Ldap, result: Result<T>) -> Result<T> {
    if let Err(err) = ldap.unbind().await {
        tracing::warn!(error = %err, "unbind failed");
    }
    result
}

/// Lookups of the bind identity report a missing entry as such, not as a
/// service account.
fn bind_entry_error(err: Error) -> Error {
    match err {
        Error::AccountNotFound(dn) => Error::BindEntryNotFound(dn),
        err => err,
    }
}

/// Read `pwdLastSet` from an entry. `"0"` means the password was only ever
/// set at creation.
pub fn password_last_set_of(entry: &Entry) -> Result<Option<DateTime<Utc>>> {
    match entry.single(field::PASSWORD_LAST_SET)? {
        "0" => Ok(None),
        ticks => parse_ticks(ticks).map(Some),
    }
}

/// Read `userAccountControl` from an entry.
pub fn account_control_of(entry: &Entry) -> Result<Bits> {
    entry
        .single(field::USER_ACCOUNT_CONTROL)?
        .parse()
        .map_err(|err| Error::invalid(field::USER_ACCOUNT_CONTROL, err))
}

/// Read-modify-write of the `ACCOUNTDISABLE` bit. Writes only on change.
pub async fn set_disabled(
    client: &dyn DirectoryClient,
    conf: &Conf,
    account: &str,
    disabled: bool,
) -> Result<()> {
    let entry = client.get(conf, account).await?;
    let mut uac = account_control_of(&entry)?;

    if uac.has(ACCOUNTDISABLE) == disabled {
        tracing::debug!(%account, uac = %format!("{uac:x}"), disabled, "account control already set");
        return Ok(());
    }

    tracing::debug!(%account, uac = %format!("{uac:x}"), disabled, "account control before update");
    if disabled {
        uac.add(ACCOUNTDISABLE);
    } else {
        uac.clear(ACCOUNTDISABLE);
    }

    client.update_account_control(conf, account, uac).await
}
