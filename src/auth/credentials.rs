//! OS keychain storage for remembered login passwords.
//!
//! Separate from the session store: the vault holds the password a user
//! chose to remember for re-login, while the session store holds the
//! credentials the server granted.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "coffer";

pub struct PasswordVault;

impl PasswordVault {
    /// Remember a password for a username in the OS keychain
    pub fn remember(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Look up the remembered password for a username, if any
    pub fn lookup(username: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    /// Forget the remembered password for a username
    pub fn forget(username: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}
