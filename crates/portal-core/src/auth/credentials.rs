use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "exec-portal";

/// Remembered sign-in passwords in the OS keychain, keyed by email.
pub struct CredentialStore;

impl CredentialStore {
    /// Store a password for an email in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Remembered password for an email, `None` if nothing is stored
    pub fn get_password(email: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Forget the stored password; a missing entry is not an error
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
