//! API token lookup for a configured target.
//!
//! Tokens come from an environment variable or the OS keyring (service
//! `jenx`). jenx only reads secrets; storing them is left to the keyring's
//! own tooling.

use crate::config::{CredentialKind, Target};

const KEYRING_SERVICE: &str = "jenx";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential ref is required")]
    EmptyReference,
    #[error("{kind} credential {reference:?} not found for target {target:?}")]
    NotFound {
        kind: &'static str,
        reference: String,
        target: String,
    },
    #[error("read keyring credential {reference:?} for target {target:?}: {source}")]
    Keyring {
        reference: String,
        target: String,
        #[source]
        source: keyring::Error,
    },
}

/// Read-only secret source keyed by a reference string.
pub trait SecretStore {
    /// `Ok(None)` when the reference has no value.
    fn get(&self, reference: &str) -> Result<Option<String>, keyring::Error>;
}

/// Tokens from environment variables; empty values count as missing.
#[derive(Debug, Default)]
pub struct EnvStore;

impl SecretStore for EnvStore {
    fn get(&self, reference: &str) -> Result<Option<String>, keyring::Error> {
        Ok(std::env::var(reference).ok().filter(|v| !v.is_empty()))
    }
}

/// Tokens from the platform keyring.
#[derive(Debug)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, reference: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(&self.service, reference)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Resolve the API token for `target` from the store its credential names.
pub fn resolve_token(target: &Target) -> Result<String, CredentialError> {
    match target.credential.kind {
        CredentialKind::Env => resolve_with(&EnvStore, target),
        CredentialKind::Keyring => resolve_with(&KeyringStore::default(), target),
    }
}

pub fn resolve_with(store: &dyn SecretStore, target: &Target) -> Result<String, CredentialError> {
    let reference = target.credential.reference.trim();
    if reference.is_empty() {
        return Err(CredentialError::EmptyReference);
    }
    match store.get(reference) {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(CredentialError::NotFound {
            kind: target.credential.kind.as_str(),
            reference: reference.to_string(),
            target: target.name.clone(),
        }),
        Err(source) => Err(CredentialError::Keyring {
            reference: reference.to_string(),
            target: target.name.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    fn target(kind: CredentialKind, reference: &str) -> Target {
        Target {
            id: "prod".into(),
            name: "Production".into(),
            host: "https://ci.example.com".into(),
            username: "bot".into(),
            insecure_skip_tls_verify: false,
            credential: Credential {
                kind,
                reference: reference.into(),
            },
        }
    }

    struct Fixed(Option<&'static str>);

    impl SecretStore for Fixed {
        fn get(&self, _reference: &str) -> Result<Option<String>, keyring::Error> {
            Ok(self.0.map(str::to_string))
        }
    }

    #[test]
    fn env_store_reads_variable() {
        std::env::set_var("JENX_TEST_TOKEN_PRESENT", "abc123");
        let t = target(CredentialKind::Env, "JENX_TEST_TOKEN_PRESENT");
        assert_eq!(resolve_token(&t).unwrap(), "abc123");
    }

    #[test]
    fn env_store_missing_variable_names_target() {
        let t = target(CredentialKind::Env, "JENX_TEST_TOKEN_MISSING");
        let err = resolve_token(&t).unwrap_err();
        assert!(matches!(err, CredentialError::NotFound { kind: "env", .. }));
        let msg = err.to_string();
        assert!(msg.contains("JENX_TEST_TOKEN_MISSING") && msg.contains("Production"), "{msg}");
    }

    #[test]
    fn empty_reference_rejected() {
        let t = target(CredentialKind::Keyring, "  ");
        assert!(matches!(
            resolve_with(&Fixed(Some("x")), &t),
            Err(CredentialError::EmptyReference)
        ));
    }

    #[test]
    fn store_value_returned() {
        let t = target(CredentialKind::Keyring, "jenx/prod");
        assert_eq!(resolve_with(&Fixed(Some("tok")), &t).unwrap(), "tok");
        assert!(resolve_with(&Fixed(None), &t).is_err());
    }
}
