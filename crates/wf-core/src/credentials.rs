//! Named credential lookup
//!
//! The pipeline references credentials by name (`credentials: aws_credentials`).
//! A [`CredentialStore`] turns that name into a [`Credentials`] value; where
//! the secrets actually live is up to the store implementation.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::fmt;

/// Resolved credentials for an external system
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Object-storage access key pair
    KeyPair {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// Opaque connection string
    ConnectionString(String),
}

impl Credentials {
    /// Build an access key pair without a session token
    pub fn key_pair(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Credentials::KeyPair {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

// Secrets must never reach logs through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::KeyPair { access_key_id, .. } => f
                .debug_struct("KeyPair")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"***")
                .finish_non_exhaustive(),
            Credentials::ConnectionString(_) => f.write_str("ConnectionString(***)"),
        }
    }
}

/// Lookup of credentials by reference name
pub trait CredentialStore: Send + Sync {
    /// Resolve a credential reference
    fn resolve(&self, name: &str) -> CoreResult<Credentials>;
}

/// Credentials held in memory, keyed by reference name
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialStore {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials under a reference name
    pub fn with(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(name.into(), credentials);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn resolve(&self, name: &str) -> CoreResult<Credentials> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::CredentialNotFound {
                name: name.to_string(),
                reason: "no entry registered".to_string(),
            })
    }
}

/// Credentials read from environment variables.
///
/// A reference `aws_credentials` resolves to:
/// - `AWS_CREDENTIALS_ACCESS_KEY_ID` + `AWS_CREDENTIALS_SECRET_ACCESS_KEY`
///   (+ optional `AWS_CREDENTIALS_SESSION_TOKEN`) as a key pair, or
/// - `AWS_CREDENTIALS_CONNECTION_STRING` as a connection string.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialStore {
    prefix: Option<String>,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a fixed prefix (`WHARF` gives `WHARF_AWS_CREDENTIALS_...`)
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn var_name(&self, name: &str, suffix: &str) -> String {
        let base: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        match &self.prefix {
            Some(prefix) => format!("{}_{}_{}", prefix, base, suffix),
            None => format!("{}_{}", base, suffix),
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn resolve(&self, name: &str) -> CoreResult<Credentials> {
        let key_var = self.var_name(name, "ACCESS_KEY_ID");
        let secret_var = self.var_name(name, "SECRET_ACCESS_KEY");

        match (std::env::var(&key_var), std::env::var(&secret_var)) {
            (Ok(access_key_id), Ok(secret_access_key)) => Ok(Credentials::KeyPair {
                access_key_id,
                secret_access_key,
                session_token: std::env::var(self.var_name(name, "SESSION_TOKEN")).ok(),
            }),
            (Ok(_), Err(_)) => Err(CoreError::CredentialNotFound {
                name: name.to_string(),
                reason: format!("{} is set but {} is missing", key_var, secret_var),
            }),
            _ => {
                let conn_var = self.var_name(name, "CONNECTION_STRING");
                std::env::var(&conn_var)
                    .map(Credentials::ConnectionString)
                    .map_err(|_| CoreError::CredentialNotFound {
                        name: name.to_string(),
                        reason: format!("set {} and {}, or {}", key_var, secret_var, conn_var),
                    })
            }
        }
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
