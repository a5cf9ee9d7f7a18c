//! Secret store for instance bootstrap payloads.

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::fmt;
use thiserror::Error;

/// Key of the bootstrap payload inside its Secret
pub const BOOTSTRAP_DATA_KEY: &str = "value";

/// Secret lookup failures
#[derive(Debug, Error)]
pub enum SecretError {
    /// No such Secret
    #[error("secret {namespace}/{name} not found")]
    NotFound {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
    },

    /// Secret exists without the expected key
    #[error("secret {namespace}/{name} has no key {key}")]
    KeyMissing {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
        /// Missing key
        key: String,
    },

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

/// Read-only access to bootstrap payloads
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Raw bytes stored under the bootstrap key of `namespace/name`
    async fn get(&self, namespace: &str, name: &str) -> Result<Vec<u8>, SecretError>;
}

/// Secrets read from the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    /// Store reading through `client`
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Vec<u8>, SecretError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?.ok_or_else(|| SecretError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;
        secret
            .data
            .and_then(|mut data| data.remove(BOOTSTRAP_DATA_KEY))
            .map(|bytes| bytes.0)
            .ok_or_else(|| SecretError::KeyMissing {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: BOOTSTRAP_DATA_KEY.to_string(),
            })
    }
}

/// Secrets held in memory, keyed by `namespace/name`
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, namespace: &str, name: &str, value: &[u8]) {
        self.secrets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(format!("{namespace}/{name}"), value.to_vec());
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Vec<u8>, SecretError> {
        self.secrets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&format!("{namespace}/{name}"))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}
