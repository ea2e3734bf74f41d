//! Backend session tokens, kept in memory as secrets and mirrored to the
//! durable store.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::store::{KeyValueStore, storage_keys};

#[derive(Default)]
struct Tokens {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

pub struct TokenStore {
    kv: Arc<dyn KeyValueStore>,
    tokens: RwLock<Tokens>,
}

impl TokenStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            tokens: RwLock::new(Tokens::default()),
        }
    }

    /// Pick up tokens left behind by a previous session.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let access = read_secret(kv.as_ref(), storage_keys::ACCESS_TOKEN).await;
        let refresh = read_secret(kv.as_ref(), storage_keys::REFRESH_TOKEN).await;
        if access.is_some() {
            tracing::debug!("Restored backend session tokens");
        }
        Self {
            kv,
            tokens: RwLock::new(Tokens { access, refresh }),
        }
    }

    /// `Authorization` header value for the current access token.
    pub async fn bearer(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .access
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }

    pub async fn has_access_token(&self) -> bool {
        self.tokens.read().await.access.is_some()
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.tokens.read().await.refresh.is_some()
    }

    pub async fn set(&self, access: &str, refresh: &str) {
        {
            let mut tokens = self.tokens.write().await;
            tokens.access = Some(SecretString::from(access.to_string()));
            tokens.refresh = Some(SecretString::from(refresh.to_string()));
        }
        for (key, value) in [
            (storage_keys::ACCESS_TOKEN, access),
            (storage_keys::REFRESH_TOKEN, refresh),
        ] {
            if let Err(e) = self.kv.set(key, &serde_json::json!(value)).await {
                tracing::warn!("Failed to store {}: {}", key, e);
            }
        }
    }

    pub async fn clear(&self) {
        *self.tokens.write().await = Tokens::default();
        for key in [storage_keys::ACCESS_TOKEN, storage_keys::REFRESH_TOKEN] {
            if let Err(e) = self.kv.remove(key).await {
                tracing::warn!("Failed to clear {}: {}", key, e);
            }
        }
    }
}

async fn read_secret(kv: &dyn KeyValueStore, key: &str) -> Option<SecretString> {
    match kv.get(key).await {
        Ok(Some(serde_json::Value::String(s))) if !s.is_empty() => Some(SecretString::from(s)),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn tokens_round_trip_through_storage() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(Arc::clone(&kv));
        assert!(tokens.bearer().await.is_none());

        tokens.set("acc", "ref").await;
        assert_eq!(tokens.bearer().await.as_deref(), Some("Bearer acc"));

        let reloaded = TokenStore::load(Arc::clone(&kv)).await;
        assert!(reloaded.has_refresh_token().await);
        assert_eq!(reloaded.bearer().await.as_deref(), Some("Bearer acc"));

        reloaded.clear().await;
        assert!(!reloaded.has_access_token().await);
        assert!(kv.get(storage_keys::ACCESS_TOKEN).await.unwrap().is_none());
    }
}
