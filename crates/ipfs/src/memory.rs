use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use model::metadata::ContentAddress;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{ContentStore, IpfsError};

#[derive(Default)]
struct Inner {
    documents: HashMap<ContentAddress, Value>,
    unresolvable: HashSet<ContentAddress>,
    offline: bool,
    resolves: usize,
}

/// In-process content store. Addresses are digests of the serialized document.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn address_of(document: &Value) -> ContentAddress {
        let digest = Sha256::digest(document.to_string().as_bytes());
        ContentAddress::Ipfs(format!("bafy{}", hex::encode(&digest[..16])))
    }

    /// Resolving `address` fails from now on.
    pub fn make_unresolvable(&self, address: &ContentAddress) {
        self.inner.lock().unresolvable.insert(address.clone());
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Number of resolve calls served so far.
    pub fn resolve_count(&self) -> usize {
        self.inner.lock().resolves
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn pin(&self, document: &Value) -> Result<ContentAddress, IpfsError> {
        let mut inner = self.inner.lock();
        if inner.offline {
            return Err(IpfsError::Unreachable("store offline".to_owned()));
        }
        let address = MemoryStore::address_of(document);
        inner.documents.insert(address.clone(), document.clone());
        Ok(address)
    }

    async fn resolve(&self, address: &ContentAddress) -> Result<Value, IpfsError> {
        let mut inner = self.inner.lock();
        inner.resolves += 1;
        if inner.offline {
            return Err(IpfsError::Unreachable("store offline".to_owned()));
        }
        if inner.unresolvable.contains(address) {
            return Err(IpfsError::NotFound(address.clone()));
        }
        inner
            .documents
            .get(address)
            .cloned()
            .ok_or_else(|| IpfsError::NotFound(address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use model::errors::{ErrorKind, MarketError};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_resolve_returns_pinned_document() {
        let store = MemoryStore::new();
        let doc = json!({
            "name": "Sunrise yoga",
            "timeStart": "2030-01-01T07:00:00Z",
            "attributes": [{"trait_type": "Price", "value": "0.05"}]
        });
        let address = store.pin(&doc).await.unwrap();
        assert_eq!(store.resolve(&address).await.unwrap(), doc);
        assert_eq!(store.pin(&doc).await.unwrap(), address);
    }

    #[tokio::test]
    async fn test_failures() {
        let store = MemoryStore::new();
        let address = store.pin(&json!({"name": "x"})).await.unwrap();
        store.make_unresolvable(&address);
        let err = store.resolve(&address).await.unwrap_err();
        assert!(matches!(
            MarketError::from(err),
            MarketError::MetadataUnresolvable(_)
        ));

        store.set_offline(true);
        let err = store.pin(&json!({"name": "y"})).await.unwrap_err();
        assert_eq!(MarketError::from(err).kind(), ErrorKind::RetryLater);
    }
}
