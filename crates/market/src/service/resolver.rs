use std::{collections::HashMap, sync::Arc};

use chain::{ItemClient, Settlement};
use ipfs::ContentStore;
use log::{debug, warn};
use model::{
    address::Address,
    course::{Course, OnChainCourse, ResolvedCourse},
    errors::{MarketError, UnavailableReason},
    metadata::{ContentAddress, CourseMetadata},
};
use parking_lot::Mutex;

/// Merges the authoritative contract fields of a course with its pinned
/// descriptive document.
///
/// Contract reads are never cached. Documents are cached by content address
/// forever since an address always names the same bytes.
#[derive(Clone)]
pub struct Resolver {
    chain: Arc<dyn Settlement>,
    content: Arc<dyn ContentStore>,
    cache: Arc<Mutex<HashMap<ContentAddress, CourseMetadata>>>,
}

impl Resolver {
    pub(crate) fn new(chain: Arc<dyn Settlement>, content: Arc<dyn ContentStore>) -> Self {
        Resolver {
            chain,
            content,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn item(&self, course: Address) -> ItemClient {
        ItemClient::new(self.chain.clone(), course)
    }

    pub async fn on_chain(&self, course: Address) -> Result<OnChainCourse, MarketError> {
        Ok(self.item(course).course().await?)
    }

    pub fn cached(&self, address: &ContentAddress) -> Option<CourseMetadata> {
        self.cache.lock().get(address).cloned()
    }

    pub async fn metadata(&self, address: &ContentAddress) -> Result<CourseMetadata, MarketError> {
        if let Some(meta) = self.cached(address) {
            return Ok(meta);
        }
        let document = self.content.resolve(address).await?;
        let meta: CourseMetadata = serde_json::from_value(document).map_err(|err| {
            MarketError::MetadataUnresolvable(format!("{}: {}", address, err))
        })?;
        debug!("Cached metadata {}", address);
        self.cache.lock().insert(address.clone(), meta.clone());
        Ok(meta)
    }

    /// Fails only when the contract itself cannot be read or is burned. A
    /// document that cannot be fetched yields `Degraded`.
    pub async fn resolve(&self, course: Address) -> Result<ResolvedCourse, MarketError> {
        let chain = self.on_chain(course).await?;
        if chain.burned {
            return Err(MarketError::Unavailable(UnavailableReason::Removed));
        }
        let Some(uri) = chain.metadata_uri.clone() else {
            warn!("Course {} has no metadata reference", course);
            return Ok(ResolvedCourse::Degraded(chain));
        };
        match self.metadata(&uri).await {
            Ok(meta) => Ok(ResolvedCourse::Full(Course::merge(chain, &meta))),
            Err(err) => {
                warn!("Course {} degraded: {}", course, err);
                Ok(ResolvedCourse::Degraded(chain))
            }
        }
    }

    /// Like `resolve` but always yields a course. Descriptive fields of a
    /// degraded course stay empty and its schedule reads "not scheduled".
    pub async fn course(&self, course: Address) -> Result<Course, MarketError> {
        Ok(match self.resolve(course).await? {
            ResolvedCourse::Full(course) => course,
            ResolvedCourse::Degraded(chain) => Course::merge(chain, &CourseMetadata::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use model::{course::SportType, schedule::ScheduleStatus};

    use super::*;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_resolve_merges_and_caches() {
        let h = Harness::new().await;
        let course = h.course("Trail run", 2, h.hours_from_now(48)).await;

        let resolved = h.market.resolver.resolve(course).await.unwrap();
        let full = resolved.course().unwrap();
        assert_eq!(full.title, "Trail run");
        assert_eq!(full.capacity, 2);
        assert_eq!(full.sport, SportType::Running);
        assert_eq!(full.trainer, h.trainer);

        let reads = h.content.resolve_count();
        h.market.resolver.resolve(course).await.unwrap();
        assert_eq!(h.content.resolve_count(), reads);
    }

    #[tokio::test]
    async fn test_unresolvable_document_degrades() {
        let h = Harness::new().await;
        let course = h.course("Pool", 1, h.hours_from_now(2)).await;
        let uri = h.market.resolver.on_chain(course).await.unwrap().metadata_uri.unwrap();

        let fresh = Resolver::new(h.chain_for(h.trainer), Arc::new(h.content.clone()));
        h.content.make_unresolvable(&uri);
        let resolved = fresh.resolve(course).await.unwrap();
        assert!(resolved.is_degraded());

        let course = fresh.course(course).await.unwrap();
        assert_eq!(course.price, h.price());
        assert_eq!(course.schedule.status(h.now()), ScheduleStatus::NotScheduled);
    }

    #[tokio::test]
    async fn test_contract_read_failure_propagates() {
        let h = Harness::new().await;
        let course = h.course("Pool", 1, h.hours_from_now(2)).await;
        h.dev.fail_reads_for(course, true);
        let err = h.market.resolver.resolve(course).await.unwrap_err();
        assert!(err.is_transient());
    }
}
