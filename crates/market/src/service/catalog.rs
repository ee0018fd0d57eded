use chain::RegistryClient;
use futures::{stream, StreamExt as _};
use log::{info, warn};
use model::{
    address::Address,
    course::{Course, OnChainCourse, ResolvedCourse, SportType},
    errors::{MarketError, UnavailableReason},
};

use super::resolver::Resolver;

/// Listing of every registered course, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub courses: Vec<Course>,
    /// Courses whose descriptive document could not be fetched.
    pub degraded: Vec<OnChainCourse>,
}

impl Catalog {
    pub fn get(&self, id: Address) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    pub fn by_sport(&self, sport: SportType) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|course| course.sport == sport)
            .collect()
    }

    pub fn by_trainer(&self, trainer: Address) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|course| course.trainer == trainer)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[derive(Clone)]
pub struct CatalogLoader {
    registry: RegistryClient,
    resolver: Resolver,
    concurrency: usize,
}

impl CatalogLoader {
    pub(crate) fn new(registry: RegistryClient, resolver: Resolver, concurrency: usize) -> Self {
        CatalogLoader {
            registry,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Fails only when the registry cannot be enumerated. A course that cannot
    /// be read is dropped and logged.
    pub async fn load(&self) -> Result<Catalog, MarketError> {
        let ids = self.registry.list().await?;
        let resolved: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, self.resolver.resolve(id).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut catalog = Catalog::default();
        for (id, result) in resolved {
            match result {
                Ok(ResolvedCourse::Full(course)) => catalog.courses.push(course),
                Ok(ResolvedCourse::Degraded(chain)) => catalog.degraded.push(chain),
                Err(MarketError::Unavailable(UnavailableReason::Removed)) => {
                    info!("Skipping burned course {}", id);
                }
                Err(err) => warn!("Dropping course {} from catalog: {}", id, err),
            }
        }
        info!(
            "Catalog loaded: {} courses, {} degraded",
            catalog.courses.len(),
            catalog.degraded.len()
        );
        Ok(catalog)
    }
}
