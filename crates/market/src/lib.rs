pub mod config;
pub mod service;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use chain::{RegistryClient, Settlement};
use ipfs::ContentStore;
use log::info;
use model::{
    address::Address,
    booking::{self, BookedCourse, BookingPhase, ExpiryPolicy, UnrentPhase},
    clock::Clock,
    course::{Course, CourseDraft},
    errors::MarketError,
    metadata::CourseEdit,
    user::TrainerProfile,
};
use storage::UserStateStore;
use tokio::{sync::watch, task::JoinHandle};

pub use config::MarketConfig;
use service::{
    booking::Bookings,
    catalog::{Catalog, CatalogLoader},
    courses::Courses,
    resolver::Resolver,
    trainers::{ProfileDraft, ProfileEdit, Trainers},
    users::Users,
};

/// A booking running in the background. `progress` follows its phases.
pub struct BookingAttempt {
    pub progress: watch::Receiver<BookingPhase>,
    pub handle: JoinHandle<Result<BookedCourse, MarketError>>,
}

/// Client core of the marketplace for one wallet.
#[derive(Clone)]
pub struct Market {
    pub config: Arc<MarketConfig>,
    pub chain: Arc<dyn Settlement>,
    pub clock: Arc<dyn Clock>,
    pub users: Users,
    pub resolver: Resolver,
    pub catalog: CatalogLoader,
    pub bookings: Bookings,
    pub courses: Courses,
    pub trainers: Trainers,
}

impl Market {
    pub fn new(
        config: MarketConfig,
        chain: Arc<dyn Settlement>,
        content: Arc<dyn ContentStore>,
        store: Arc<dyn UserStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let users = Users::new(store);
        let registry = RegistryClient::new(chain.clone(), config.registry);
        let resolver = Resolver::new(chain.clone(), content.clone());
        let catalog =
            CatalogLoader::new(registry.clone(), resolver.clone(), config.catalog_concurrency);
        let bookings = Bookings::new(
            chain.clone(),
            resolver.clone(),
            users.clone(),
            clock.clone(),
            config.clone(),
        );
        let courses = Courses::new(
            chain.clone(),
            content.clone(),
            resolver.clone(),
            registry.clone(),
            users.clone(),
            config.clone(),
        );
        let trainers = Trainers::new(
            chain.clone(),
            content,
            resolver.clone(),
            registry,
            users.clone(),
            config.clone(),
        );
        Market {
            config,
            chain,
            clock,
            users,
            resolver,
            catalog,
            bookings,
            courses,
            trainers,
        }
    }

    /// Adopts the wallet's current identity and loads its local state.
    pub async fn connect(&self) -> Result<Address, MarketError> {
        let address = self
            .chain
            .current_identity()
            .ok_or(MarketError::NotConnected)?;
        let state = self.users.connect(address).await?;
        info!(
            "Connected {} with {} local bookings",
            address,
            state.booked.len()
        );
        Ok(address)
    }

    pub fn disconnect(&self) {
        self.users.disconnect();
    }

    pub fn identity(&self) -> Option<Address> {
        self.users.identity()
    }

    pub async fn load_catalog(&self) -> Result<Catalog, MarketError> {
        self.catalog.load().await
    }

    pub async fn book(
        &self,
        course: Address,
        policy: ExpiryPolicy,
    ) -> Result<BookedCourse, MarketError> {
        let (progress, _) = watch::channel(BookingPhase::Idle);
        self.bookings.book(course, policy, &progress).await
    }

    /// Starts a booking on the runtime and hands back its progress.
    pub fn start_booking(&self, course: Address, policy: ExpiryPolicy) -> BookingAttempt {
        let (tx, progress) = watch::channel(BookingPhase::Idle);
        let bookings = self.bookings.clone();
        let handle = tokio::spawn(async move { bookings.book(course, policy, &tx).await });
        BookingAttempt { progress, handle }
    }

    pub async fn unrent(&self, course: Address) -> Result<(), MarketError> {
        let (progress, _) = watch::channel(UnrentPhase::Idle);
        self.bookings.unrent(course, &progress).await
    }

    /// Local bookings that have not expired yet.
    pub fn booked_courses(&self) -> Vec<BookedCourse> {
        self.users
            .snapshot()
            .map(|state| booking::active_bookings(&state.booked, self.clock.now()))
            .unwrap_or_default()
    }

    /// Local bookings past their expiry that reconciliation has not dropped yet.
    pub fn expired_bookings(&self) -> Vec<BookedCourse> {
        self.users
            .snapshot()
            .map(|state| booking::expired_bookings(&state.booked, self.clock.now()))
            .unwrap_or_default()
    }

    pub async fn create_course(
        &self,
        draft: CourseDraft,
        secret: &str,
    ) -> Result<Course, MarketError> {
        self.courses.create(draft, secret).await
    }

    pub async fn edit_course(
        &self,
        course: Address,
        edit: CourseEdit,
    ) -> Result<Course, MarketError> {
        self.courses.edit(course, edit).await
    }

    pub async fn delete_course(&self, course: Address) -> Result<(), MarketError> {
        self.courses.delete(course).await
    }

    pub async fn register_as_trainer(
        &self,
        profile: ProfileDraft,
        secret: &str,
    ) -> Result<TrainerProfile, MarketError> {
        self.trainers.register(profile, secret).await
    }

    pub async fn update_trainer_profile(
        &self,
        edit: ProfileEdit,
    ) -> Result<TrainerProfile, MarketError> {
        self.trainers.update_profile(edit).await
    }

    pub async fn trainer_courses(&self, trainer: Address) -> Result<Vec<Address>, MarketError> {
        self.trainers.courses_of(trainer).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use storage::UserStateStore as _;

    use super::*;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_connect_restores_persisted_state() {
        let h = Harness::new().await;
        let course = h.course("Run club", 2, h.hours_from_now(6)).await;
        let (renter, market) = h.renter().await;
        market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap();
        assert!(h.store.load(renter).await.unwrap().is_some());

        market.disconnect();
        assert!(market.identity().is_none());
        assert!(market.booked_courses().is_empty());

        let again = h.market_for(renter);
        assert_eq!(again.connect().await.unwrap(), renter);
        assert_eq!(again.booked_courses().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_wallet_identity() {
        let h = Harness::new().await;
        let market = Market::new(
            MarketConfig::new(h.registry),
            Arc::new(h.dev.disconnected()),
            Arc::new(h.content.clone()),
            Arc::new(h.store.clone()),
            Arc::new(h.clock.clone()),
        );
        assert!(matches!(
            market.connect().await,
            Err(MarketError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_expired_view() {
        let h = Harness::new().await;
        let course = h.course("Evening", 1, h.hours_from_now(6)).await;
        let (_, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(Duration::hours(1)))
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(90));
        assert!(market.booked_courses().is_empty());
        assert_eq!(market.expired_bookings().len(), 1);
    }
}
