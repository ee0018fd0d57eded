use std::sync::Arc;

use chain::{balance_of, Settlement};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use model::{
    address::Address,
    booking::{BookedCourse, BookingPhase, ExpiryPolicy, UnrentPhase},
    clock::{from_unix, Clock},
    course::Course,
    errors::{MarketError, UnavailableReason},
    schedule::Schedule,
};
use tokio::sync::watch;

use super::{await_confirmation, resolver::Resolver, users::Users};
use crate::config::MarketConfig;

/// Picks the expiry of a new rental. Never earlier than `now` plus the
/// configured buffer.
pub fn choose_expiry(
    policy: ExpiryPolicy,
    schedule: &Schedule,
    now: DateTime<Utc>,
    config: &MarketConfig,
) -> DateTime<Utc> {
    let chosen = match policy {
        ExpiryPolicy::Window(window) => now + window,
        ExpiryPolicy::ScheduleEnd => schedule.end_at.unwrap_or(now + config.rent_window),
    };
    chosen.max(now + config.min_expiry_buffer)
}

#[derive(Clone)]
pub struct Bookings {
    chain: Arc<dyn Settlement>,
    resolver: Resolver,
    users: Users,
    clock: Arc<dyn Clock>,
    config: Arc<MarketConfig>,
}

impl Bookings {
    pub(crate) fn new(
        chain: Arc<dyn Settlement>,
        resolver: Resolver,
        users: Users,
        clock: Arc<dyn Clock>,
        config: Arc<MarketConfig>,
    ) -> Self {
        Bookings {
            chain,
            resolver,
            users,
            clock,
            config,
        }
    }

    /// Runs one booking attempt, publishing every phase to `progress`.
    ///
    /// The ledger re-checks capacity atomically, so a passed pre-flight check
    /// can still end in `CapacityExceeded`. Nothing is retried.
    pub async fn book(
        &self,
        course: Address,
        policy: ExpiryPolicy,
        progress: &watch::Sender<BookingPhase>,
    ) -> Result<BookedCourse, MarketError> {
        let result = self.try_book(course, policy, progress).await;
        match &result {
            Ok(booking) => {
                info!("Booked {} until {}", course, booking.expires_at);
                progress.send_replace(BookingPhase::Booked);
            }
            Err(err) => {
                warn!("Booking of {} failed: {}", course, err);
                progress.send_replace(BookingPhase::Failed(err.user_message()));
            }
        }
        result
    }

    async fn try_book(
        &self,
        course: Address,
        policy: ExpiryPolicy,
        progress: &watch::Sender<BookingPhase>,
    ) -> Result<BookedCourse, MarketError> {
        let renter = self.users.require_identity()?;
        progress.send_replace(BookingPhase::CheckingAvailability);
        let mut snapshot = self.preflight(course, renter).await?;

        let requested = choose_expiry(policy, &snapshot.schedule, self.clock.now(), &self.config);
        progress.send_replace(BookingPhase::Submitting);
        let item = self.resolver.item(course);
        let tx = item
            .rent(renter, requested.timestamp() as u64, snapshot.price)
            .await?;
        info!(
            "Submitted rent of {} by {} until {} (tx {})",
            course, renter, requested, tx.0
        );

        progress.send_replace(BookingPhase::Confirming {
            waited: Duration::zero(),
        });
        await_confirmation(
            self.chain.as_ref(),
            tx,
            "rent",
            self.config.confirm_notice,
            |waited| {
                progress.send_replace(BookingPhase::Confirming { waited });
            },
        )
        .await?;

        let expires_at = match item.renter_expires(renter).await {
            Ok(0) => {
                warn!("Ledger reports no expiry for {} right after renting {}", renter, course);
                requested
            }
            Ok(secs) => from_unix(secs),
            Err(err) => {
                warn!("Could not re-read expiry of {}: {}. Using the requested one", course, err);
                requested
            }
        };
        if let Ok(count) = item.active_renter_count().await {
            snapshot.active_renters = count;
        }

        let booking = BookedCourse {
            course: snapshot,
            booked_at: self.clock.now(),
            expires_at,
        };
        let stored = booking.clone();
        if self
            .users
            .update(renter, move |state| state.upsert_booking(stored))
            .await
            .is_none()
        {
            warn!("{} disconnected before booking {} was recorded", renter, course);
        }
        Ok(booking)
    }

    /// Non-binding checks that short-circuit doomed attempts.
    async fn preflight(&self, course: Address, renter: Address) -> Result<Course, MarketError> {
        let snapshot = self.resolver.course(course).await?;
        let now = self.clock.now();
        if snapshot.schedule.has_ended(now) {
            info!("Pre-flight: {} has ended", course);
            return Err(MarketError::Unavailable(UnavailableReason::Ended));
        }
        if snapshot.is_full() {
            let holds_slot = self.resolver.item(course).renter_expires(renter).await? > 0;
            if !holds_slot {
                info!("Pre-flight: {} is full", course);
                return Err(MarketError::Unavailable(UnavailableReason::Full));
            }
        }
        let balance = balance_of(self.chain.as_ref(), renter).await?;
        if balance < snapshot.price {
            info!("Pre-flight: {} cannot pay {} for {}", renter, snapshot.price, course);
            return Err(MarketError::InsufficientFunds);
        }
        Ok(snapshot)
    }

    /// Releases the caller's slot. A `NotActiveRenter` verdict also drops the
    /// stale local entry.
    pub async fn unrent(
        &self,
        course: Address,
        progress: &watch::Sender<UnrentPhase>,
    ) -> Result<(), MarketError> {
        let result = self.try_unrent(course, progress).await;
        match &result {
            Ok(()) => {
                info!("Unrented {}", course);
                progress.send_replace(UnrentPhase::Removed);
            }
            Err(err) => {
                warn!("Unrent of {} failed: {}", course, err);
                progress.send_replace(UnrentPhase::Failed(err.user_message()));
            }
        }
        result
    }

    async fn try_unrent(
        &self,
        course: Address,
        progress: &watch::Sender<UnrentPhase>,
    ) -> Result<(), MarketError> {
        let renter = self.users.require_identity()?;
        progress.send_replace(UnrentPhase::Submitting);
        let tx = self.resolver.item(course).unrent(renter).await?;
        info!("Submitted unrent of {} by {} (tx {})", course, renter, tx.0);

        progress.send_replace(UnrentPhase::Confirming {
            waited: Duration::zero(),
        });
        let outcome = await_confirmation(
            self.chain.as_ref(),
            tx,
            "unrent",
            self.config.confirm_notice,
            |waited| {
                progress.send_replace(UnrentPhase::Confirming { waited });
            },
        )
        .await;

        match outcome {
            Ok(_) => {
                self.users
                    .update(renter, |state| state.remove_booking(course))
                    .await;
                Ok(())
            }
            Err(MarketError::NotActiveRenter) => {
                let dropped = self
                    .users
                    .update(renter, |state| state.remove_booking(course))
                    .await
                    .flatten();
                if dropped.is_some() {
                    info!("Dropped stale local booking of {}", course);
                }
                Err(MarketError::NotActiveRenter)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use model::booking::active_bookings;

    use super::*;
    use crate::testing::Harness;

    fn config() -> MarketConfig {
        MarketConfig::new(Address::ZERO)
    }

    #[test]
    fn test_choose_expiry() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        let end = now + Duration::hours(3);
        let scheduled = Schedule::window(now - Duration::hours(1), end);
        let cfg = config();

        assert_eq!(
            choose_expiry(ExpiryPolicy::ScheduleEnd, &scheduled, now, &cfg),
            end
        );
        assert_eq!(
            choose_expiry(ExpiryPolicy::ScheduleEnd, &Schedule::not_scheduled(), now, &cfg),
            now + Duration::hours(1)
        );
        assert_eq!(
            choose_expiry(ExpiryPolicy::Window(Duration::minutes(30)), &scheduled, now, &cfg),
            now + Duration::minutes(30)
        );
        assert_eq!(
            choose_expiry(ExpiryPolicy::Window(Duration::seconds(5)), &scheduled, now, &cfg),
            now + Duration::seconds(60)
        );
        let ending = Schedule::window(now - Duration::hours(1), now + Duration::seconds(10));
        assert_eq!(
            choose_expiry(ExpiryPolicy::ScheduleEnd, &ending, now, &cfg),
            now + Duration::seconds(60)
        );
    }

    #[tokio::test]
    async fn test_book_records_authoritative_expiry() {
        let h = Harness::new().await;
        let course = h.course("Yoga", 2, h.hours_from_now(5)).await;
        let (renter, market) = h.renter().await;
        let trainer_balance = h.dev.balance(h.trainer);

        let booking = market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap();
        assert_eq!(booking.expires_at, h.hours_from_now(5));
        assert_eq!(booking.course.active_renters, 1);
        let item = market.resolver.item(course);
        assert!(item.is_active_renter(renter).await.unwrap());

        let booked = market.booked_courses();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].id(), course);
        assert_eq!(h.dev.balance(h.trainer), trainer_balance + h.price());
    }

    #[tokio::test]
    async fn test_capacity_scenario() {
        let h = Harness::new().await;
        let course = h.course("Tennis", 1, h.hours_from_now(24)).await;
        let (_, a) = h.renter().await;
        let (_, b) = h.renter().await;

        a.book(course, ExpiryPolicy::Window(Duration::hours(1)))
            .await
            .unwrap();
        let err = b
            .book(course, ExpiryPolicy::Window(Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::Unavailable(UnavailableReason::Full)
        ));

        a.unrent(course).await.unwrap();
        assert!(a.booked_courses().is_empty());
        b.book(course, ExpiryPolicy::Window(Duration::hours(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_race_past_preflight_is_a_normal_failure() {
        let h = Harness::new().await;
        let course = h.course("Climbing", 1, h.hours_from_now(24)).await;
        let (_, a) = h.renter().await;
        let (_, b) = h.renter().await;
        h.dev.pause_mining(true);

        let first = a.start_booking(course, ExpiryPolicy::ScheduleEnd);
        let second = b.start_booking(course, ExpiryPolicy::ScheduleEnd);
        while h.dev.pending() < 2 {
            tokio::task::yield_now().await;
        }
        h.dev.pause_mining(false);

        let first = first.handle.await.unwrap();
        let second = second.handle.await.unwrap();
        assert!(first.is_ok());
        assert!(matches!(second, Err(MarketError::CapacityExceeded)));
        assert!(b.booked_courses().is_empty());
        assert_eq!(
            h.market.resolver.item(course).active_renter_count().await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_ended_course_is_rejected_without_submitting() {
        let h = Harness::new().await;
        let course = h.course("Past", 3, h.hours_from_now(1)).await;
        h.clock.advance(Duration::hours(2));
        let (_, market) = h.renter().await;
        let events = h.dev.events().len();

        let attempt = market.start_booking(course, ExpiryPolicy::ScheduleEnd);
        let mut progress = attempt.progress.clone();
        let err = attempt.handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            MarketError::Unavailable(UnavailableReason::Ended)
        ));
        assert_eq!(h.dev.pending(), 0);
        assert_eq!(h.dev.events().len(), events);
        let last = progress.borrow_and_update().clone();
        assert!(matches!(
            last,
            BookingPhase::Failed(msg) if msg.starts_with("This no longer exists")
        ));
    }

    #[tokio::test]
    async fn test_submission_failures() {
        let h = Harness::new().await;
        let course = h.course("Swim", 1, h.hours_from_now(3)).await;

        let broke = h.dev.new_account();
        let market = h.market_for(broke);
        market.connect().await.unwrap();
        let err = market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap_err();
        assert!(matches!(err, MarketError::InsufficientFunds));

        let (_, market) = h.renter().await;
        h.dev.reject_next_submission();
        let err = market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap_err();
        assert!(matches!(err, MarketError::Rejected));
        assert!(market.booked_courses().is_empty());

        let offline = h.market_for(h.dev.new_account());
        let err = offline.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap_err();
        assert!(matches!(err, MarketError::NotConnected));

        h.dev.set_offline(true);
        let err = market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_waiting_notice() {
        let h = Harness::new().await;
        let course = h.course("Cycle", 1, h.hours_from_now(3)).await;
        let (_, market) = h.renter().await;
        h.dev.pause_mining(true);

        let attempt = market.start_booking(course, ExpiryPolicy::ScheduleEnd);
        let mut progress = attempt.progress.clone();
        loop {
            progress.changed().await.unwrap();
            let phase = progress.borrow_and_update().clone();
            if let BookingPhase::Confirming { waited } = phase {
                if waited >= Duration::seconds(20) {
                    break;
                }
            }
        }
        h.dev.pause_mining(false);
        let booking = attempt.handle.await.unwrap().unwrap();
        assert_eq!(booking.id(), course);
        assert_eq!(*progress.borrow(), BookingPhase::Booked);
    }

    #[tokio::test]
    async fn test_renewal_replaces_local_entry() {
        let h = Harness::new().await;
        let course = h.course("Football", 1, h.hours_from_now(24)).await;
        let (_, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(Duration::hours(1)))
            .await
            .unwrap();
        let renewed = market
            .book(course, ExpiryPolicy::Window(Duration::hours(2)))
            .await
            .unwrap();
        let booked = market.booked_courses();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].expires_at, renewed.expires_at);
        assert_eq!(renewed.expires_at, h.now() + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_double_unrent() {
        let h = Harness::new().await;
        let course = h.course("Basketball", 2, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap();

        h.unrent_as_owner(course, renter).await;
        assert_eq!(market.booked_courses().len(), 1);
        let err = market.unrent(course).await.unwrap_err();
        assert!(matches!(err, MarketError::NotActiveRenter));
        assert!(market.booked_courses().is_empty());
        assert!(active_bookings(&market.users.snapshot().unwrap().booked, h.now()).is_empty());
    }
}
