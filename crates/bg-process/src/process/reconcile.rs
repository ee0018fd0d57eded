use std::time::Duration;

use async_trait::async_trait;
use chain::ChainError;
use chrono::{DateTime, Utc};
use eyre::Error;
use log::{debug, info, warn};
use market::Market;
use model::{
    address::Address, booking::BookedCourse, clock::from_unix, errors::MarketError,
};

use crate::Task;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Still active with the expiry already known locally.
    pub confirmed: usize,
    /// Still active; the local expiry was replaced by the on-chain one.
    pub refreshed: usize,
    pub dropped: usize,
    /// Kept after a transient read failure.
    pub retained: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

enum Observed {
    Active(DateTime<Utc>),
    Inactive,
    Unknown,
}

enum Change {
    Refresh(DateTime<Utc>),
    Drop,
}

/// Brings the local bookings of the connected identity in line with the
/// rental ledger. Only entries already held locally are touched.
pub struct Reconciler {
    market: Market,
    period: Duration,
}

impl Reconciler {
    pub fn new(market: Market, period: Duration) -> Reconciler {
        Reconciler { market, period }
    }

    async fn observe(&self, renter: Address, booking: &BookedCourse) -> Observed {
        let item = self.market.resolver.item(booking.id());
        let read = async {
            let active = item.is_active_renter(renter).await?;
            let expires = item.renter_expires(renter).await?;
            Ok::<_, ChainError>((active, expires))
        };
        match read.await.map_err(MarketError::from) {
            Ok((true, expires)) if expires > 0 => Observed::Active(from_unix(expires)),
            Ok(_) => Observed::Inactive,
            Err(err) if err.is_transient() => {
                warn!("Failed to read rental of {}: {}", booking.id(), err);
                Observed::Unknown
            }
            Err(err) => {
                warn!("Course {} is unreadable: {}", booking.id(), err);
                Observed::Inactive
            }
        }
    }

    pub async fn run_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let state = match self.market.users.snapshot() {
            Some(state) if !state.booked.is_empty() => state,
            _ => return report,
        };
        let now = self.market.clock.now();

        let mut changes = Vec::new();
        for booking in &state.booked {
            let change = match self.observe(state.address, booking).await {
                Observed::Active(expires) if now < expires => {
                    if expires == booking.expires_at {
                        report.confirmed += 1;
                        continue;
                    }
                    info!(
                        "Refreshing expiry of {}: {} -> {}",
                        booking.id(),
                        booking.expires_at,
                        expires
                    );
                    Change::Refresh(expires)
                }
                Observed::Active(_) | Observed::Inactive => {
                    info!("Dropping booking of {}: no longer active", booking.id());
                    Change::Drop
                }
                Observed::Unknown if now < booking.expires_at => {
                    info!(
                        "Retaining booking of {} until {}",
                        booking.id(),
                        booking.expires_at
                    );
                    report.retained += 1;
                    continue;
                }
                Observed::Unknown => {
                    info!("Dropping booking of {}: expired locally", booking.id());
                    Change::Drop
                }
            };
            changes.push((booking.id(), booking.booked_at, change));
        }
        if changes.is_empty() {
            return report;
        }

        // An entry replaced by a new booking since the snapshot is left alone.
        let applied = self
            .market
            .users
            .update(state.address, |state| {
                let (mut refreshed, mut dropped) = (0, 0);
                for (course, booked_at, change) in changes {
                    let current = state
                        .booked
                        .iter_mut()
                        .find(|b| b.id() == course && b.booked_at == booked_at);
                    let Some(current) = current else {
                        continue;
                    };
                    match change {
                        Change::Refresh(expires) => {
                            current.expires_at = expires;
                            refreshed += 1;
                        }
                        Change::Drop => {
                            state.remove_booking(course);
                            dropped += 1;
                        }
                    }
                }
                (refreshed, dropped)
            })
            .await;
        match applied {
            Some((refreshed, dropped)) => {
                report.refreshed = refreshed;
                report.dropped = dropped;
            }
            None => debug!("{} disconnected during reconciliation", state.address),
        }
        report
    }
}

#[async_trait]
impl Task for Reconciler {
    const NAME: &'static str = "reconcile";

    fn period(&self) -> Duration {
        self.period
    }

    async fn process(&mut self) -> Result<(), Error> {
        let report = self.run_once().await;
        if !report.is_empty() {
            debug!("Reconciliation: {:?}", report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chain::ItemClient;
    use chrono::Duration as ChronoDuration;
    use market::testing::Harness;
    use model::booking::ExpiryPolicy;

    use super::*;

    const PERIOD: Duration = Duration::from_secs(15);

    #[tokio::test]
    async fn test_out_of_band_extension_is_picked_up() {
        let h = Harness::new().await;
        let course = h.course("Rowing", 1, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(ChronoDuration::hours(1)))
            .await
            .unwrap();
        let reconciler = Reconciler::new(market.clone(), PERIOD);
        assert_eq!(reconciler.run_once().await.confirmed, 1);

        let later = h.hours_from_now(3);
        h.rent_directly(course, renter, later).await;
        let report = reconciler.run_once().await;
        assert_eq!(report.refreshed, 1);

        let booked = market.booked_courses();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].expires_at, later);
    }

    #[tokio::test]
    async fn test_transient_failure_retains_until_local_expiry() {
        let h = Harness::new().await;
        let course = h.course("Boxing", 2, h.hours_from_now(24)).await;
        let (_, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(ChronoDuration::hours(1)))
            .await
            .unwrap();
        let reconciler = Reconciler::new(market.clone(), PERIOD);

        h.dev.fail_reads_for(course, true);
        let report = reconciler.run_once().await;
        assert_eq!(report.retained, 1);
        assert_eq!(market.booked_courses().len(), 1);

        h.clock.advance(ChronoDuration::hours(2));
        let report = reconciler.run_once().await;
        assert_eq!(report.dropped, 1);
        assert!(market.expired_bookings().is_empty());
    }

    #[tokio::test]
    async fn test_unrent_by_owner_is_dropped() {
        let h = Harness::new().await;
        let course = h.course("Judo", 2, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap();

        h.unrent_as_owner(course, renter).await;
        let report = Reconciler::new(market.clone(), PERIOD).run_once().await;
        assert_eq!(report.dropped, 1);
        assert!(market.booked_courses().is_empty());
    }

    #[tokio::test]
    async fn test_expired_rental_is_dropped() {
        let h = Harness::new().await;
        let course = h.course("Pilates", 2, h.hours_from_now(24)).await;
        let (_, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(ChronoDuration::hours(1)))
            .await
            .unwrap();
        h.clock.advance(ChronoDuration::minutes(61));
        assert_eq!(market.expired_bookings().len(), 1);

        let report = Reconciler::new(market.clone(), PERIOD).run_once().await;
        assert_eq!(report.dropped, 1);
        assert!(market.expired_bookings().is_empty());
    }

    #[tokio::test]
    async fn test_far_future_expiry_is_kept() {
        let h = Harness::new().await;
        let course = h.course("Triathlon", 1, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        market
            .book(course, ExpiryPolicy::Window(ChronoDuration::hours(1)))
            .await
            .unwrap();

        let chain = h.chain_for(renter);
        let tx = ItemClient::new(chain.clone(), course)
            .rent(renter, u64::MAX, h.price())
            .await
            .unwrap();
        chain.confirm(tx).await.unwrap().into_result().unwrap();

        let report = Reconciler::new(market.clone(), PERIOD).run_once().await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.dropped, 0);
        let booked = market.booked_courses();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn test_never_resurrects() {
        let h = Harness::new().await;
        let course = h.course("Sailing", 2, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        h.rent_directly(course, renter, h.hours_from_now(2)).await;

        let report = Reconciler::new(market.clone(), PERIOD).run_once().await;
        assert!(report.is_empty());
        assert!(market.booked_courses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_converges_within_one_period() {
        let h = Harness::new().await;
        let course = h.course("Skating", 2, h.hours_from_now(24)).await;
        let (renter, market) = h.renter().await;
        market.book(course, ExpiryPolicy::ScheduleEnd).await.unwrap();

        let handle = crate::start(Reconciler::new(market.clone(), PERIOD));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(market.booked_courses().len(), 1);

        h.unrent_as_owner(course, renter).await;
        tokio::time::sleep(PERIOD).await;
        assert!(market.booked_courses().is_empty());
        handle.abort();
    }
}
