use std::time::Duration as StdDuration;

use chrono::Duration;
use model::address::Address;

pub const DEFAULT_CATALOG_CONCURRENCY: usize = 4;
pub const DEFAULT_RENT_WINDOW_SECS: i64 = 3600;
pub const MIN_EXPIRY_BUFFER_SECS: i64 = 60;
pub const CONFIRM_NOTICE_SECS: u64 = 10;

/// Explicit configuration of the client core.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub registry: Address,
    /// Maximum number of courses resolved at once while loading the catalog.
    pub catalog_concurrency: usize,
    /// Rental length used when a course has no schedule end.
    pub rent_window: Duration,
    /// A requested expiry is never earlier than now plus this buffer.
    pub min_expiry_buffer: Duration,
    /// Period of the "still waiting" notice while a transaction is pending.
    pub confirm_notice: StdDuration,
}

impl MarketConfig {
    pub fn new(registry: Address) -> MarketConfig {
        MarketConfig {
            registry,
            catalog_concurrency: DEFAULT_CATALOG_CONCURRENCY,
            rent_window: Duration::seconds(DEFAULT_RENT_WINDOW_SECS),
            min_expiry_buffer: Duration::seconds(MIN_EXPIRY_BUFFER_SECS),
            confirm_notice: StdDuration::from_secs(CONFIRM_NOTICE_SECS),
        }
    }

    pub fn with_catalog_concurrency(mut self, concurrency: usize) -> MarketConfig {
        self.catalog_concurrency = concurrency.max(1);
        self
    }

    pub fn with_rent_window(mut self, window: Duration) -> MarketConfig {
        self.rent_window = window;
        self
    }
}
