pub mod booking;
pub mod catalog;
pub mod courses;
pub mod resolver;
pub mod trainers;
pub mod users;

use std::time::Duration as StdDuration;

use chain::{settlement::Receipt, Settlement, TxHandle};
use chrono::Duration;
use log::{info, warn};
use model::errors::MarketError;

/// Waits for `tx` to settle, calling `on_wait` with the total time waited
/// every `notice`. There is no timeout.
pub(crate) async fn await_confirmation(
    chain: &dyn Settlement,
    tx: TxHandle,
    what: &str,
    notice: StdDuration,
    mut on_wait: impl FnMut(Duration),
) -> Result<Receipt, MarketError> {
    let confirmation = chain.confirm(tx);
    tokio::pin!(confirmation);
    let mut ticker = tokio::time::interval(notice);
    ticker.tick().await;
    let step = Duration::milliseconds(notice.as_millis() as i64);
    let mut waited = Duration::zero();

    loop {
        tokio::select! {
            outcome = &mut confirmation => {
                return match outcome?.into_result() {
                    Ok(receipt) => {
                        info!("{} confirmed in block {}", what, receipt.block);
                        Ok(receipt)
                    }
                    Err(revert) => {
                        warn!("{} reverted: {}", what, revert);
                        Err(revert.into())
                    }
                };
            }
            _ = ticker.tick() => {
                waited = waited + step;
                info!("Still waiting for {} (tx {}), {}s so far", what, tx.0, waited.num_seconds());
                on_wait(waited);
            }
        }
    }
}
