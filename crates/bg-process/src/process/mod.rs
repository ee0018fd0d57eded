use std::time::Duration;

use market::Market;
use tokio::task::JoinHandle;

pub mod reconcile;

use reconcile::Reconciler;

pub struct BgProcessor {
    pub reconciler: Reconciler,
}

impl BgProcessor {
    pub fn new(market: Market, period: Duration) -> BgProcessor {
        BgProcessor {
            reconciler: Reconciler::new(market, period),
        }
    }

    pub fn start(self) -> Vec<JoinHandle<()>> {
        vec![crate::start(self.reconciler)]
    }
}
