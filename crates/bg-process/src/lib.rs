use std::time::Duration;

use async_trait::async_trait;
use eyre::Error;
use log::{error, info};
use tokio::{task::JoinHandle, time};

pub mod process;

pub use process::{reconcile::Reconciler, BgProcessor};

/// A periodic background job.
#[async_trait]
pub trait Task {
    const NAME: &'static str;

    fn period(&self) -> Duration;

    async fn process(&mut self) -> Result<(), Error>;
}

/// Runs `task` every `period` until the runtime shuts down. A failed run is
/// logged and the next tick proceeds as usual.
pub fn start<T>(mut task: T) -> JoinHandle<()>
where
    T: Task + Send + 'static,
{
    tokio::spawn(async move {
        info!("Starting background task {}", T::NAME);
        let mut interval = time::interval(task.period());
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = task.process().await {
                error!("Error in background task {}: {:#}", T::NAME, err);
            }
        }
    })
}
