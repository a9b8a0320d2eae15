use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ratings::RatingMaintainer;
use crate::store::RatingStore;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Periodic reconciliation of stored average ratings.
///
/// Review mutations already keep averages current; the sweep repairs rows that were
/// changed outside the catalog service (manual SQL, restores).
#[derive(Debug)]
pub struct RatingSweepWorker;

impl RatingSweepWorker {
    /// Spawn the sweep on the current tokio runtime. The first pass runs after one
    /// full `interval`.
    pub fn spawn<S>(maintainer: RatingMaintainer<S>, interval: Duration) -> WorkerHandle
    where
        S: RatingStore + ?Sized + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(sweep_loop(maintainer, interval, shutdown_rx));

        info!(interval_secs = interval.as_secs(), "rating sweep worker started");
        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

async fn sweep_loop<S>(
    maintainer: RatingMaintainer<S>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    S: RatingStore + ?Sized,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                match maintainer.reconcile().await {
                    Ok(0) => debug!("rating sweep found no drift"),
                    Ok(changed) => info!(changed, "rating sweep corrected stored averages"),
                    Err(err) => warn!(error = %err, "rating sweep failed"),
                }
            }
        }
    }

    debug!("rating sweep worker stopped");
}
