// Periodic re-scoring until shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run `job` immediately and then every `period` until `shutdown` resolves.
/// Runs are strictly sequential; a run that overlaps the next tick delays
/// it instead of stacking up. Job errors are logged and the loop continues.
/// Returns the number of runs started.
pub async fn run_every<F, S>(period: Duration, shutdown: S, mut job: F) -> usize
where
    F: FnMut() -> anyhow::Result<()>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut runs = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested; stopping after {} runs", runs);
                break;
            }
            _ = ticker.tick() => {
                runs += 1;
                if let Err(e) = job() {
                    error!("Scoring run {} failed: {:#}", runs, e);
                }
            }
        }
    }
    runs
}
