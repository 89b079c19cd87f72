//! GcLoop - 終了した round の掃除
//!
//! succeeded / dead になってから `retention` を過ぎた submission を queue から
//! 消す。消えた submission の status は 404 になる。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::ports::Clock;
use crate::queue::RoundQueue;

/// Sweep period. Retention is checked against record timestamps, so the
/// period only bounds how late a record may linger past its retention.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// GcLoop は一定間隔で `sweep` を呼ぶ
pub struct GcLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl GcLoop {
    pub fn spawn(queue: Arc<dyn RoundQueue>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        sweep(queue.as_ref(), clock.as_ref(), retention).await;
                    }
                }
            }
        });
        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

/// Purge rounds that finished more than `retention` ago.
pub async fn sweep(queue: &dyn RoundQueue, clock: &dyn Clock, retention: Duration) -> usize {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
        return 0;
    };
    let Some(cutoff) = clock.now().checked_sub_signed(retention) else {
        return 0;
    };
    let purged = queue.purge_finished(cutoff).await;
    if purged > 0 {
        info!(purged, "finished rounds expired");
    }
    purged
}
