use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Interval task bound to a cancellation token and joined on stop.
#[derive(Debug)]
pub(crate) struct PollTask {
    name: &'static str,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollTask {
    /// Run `tick` every `period` until `token` is cancelled.
    ///
    /// An in-flight tick is abandoned at the next suspension point once the
    /// token fires.
    pub(crate) fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        token: CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            () = shutdown.cancelled() => break,
                            () = tick() => {}
                        }
                    }
                }
            }
            debug!(task = name, "poll task stopped");
        });
        Self {
            name,
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancel the task and wait for it to finish.
    pub(crate) async fn stop(&self) {
        self.token.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(task = self.name, error = %err, "poll task ended abnormally");
        }
    }
}
