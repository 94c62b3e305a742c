use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::EffectiveConfig;

/// One periodic timer: sleep, run the job to completion, repeat.
///
/// Running the job on the timer task itself gives tick coalescing for free:
/// a cycle that overruns its period delays the next tick instead of stacking
/// a second cycle of the same kind. The period is re-read from the config
/// watch before every sleep, so a server-pushed interval takes effect at the
/// next tick and never retroactively. Shutdown lets an in-flight cycle
/// finish.
pub struct PeriodicTask {
    pub name: &'static str,
    pub config: watch::Receiver<EffectiveConfig>,
    pub period: fn(&EffectiveConfig) -> Duration,
    pub shutdown: watch::Receiver<bool>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(mut self, mut job: F) -> JoinHandle<()>
    where
        F: FnMut(EffectiveConfig) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            loop {
                let period = (self.period)(&self.config.borrow());
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = self.shutdown.wait_for(|stop| *stop) => break,
                }
                let cfg = self.config.borrow().clone();
                tracing::debug!(task = self.name, "tick");
                job(cfg).await;
            }
            tracing::debug!(task = self.name, "stopped");
        })
    }
}
