//! Delay primitive shared by request pacing and rate-limit backoff.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

/// Suspends the current task for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// `Sleeper` backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}

/// Fixed delay imposed before every remote request.
#[derive(Clone)]
pub struct RequestPacer {
    sleeper: Arc<dyn Sleeper>,
    delay: Duration,
}

impl RequestPacer {
    pub fn new(sleeper: Arc<dyn Sleeper>, delay: Duration) -> Self {
        Self { sleeper, delay }
    }

    /// Waits the fixed pacing delay. Called before every request, the first included.
    pub async fn pace(&self) {
        self.sleeper.sleep(self.delay).await;
    }

    /// Waits out a rate-limit signal.
    pub async fn backoff(&self, retry_after: Duration) {
        self.sleeper.sleep(retry_after).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;

    use super::Sleeper;

    /// Records requested suspensions without waiting.
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn calls(&self) -> Vec<Duration> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(duration);
            }
        }
    }
}
