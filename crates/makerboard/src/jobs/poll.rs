use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(v) => Some(v),
            PollOutcome::TimedOut { .. } => None,
        }
    }
}

/// Probes every `interval` until the probe yields a value or `timeout`
/// runs out. Probe errors are logged and count as "not yet".
pub async fn poll_until<T, E, F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe().await {
            Ok(Some(v)) => return PollOutcome::Ready(v),
            Ok(None) => {}
            Err(e) => tracing::warn!(attempt = attempts, error = %e, "poll probe failed"),
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut { attempts };
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
