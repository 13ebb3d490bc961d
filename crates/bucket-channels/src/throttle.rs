//! Bot-wide reply pacing.
//!
//! Every outbound reply goes through one `ReplyThrottle`. Only one reply is
//! transmitted at a time, and two transmissions are always at least
//! `spacing` apart. Waiters are admitted in arrival order because
//! `tokio::sync::Mutex` is fair; nothing is ever dropped.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serializes and paces outbound replies.
#[derive(Debug)]
pub struct ReplyThrottle {
    spacing: Duration,
    /// When the previous transmission finished, `None` before the first one.
    last_sent: Mutex<Option<Instant>>,
}

impl ReplyThrottle {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_sent: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for our turn, then hand `text` to `transmit`.
    ///
    /// Empty or whitespace-only text is dropped without waiting and without
    /// consuming a slot; the result is then `Ok(false)`. Otherwise returns
    /// `Ok(true)` once `transmit` succeeded, or its error. A failed
    /// transmission still counts as a slot.
    pub async fn send<F, Fut, E>(&self, text: &str, transmit: F) -> Result<bool, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let mut last_sent = self.last_sent.lock().await;
        if let Some(previous) = *last_sent {
            let ready_at = previous + self.spacing;
            if ready_at > Instant::now() {
                debug!(wait = ?(ready_at - Instant::now()), "Reply throttled");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let result = transmit(text.to_string()).await;
        *last_sent = Some(Instant::now());
        result.map(|()| true)
    }
}

impl Default for ReplyThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
