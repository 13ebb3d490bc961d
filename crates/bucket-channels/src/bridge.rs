//! Channel bridge: connects channel adapters to the Bucket kernel.
//!
//! Defines `BridgeHandle` (implemented by the kernel's dispatcher) and
//! `BridgeManager`, which owns running adapters, feeds their messages to the
//! handle and sends the replies through the shared `ReplyThrottle`.

use crate::throttle::ReplyThrottle;
use crate::types::{ChannelAdapter, ChannelMessage};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Kernel operations needed by the bridge.
///
/// Defined here so the channel layer does not depend on the kernel.
#[async_trait]
pub trait BridgeHandle: Send + Sync {
    /// Process one inbound message, returning at most one reply.
    async fn handle_message(&self, message: &ChannelMessage) -> Option<String>;
}

/// Owns all running channel adapters and dispatches their messages.
pub struct BridgeManager {
    handle: Arc<dyn BridgeHandle>,
    throttle: Arc<ReplyThrottle>,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl BridgeManager {
    pub fn new(handle: Arc<dyn BridgeHandle>, throttle: Arc<ReplyThrottle>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            handle,
            throttle,
            adapters: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Start an adapter: subscribe to its message stream and spawn a dispatch task.
    ///
    /// Messages from one adapter are handled one at a time, in arrival order.
    pub async fn start_adapter(
        &mut self,
        adapter: Arc<dyn ChannelAdapter>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let stream = adapter.start().await?;
        let handle = self.handle.clone();
        let throttle = self.throttle.clone();
        let adapter_clone = adapter.clone();
        let mut shutdown = self.shutdown_rx.clone();

        let task = tokio::spawn(async move {
            let mut stream = std::pin::pin!(stream);
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        match msg {
                            Some(message) => {
                                dispatch_message(
                                    &message,
                                    &handle,
                                    adapter_clone.as_ref(),
                                    &throttle,
                                ).await;
                            }
                            None => {
                                info!("Channel adapter {} stream ended", adapter_clone.name());
                                break;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("Shutting down channel adapter {}", adapter_clone.name());
                            break;
                        }
                    }
                }
            }
        });

        self.adapters.push(adapter);
        self.tasks.push(task);
        Ok(())
    }

    /// Stop all adapters and wait for dispatch tasks to finish.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for adapter in self.adapters.drain(..) {
            if let Err(e) = adapter.stop().await {
                error!("Failed to stop channel adapter {}: {e}", adapter.name());
            }
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Send a reply through the throttle.
async fn send_response(
    adapter: &dyn ChannelAdapter,
    throttle: &ReplyThrottle,
    target: &str,
    text: String,
) {
    let result = throttle
        .send(&text, |text| async move { adapter.send(target, &text).await })
        .await;
    match result {
        Ok(true) => debug!(reply_target = target, "Reply sent"),
        Ok(false) => debug!(reply_target = target, "Blank reply suppressed"),
        Err(e) => error!("Failed to send response to {target}: {e}"),
    }
}

/// Dispatch a single incoming message and relay the reply, if any.
async fn dispatch_message(
    message: &ChannelMessage,
    handle: &Arc<dyn BridgeHandle>,
    adapter: &dyn ChannelAdapter,
    throttle: &ReplyThrottle,
) {
    let Some(reply) = handle.handle_message(message).await else {
        return;
    };
    send_response(adapter, throttle, message.reply_target(), reply).await;
}
