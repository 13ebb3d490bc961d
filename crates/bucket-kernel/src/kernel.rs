//! Kernel assembly: buckets, dispatcher and the shared reply throttle.

use crate::dispatcher::Dispatcher;
use crate::error::{KernelError, KernelResult};
use bucket_channels::bridge::BridgeManager;
use bucket_channels::throttle::ReplyThrottle;
use bucket_memory::Buckets;
use bucket_types::config::BucketConfig;
use std::sync::Arc;
use tracing::info;

/// The running bot, minus its transports.
pub struct BucketKernel {
    config: BucketConfig,
    buckets: Buckets,
    dispatcher: Arc<Dispatcher>,
    throttle: Arc<ReplyThrottle>,
}

impl BucketKernel {
    /// Open the configured buckets and build the dispatcher.
    pub fn boot(config: BucketConfig) -> KernelResult<Self> {
        let mut names = config.bucket_names();
        names.extend(config.storage.buckets.iter().cloned());
        let buckets = Buckets::open(&config.storage, names)?;
        Self::boot_with_buckets(config, buckets)
    }

    /// Boot over already opened buckets.
    pub fn boot_with_buckets(config: BucketConfig, buckets: Buckets) -> KernelResult<Self> {
        config.validate()?;
        if config.channels.is_empty() {
            return Err(KernelError::BootFailed(
                "no channels configured; add at least one [[channels]] entry".into(),
            ));
        }

        let dispatcher = Arc::new(Dispatcher::new(&config, &buckets)?);
        let throttle = Arc::new(ReplyThrottle::new(config.reply_spacing()));
        info!(
            nick = %config.nick,
            channels = config.channels.len(),
            buckets = buckets.len(),
            spacing_ms = config.reply_spacing_ms,
            "Bucket kernel booted"
        );
        Ok(Self {
            config,
            buckets,
            dispatcher,
            throttle,
        })
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn throttle(&self) -> &Arc<ReplyThrottle> {
        &self.throttle
    }

    /// A bridge that feeds adapter messages to this kernel.
    pub fn bridge(&self) -> BridgeManager {
        BridgeManager::new(self.dispatcher.clone(), self.throttle.clone())
    }
}
