//! Bucket CLI: boots the kernel and bridges it to IRC.

mod cli;

use crate::cli::{Cli, Commands};
use bucket_channels::irc::IrcAdapter;
use bucket_kernel::config::load_config;
use bucket_kernel::BucketKernel;
use bucket_types::config::BucketConfig;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

fn init_tracing_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing_stderr();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Start => cmd_start(config),
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

fn cmd_check_config(config: &BucketConfig) {
    println!("nick:    {}", config.nick);
    println!("server:  {}:{}", config.irc.server, config.irc.port);
    println!("owner:   {}", config.owner.as_deref().unwrap_or("(none)"));
    match &config.storage.path {
        Some(path) => println!("storage: {:?} at {}", config.storage.backend, path.display()),
        None => println!("storage: {:?}", config.storage.backend),
    }
    println!("spacing: {} ms", config.reply_spacing_ms);
    if config.channels.is_empty() {
        println!("No channels configured; `bucket start` will refuse to run.");
        return;
    }
    println!("channels:");
    for binding in &config.channels {
        println!("  {:<20} -> {}", binding.channel, binding.bucket);
    }
}

fn cmd_start(config: BucketConfig) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            std::process::exit(1);
        }
    };

    rt.block_on(async move {
        let kernel = match BucketKernel::boot(config) {
            Ok(kernel) => kernel,
            Err(e) => {
                eprintln!("Failed to boot: {e}");
                std::process::exit(1);
            }
        };

        let settings = kernel.config();
        let adapter = Arc::new(IrcAdapter::new(
            settings.irc.server.clone(),
            settings.irc.port,
            settings.nick.clone(),
            settings.irc.password.clone(),
            settings.channel_names(),
        ));

        let mut bridge = kernel.bridge();
        if let Err(e) = bridge.start_adapter(adapter).await {
            error!("Failed to start IRC adapter: {e}");
            std::process::exit(1);
        }
        info!(
            server = %settings.irc.server,
            channels = settings.channels.len(),
            "Bucket is running, press Ctrl+C to stop"
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Shutting down");
        bridge.stop().await;
    });
}
