//! Ember game-server front end.
//!
//! Binds a TCP listener, registers the game opcode handlers, and serves
//! length-prefixed frames until Ctrl-C.
//!
//! Run with: `cargo run -p ember-server`

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ember_config::{CliArgs, Config};
use ember_net::dispatch::DispatchRegistry;
use ember_net::gateway::{Gateway, GatewayConfig};
use tracing::{error, info};

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    ember_log::init_logging(None, cfg!(debug_assertions), Some(&config));

    let bind_addr = match config.bind_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!(
                "invalid bind address {}:{}: {err}",
                config.network.bind_address, config.network.port
            );
            std::process::exit(1);
        }
    };

    info!("Ember server");
    info!(
        "Listening on {bind_addr} | max connections: {} | workers: {}",
        config.network.max_connections, config.network.worker_threads
    );

    let mut registry = DispatchRegistry::new();
    handlers::register_all(&mut registry);

    let gateway = Arc::new(Gateway::new(
        GatewayConfig {
            bind_addr,
            max_connections: config.network.max_connections,
        },
        Arc::new(registry),
        Arc::new(handlers::GameHooks),
    ));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.network.worker_threads)
        .thread_name("ember-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to build runtime: {err}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let serve = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                if let Err(err) = gateway.run().await {
                    error!("gateway stopped: {err}");
                }
            })
        };

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => error!("failed to listen for shutdown signal: {err}"),
        }
        gateway.shutdown();
        let _ = serve.await;
    });

    info!("Ember server stopped");
}
