mod cli;
mod error;

use std::path::Path;
use std::sync::Arc;

use carrot_api::{CarrotClient, TlsMode};
use carrot_bridge::{Bridge, ReconnectConfig};
use carrot_config::Settings;
use carrot_core::{CarrotAccount, DeviceId, LightHub};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::AppError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = carrot_config::load_settings(cli.config.as_deref())?;

    if cli.check_config {
        print_summary(cli.config.as_deref(), &settings);
        return Ok(());
    }

    let Settings {
        server,
        account,
        transport,
        mqtt,
        topics,
        cache,
    } = settings;

    let client = CarrotClient::new(server, &transport)?;
    let cancel = CancellationToken::new();
    let hub = LightHub::new(
        Arc::new(CarrotAccount::new(client, account)),
        cache,
        cancel.clone(),
    );

    let (bus, driver) = carrot_bridge::mqtt::connect(&mqtt, ReconnectConfig::default())?;
    let bridge = Bridge::new(hub, Arc::new(bus), topics);

    let driver_task = tokio::spawn(driver.run(bridge.clone(), cancel.clone()));
    let mut bridge_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { bridge.run(cancel).await }
    });
    info!("carrot-home running");

    let early_exit = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown requested");
            None
        }
        result = &mut bridge_task => Some(result),
    };

    cancel.cancel();
    let bridge_result = match early_exit {
        Some(result) => result,
        None => bridge_task.await,
    };
    if let Err(e) = driver_task.await {
        warn!(error = %e, "MQTT driver task failed");
    }

    bridge_result.map_err(|e| AppError::Internal(format!("bridge task failed: {e}")))??;
    info!("carrot-home stopped");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

// ── Config summary ──────────────────────────────────────────────────

fn print_summary(explicit: Option<&Path>, settings: &Settings) {
    let path = explicit.map_or_else(carrot_config::config_path, Path::to_path_buf);
    let sample = DeviceId::new(1);
    let topics = &settings.topics;
    let mqtt = &settings.mqtt;
    let cache = &settings.cache;

    println!("config file : {}", path.display());
    println!(
        "carrot      : {} as {} (tls {}, timeout {})",
        settings.server,
        settings.account.email,
        match settings.transport.tls {
            TlsMode::System => "verified",
            TlsMode::DangerAcceptInvalid => "unverified",
        },
        humantime::format_duration(settings.transport.timeout),
    );
    println!(
        "mqtt        : {}:{} (tls {}, client id {}, user {})",
        mqtt.host,
        mqtt.port,
        if mqtt.use_tls { "on" } else { "off" },
        mqtt.client_id,
        mqtt.user.as_deref().unwrap_or("<anonymous>"),
    );
    println!("discovery   : {}", topics.config_topic(sample));
    println!("commands    : {}", topics.command_filter());
    println!("echo        : {}", topics.echo_topic(sample));
    println!("ha status   : {}", topics.status_topic());
    println!(
        "cache       : settle {}, poll every {}, re-login every {}",
        humantime::format_duration(cache.settle_delay),
        humantime::format_duration(cache.poll_interval),
        humantime::format_duration(cache.renewal_interval),
    );
}
