//! rust-torrent-seeder - Main entry point
//!
//! Loads every torrent in a directory and keeps announcing them to their
//! trackers until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_torrent_seeder::{
    AnnounceContext, CliArgs, ClientSettings, Config, HttpTransport, IdentityStore, JsonFileBackend,
    SeederManager, SettingsHandle, SystemClock,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            error!("PANIC occurred at unknown location");
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("rust-torrent-seeder starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;

    let settings = config.apply_overrides(ClientSettings::load(&config.settings_file).await);
    settings.validate().context("Invalid client settings")?;

    tokio::fs::create_dir_all(&config.torrent_dir)
        .await
        .with_context(|| format!("Failed to create torrent directory {}", config.torrent_dir.display()))?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let backend = Arc::new(JsonFileBackend::new(&config.state_file));
    let store = Arc::new(IdentityStore::open_with_rng(backend, settings.port, StdRng::seed_from_u64(rng.gen())).await);
    if config.port.is_some() {
        if let Err(e) = store.set_port(settings.port).await {
            warn!("Port override not persisted: {}", e);
        }
        if let Err(e) = settings.save(&config.settings_file).await {
            warn!("Settings not saved: {}", e);
        }
    }

    let transport = Arc::new(HttpTransport::new(config.request_timeout).context("Failed to create HTTP client")?);
    let ctx = Arc::new(AnnounceContext {
        store: store.clone(),
        transport,
        settings: SettingsHandle::new(settings.clone()),
        clock: Arc::new(SystemClock),
        request_timeout: config.request_timeout,
        upload_step_max: config.upload_step_max,
    });
    let manager = SeederManager::new(ctx, config.settings_file.clone(), config.tick_interval, rng);

    display_config(&config, &settings);

    let count = manager
        .reload(&config.torrent_dir)
        .await
        .context("Failed to load torrents")?;
    if count == 0 {
        warn!("No torrents found in {}", config.torrent_dir.display());
    }
    if !args.quiet {
        for summary in manager.list().await {
            println!("{}", summary);
            println!();
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    manager.run(shutdown_rx).await;

    if let Err(e) = store.save().await {
        warn!("Final save of announce identities failed: {}", e);
    }
    println!("Seeding stopped");
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let level = args.log_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// Print the effective configuration
fn display_config(config: &Config, settings: &ClientSettings) {
    println!("Configuration:");
    println!("  Torrent directory: {}", config.torrent_dir.display());
    println!("  Identity file: {}", config.state_file.display());
    println!("  Settings file: {}", config.settings_file.display());
    println!("  User agent: {}", settings.user_agent);
    println!("  Port: {}", settings.port);
    println!("  Check interval: {}s", config.tick_interval.as_secs());
    println!("  Tracker timeout: {}s", config.request_timeout.as_secs());
    println!();
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
