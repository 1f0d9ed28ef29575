mod api;
mod runner;
mod scheduler;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[derive(Debug, Parser)]
#[command(name = "pulsewatch-server", about = "Incremental client insight sync")]
struct Args {
    /// Run a single sync and exit instead of starting the server.
    #[arg(long)]
    once: bool,

    /// Trigger label recorded on the sync run when using --once.
    #[arg(long, default_value = "manual")]
    trigger: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Arc::new(pulsewatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pulsewatch_db::PoolConfig::from_app_config(&config);
    let pool = pulsewatch_db::connect_pool(&config.database_url, pool_config).await?;
    pulsewatch_db::run_migrations(&pool).await?;

    if args.once {
        let summary = runner::run_once(&pool, &config, &args.trigger).await?;
        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "one-shot sync finished"
        );
        return Ok(());
    }

    // Shared between the startup run and the cron job so scheduled ticks
    // never overlap an in-flight run.
    let run_lock = Arc::new(Mutex::new(()));

    {
        let _guard = run_lock.lock().await;
        if let Err(e) = runner::run_once(&pool, &config, "startup").await {
            tracing::error!(error = %e, "startup sync run failed");
        }
    }

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&config), Arc::clone(&run_lock))
            .await?;

    let app = build_app(AppState { pool });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "admin api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
