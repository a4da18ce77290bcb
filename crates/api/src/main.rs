use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeserver_api::config::ServerConfig;
use codeserver_api::router::build_app_router;
use codeserver_api::state::AppState;
use codeserver_core::compiler::CommandCompiler;
use codeserver_core::job_runner::JobRunner;
use codeserver_core::outbox_table::OutboxTable;
use codeserver_core::progress::ProgressTable;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "codeserver_api=debug,codeserver_core=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(
        host = %config.host,
        port = config.port,
        modules = config.modules.len(),
        work_dir = %config.work_dir.display(),
        "Loaded server configuration",
    );

    // --- Outboxes ---
    let outboxes = OutboxTable::create(&config.modules, &config.work_dir)
        .await
        .expect("Failed to create module output directories");
    let outboxes = Arc::new(outboxes);

    // --- Job runner ---
    let progress = Arc::new(ProgressTable::new());
    let compiler = Arc::new(CommandCompiler::new(
        config.compiler_command.clone(),
        config.compiler_args.clone(),
    ));
    let runner = JobRunner::start(
        compiler,
        &outboxes,
        Arc::clone(&progress),
        config.keep_compiles,
    );

    // --- Startup compile ---
    if config.precompile {
        tracing::info!("Compiling all modules before accepting requests");
        for (module, result) in runner.compile_all().await {
            if result.is_ok() {
                tracing::info!(%module, "Initial compile succeeded");
            } else {
                tracing::warn!(%module, reason = result.message(), "Initial compile failed");
            }
        }
    }

    // --- App state ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let state = AppState::new(Arc::new(config), outboxes, progress, runner);

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting code server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
