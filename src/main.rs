// src/main.rs

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolbroker::api::build_router;
use toolbroker::config::OrchestratorConfig;
use toolbroker::state::AppState;
use toolbroker::watcher::Watcher;

#[derive(Parser, Debug)]
#[command(name = "toolbrokerd", about = "Agent tool-routing and skill-execution control plane")]
struct CliArgs {
    #[arg(long, env = "ORCH_HOST")]
    host: Option<String>,

    #[arg(long, env = "ORCH_PORT")]
    port: Option<u16>,

    #[arg(long, env = "ORCH_PROVIDER_CONFIG")]
    provider_config: Option<String>,

    #[arg(long, env = "FAIL_MODE")]
    fail_mode: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let mut config = OrchestratorConfig::from_env();

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.provider_config {
        config.paths.provider_config_path = path.into();
    }
    if let Some(mode) = args.fail_mode {
        config.fail_mode = match mode.as_str() {
            "open" => toolbroker::config::FailMode::Open,
            _ => toolbroker::config::FailMode::Closed,
        };
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config.validate()?;

    let bind_address = config.server.bind_address();
    let provider_config_path = config.paths.provider_config_path.clone();
    let timing = config.timing.clone();

    let state = Arc::new(AppState::new(config).await);
    state.router.register_custom_tools(custom_tool_defs()).await;

    let watcher = Arc::new(Watcher::new(
        provider_config_path,
        state.supervisor.clone(),
        state.router.clone(),
    ));
    watcher.load_initial().await?;

    tokio::spawn(watcher.clone().run());
    tokio::spawn(
        state
            .supervisor
            .clone()
            .run_health_loop(std::time::Duration::from_millis(timing.provider_health_interval_ms)),
    );
    tokio::spawn(state.poller.clone().run());
    tokio::spawn(state.job_poller.clone().run());

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "toolbrokerd listening");

    let shutdown_state = state.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_state))
        .await?;

    Ok(())
}

/// The six in-process tools, registered into the catalog so they are
/// listed by `getToolDefinitions()` even though the API layer dispatches
/// them directly rather than through `routeToolCall`.
fn custom_tool_defs() -> Vec<toolbroker::router::ToolDef> {
    [
        "get_status",
        "queue_task",
        "get_job_status",
        "spawn_subagent",
        "get_tool_catalog",
        "trigger_backfill",
    ]
    .into_iter()
    .map(|name| toolbroker::router::ToolDef {
        exposed_name: name.to_string(),
        original_name: name.to_string(),
        provider_name: "core".to_string(),
        description: None,
        input_schema: None,
        annotations: None,
        custom: true,
        sensitive: false,
    })
    .collect()
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining providers");
    state.supervisor.shutdown_all().await;
}
