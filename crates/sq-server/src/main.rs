use anyhow::Context;
use sq_core::SqueezeConfig;
use sq_policy::PolicyConfig;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn load_policy() -> anyhow::Result<PolicyConfig> {
    match std::env::var("SQUEEZE_POLICY_FILE") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading policy file {path}"))?;
            let policy = PolicyConfig::from_json(&raw).with_context(|| format!("parsing policy file {path}"))?;
            tracing::info!(path = %path, rules = policy.rules.len(), "loaded policy file");
            Ok(policy)
        }
        Err(_) => Ok(PolicyConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squeeze_server=debug,sq_server=debug,sq_engine=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SqueezeConfig::from_env();
    let policy = load_policy()?;
    let addr = config.bind_addr();

    tracing::info!("Starting Squeeze v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        upload_dir = %config.storage.upload_dir.display(),
        cleanup_delay_secs = config.storage.cleanup_delay_secs,
        margin = config.evaluator.margin,
        ghostscript = %config.strategies.ghostscript_path,
        ceiling = policy.hard_ceiling(),
        "configuration loaded"
    );

    let app = sq_server::app(&config, policy);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Squeeze listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
