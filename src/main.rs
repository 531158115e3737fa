use anyhow::{Context, Result};
use std::sync::Arc;

mod config;
mod functions;
mod schema;
mod services;

#[cfg(test)]
mod test_support;

use config::Config;
use functions::{AppState, JobContext, JobRunner};
use services::{CritiqueEngine, EdenAiClient, GitFetcher, InMemoryJobStore, JobStore};

fn init_critic(config: &Config) -> Result<Option<Arc<dyn CritiqueEngine>>> {
    let Some(client_config) = config.critique_client() else {
        tracing::warn!("LLM_API_KEY not set, auto-critique runs will fail");
        return Ok(None);
    };
    let client = EdenAiClient::new(client_config).context("failed to create critique client")?;
    Ok(Some(Arc::new(client)))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tokio::fs::create_dir_all(&config.snapshot_dir)
        .await
        .with_context(|| format!("failed to create {}", config.snapshot_dir.display()))?;

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let ctx = Arc::new(JobContext {
        store: Arc::clone(&store),
        fetcher: Arc::new(GitFetcher::new(config.snapshot_dir.clone())),
        critic: init_critic(&config)?,
        config: config.clone(),
    });
    let runner = Arc::new(JobRunner::new(ctx));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reaper = config.snapshot_ttl.map(|ttl| {
        tokio::spawn(functions::run_reaper(
            Arc::clone(&store),
            ttl,
            config.reaper_interval,
            shutdown_rx,
        ))
    });

    let app = functions::router(AppState::new(Arc::clone(&runner)));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "repo critic listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shutting down");
    shutdown_tx.send(true).ok();
    if let Some(reaper) = reaper {
        reaper.await.ok();
    }
    runner.abort_all();
    let removed = functions::remove_all_snapshots(store.as_ref()).await;
    tracing::info!(removed, "repository snapshots removed");
    Ok(())
}
