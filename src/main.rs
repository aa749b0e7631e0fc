//! Feed carousel service: binary entrypoint.
//! Loads config, builds the carousel, runs the first load cycle in the
//! background and serves the HTTP projection.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_carousel::config;
use feed_carousel::{start_app, LiveTransport};

/// Compact logs by default, JSON when `LOG_FORMAT=json`.
/// `try_init` because the deployment runtime may already own a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_carousel=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading carousel config")?;
    tracing::info!(
        sources = cfg.sources.len(),
        total_displayed = cfg.total_displayed(),
        preload = cfg.preload_count(),
        "config loaded"
    );

    let transport = LiveTransport::new(&cfg.user_agent, cfg.fetch_timeout())
        .context("building feed transport")?;
    let (_carousel, router) = start_app(&cfg, Arc::new(transport))?;

    Ok(router.into())
}
