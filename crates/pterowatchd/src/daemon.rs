//! Daemon assembly: config → panel client → registry → scheduler → API.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::sync::watch;
use tracing::{error, info, warn};

use pterowatch_core::config::TOKEN_ENV;
use pterowatch_core::{Policy, WatchConfig, format_duration};
use pterowatch_health::{WatchScheduler, Watchdog};
use pterowatch_panel::PanelClient;
use pterowatch_state::{Registry, ServerSpec};

/// Run the watcher until Ctrl-C.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    info!(path = %config_path.display(), "pterowatch daemon starting");

    let config = WatchConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let defaults = config.default_policy()?;

    // ── Initialize subsystems ──────────────────────────────────

    // Panel client.
    let token = config
        .token()
        .ok_or_else(|| anyhow!("no panel token: set [panel].token or {TOKEN_ENV}"))?;
    let panel = Arc::new(PanelClient::new(
        &config.panel.url,
        token,
        config.request_timeout()?,
    )?);
    info!(url = %panel.base_url(), "panel client initialized");

    // Registry.
    let registry = load_registry(&config, &defaults).await?;
    info!(servers = registry.len().await, "static roster loaded");

    // Shutdown signal.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Scheduler.
    let scheduler = WatchScheduler::new(registry, panel.clone(), panel.clone(), shutdown_rx.clone())
        .with_call_timeout(config.probe_timeout()?);
    let watchdog = Watchdog::new(scheduler);

    if config.watch.discover {
        let added = watchdog.discover(panel.as_ref(), &defaults).await;
        info!(added, "server discovery finished");
    }

    // ── Start background tasks ─────────────────────────────────

    let scheduler_handle = {
        let watchdog = watchdog.clone();
        tokio::spawn(async move { watchdog.scheduler().run().await })
    };

    // ── Start API server ───────────────────────────────────────

    let api_handle = match &config.api {
        Some(api) => {
            let addr: SocketAddr = api
                .listen
                .parse()
                .with_context(|| format!("invalid [api].listen address {:?}", api.listen))?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "API server starting");

            let router = pterowatch_api::build_router(watchdog.clone(), defaults);
            let mut api_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        while !*api_shutdown.borrow() {
                            if api_shutdown.changed().await.is_err() {
                                break;
                            }
                        }
                    })
                    .await
            }))
        }
        None => None,
    };

    wait_for_ctrl_c().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = api_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "API server failed"),
            Err(e) => error!(error = %e, "API server task panicked"),
        }
    }
    let _ = scheduler_handle.await;

    info!("pterowatch daemon stopped");
    Ok(())
}

/// Validate the configuration and print the resolved roster.
pub fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = WatchConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if config.token().is_none() {
        warn!("no panel token configured; `run` requires [panel].token or {TOKEN_ENV}");
    }
    print!("{}", render_roster(&config)?);
    Ok(())
}

/// Build the registry from the `[[servers]]` entries.
async fn load_registry(config: &WatchConfig, defaults: &Policy) -> anyhow::Result<Registry> {
    let registry = Registry::new();
    for entry in &config.servers {
        let spec = ServerSpec::from_entry(entry, defaults)?;
        registry.upsert(spec).await?;
    }
    Ok(registry)
}

fn render_roster(config: &WatchConfig) -> anyhow::Result<String> {
    let defaults = config.default_policy()?;
    let mut out = String::new();

    writeln!(out, "panel: {}", config.panel.url)?;
    writeln!(out, "discover: {}", config.watch.discover)?;
    if let Some(api) = &config.api {
        writeln!(out, "api: {}", api.listen)?;
    }
    writeln!(out, "servers: {}", config.servers.len())?;

    for entry in &config.servers {
        let policy = entry.policy(&defaults)?;
        writeln!(
            out,
            "  {} {} enabled={} interval={} failures={} restarts={} cooldown={}",
            entry.id,
            entry.endpoint(),
            entry.enabled,
            format_duration(policy.scan_interval),
            policy.max_failures,
            policy.max_restarts,
            format_duration(policy.restart_cooldown),
        )?;
    }
    Ok(out)
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler; shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CONFIG: &str = r#"
[panel]
url = "https://panel.example.com"
token = "ptlc_test"

[defaults]
max_failures = 3

[[servers]]
id = "a1b2c3d4"
ip = "10.0.0.5"
port = 27015

[[servers]]
id = "e5f6a7b8"
ip = "10.0.0.6"
port = 27016
enabled = false
scan_interval = "30s"
"#;

    #[tokio::test]
    async fn registry_holds_static_roster() {
        let config = WatchConfig::parse(CONFIG).unwrap();
        let defaults = config.default_policy().unwrap();
        let registry = load_registry(&config, &defaults).await.unwrap();

        assert_eq!(registry.len().await, 2);
        let first = registry.get("a1b2c3d4").await.unwrap();
        assert!(first.spec.enabled);
        assert_eq!(first.spec.policy.max_failures, 3);

        let second = registry.get("e5f6a7b8").await.unwrap();
        assert!(!second.spec.enabled);
        assert_eq!(second.spec.policy.scan_interval, Duration::from_secs(30));
    }

    #[test]
    fn roster_lists_resolved_policies() {
        let config = WatchConfig::parse(CONFIG).unwrap();
        let out = render_roster(&config).unwrap();

        assert!(out.contains("servers: 2"));
        assert!(out.contains("a1b2c3d4 10.0.0.5:27015 enabled=true"));
        assert!(out.contains("failures=3"));
        assert!(out.contains("e5f6a7b8 10.0.0.6:27016 enabled=false interval=30s"));
    }

    #[test]
    fn check_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pterowatch.toml");
        std::fs::write(&path, CONFIG).unwrap();
        check_config(&path).unwrap();
    }

    #[test]
    fn check_config_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_config(&dir.path().join("absent.toml")).is_err());
    }
}
