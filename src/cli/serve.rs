use anyhow::{Result, bail};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::CommonFlags;
use crate::core::config::AppConfig;
use crate::core::db::ConnectionPool;
use crate::core::job::{ExecutionContext, JobRegistry, RunOutcome};
use crate::core::lifecycle::LifecycleManager;
use crate::core::notify::LineNotifier;
use crate::core::scheduler::MonitorScheduler;
use crate::core::terminal;
use crate::interfaces::web::{StatusServer, StatusServerConfig};
use crate::queries;

/// Catalogue jobs first, then config-declared jobs, in file order.
pub(crate) fn build_registry(config: &AppConfig) -> Result<JobRegistry> {
    let mut registry = JobRegistry::new();
    for name in &config.builtin_jobs {
        registry.register(queries::builtin(name)?)?;
    }
    for job in &config.jobs {
        registry.register(job.build()?)?;
    }
    Ok(registry)
}

async fn execution_context(config: &AppConfig) -> Result<ExecutionContext> {
    let pool = ConnectionPool::new(config.dsn.clone(), config.pool_options());
    pool.ping().await?;

    if config.default_token.is_empty() {
        terminal::print_warn("No default_token configured; jobs without their own token cannot deliver.");
    }

    let notifier = LineNotifier::new(config.notifier_options())?;
    Ok(ExecutionContext {
        source: Arc::new(pool),
        notifier: Arc::new(notifier),
        default_token: config.default_token.clone(),
    })
}

pub async fn run_server(flags: CommonFlags, host: Option<String>, port: Option<u16>) -> Result<()> {
    let log_tx = crate::logging::init(flags.log_level);
    info!("Starting dbnotify {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&flags.config_path).await?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let ctx = execution_context(&config).await?;
    let registry = Arc::new(build_registry(&config)?);

    let mut scheduler = MonitorScheduler::new().await?;
    scheduler.register_all(&registry, &ctx).await?;

    let server = StatusServer::new(StatusServerConfig {
        registry: registry.clone(),
        log_tx,
        host: config.server.host.clone(),
        port: config.server.port,
    });
    let address = server.address();

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(scheduler)));
    lifecycle.attach(Arc::new(Mutex::new(server)));
    lifecycle.start().await?;

    terminal::print_success(&format!("{} job(s) scheduled", registry.len()));
    terminal::print_link("Status", &format!("http://{}/status", address));
    terminal::print_status("Stop", "Ctrl+C");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}

pub async fn list_jobs(flags: CommonFlags) -> Result<()> {
    let config = AppConfig::load(&flags.config_path).await?;
    let registry = build_registry(&config)?;

    terminal::print_section(&format!("{} registered job(s)", registry.len()));
    for job in registry.jobs() {
        terminal::print_job(job.name(), job.cron(), &job.description());
    }
    println!();
    Ok(())
}

pub async fn run_once(flags: CommonFlags, job_name: &str) -> Result<()> {
    crate::logging::init(flags.log_level);

    let config = AppConfig::load(&flags.config_path).await?;
    let registry = build_registry(&config)?;
    let Some(job) = registry.get(job_name) else {
        let known: Vec<&str> = registry.jobs().iter().map(|j| j.name()).collect();
        bail!("No job named '{}' (registered: {})", job_name, known.join(", "));
    };

    let ctx = execution_context(&config).await?;
    match job.execute(&ctx).await {
        RunOutcome::Delivered { chunks } => {
            terminal::print_success(&format!("{}: delivered in {} message(s)", job.name(), chunks))
        }
        RunOutcome::Suppressed => {
            terminal::print_info(&format!("{}: nothing to report", job.name()))
        }
        RunOutcome::DeliveryFailed(reason) => {
            terminal::print_warn(&format!("{}: report built but not delivered: {}", job.name(), reason))
        }
        RunOutcome::Failed(reason) => bail!("{} failed: {}", job.name(), reason),
    }
    Ok(())
}
