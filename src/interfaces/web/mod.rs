mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};

use crate::core::job::JobRegistry;
use crate::core::lifecycle::LifecycleComponent;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) log_tx: broadcast::Sender<String>,
}

pub struct StatusServerConfig {
    pub registry: Arc<JobRegistry>,
    pub log_tx: broadcast::Sender<String>,
    pub host: String,
    pub port: u16,
}

/// Read-only HTTP view over the job registry.
pub struct StatusServer {
    registry: Arc<JobRegistry>,
    log_tx: broadcast::Sender<String>,
    host: String,
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatusServer {
    pub fn new(config: StatusServerConfig) -> Self {
        Self {
            registry: config.registry,
            log_tx: config.log_tx,
            host: config.host,
            port: config.port,
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for StatusServer {
    fn component_name(&self) -> &'static str {
        "status server"
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = self.address();
        let state = AppState {
            registry: self.registry.clone(),
            log_tx: self.log_tx.clone(),
        };
        let app = router::build_router(state);

        // Bind before spawning so a taken port fails startup.
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        self.handle = Some(tokio::spawn(async move {
            info!("Status server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("Status server crashed: {}", e);
            }
        }));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Open log streams would otherwise hold graceful shutdown forever.
        if let Some(handle) = self.handle.take()
            && tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
        {
            warn!("Status server did not drain in time");
        }
        info!("Status server stopped");
        Ok(())
    }
}
