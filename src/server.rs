use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;

use crate::attachments::AttachmentStager;
use crate::config::{Config, ConfigStore};
use crate::dispatch::Dispatcher;
use crate::error::{panic_response, ApiError};
use crate::handlers::{self, AppState};
use crate::transmitter::Transmitter;

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let expected = format!("Bearer {}", state.config.auth_token);
    let authorized = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if authorized {
        next.run(req).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

pub fn app_state(config: Arc<Config>, transmitter: Arc<dyn Transmitter>) -> Arc<AppState> {
    Arc::new(AppState {
        stager: AttachmentStager::new(&config.staging_dir),
        dispatcher: Dispatcher::new(transmitter),
        config,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route(
            "/send_sms",
            post(handlers::send_sms).fallback(handlers::not_found),
        )
        .route(
            "/send_mms",
            post(handlers::send_mms).fallback(handlers::not_found),
        )
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Owns the server instance for the host process.
pub struct ApiService;

impl ApiService {
    /// Start hook. Configuration and bind problems are logged and yield
    /// `None`; they never take the host down.
    pub async fn start(
        store: &dyn ConfigStore,
        transmitter: Arc<dyn Transmitter>,
    ) -> Option<RunningServer> {
        let config = match store.load().and_then(|c| c.validate().map(|()| c)) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                warn!("API server not configured properly: {}", e);
                return None;
            }
        };

        let addr = config.bind_addr();
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to start API server on {}: {}", addr, e);
                return None;
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                error!("Failed to start API server on {}: {}", addr, e);
                return None;
            }
        };

        let app = router(app_state(config, transmitter));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {}", e);
            }
        });

        info!("API server started on {}", local_addr);
        Some(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop hook: drains in-flight requests, then returns.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!("Error stopping API server: {}", e);
        }
        info!("API server stopped");
    }
}
