// src/server/mod.rs

//! Development server: static files from the build root plus live reload.

pub mod reload;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::Stream;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::errors::{Result, SitepipeError};

pub use reload::{
    CLIENT_SCRIPT, EVENTS_PATH, ReloadEvent, ReloadHandle, SCRIPT_PATH, inject_reload_script,
};

#[derive(Clone)]
struct ServerState {
    root: PathBuf,
    reload: ReloadHandle,
    /// Flips to `true` on shutdown so open event streams end.
    closing: watch::Receiver<bool>,
}

/// A running development server.
#[derive(Debug)]
pub struct DevServer {
    addr: SocketAddr,
    closing: watch::Sender<bool>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl DevServer {
    /// Bind `host:port` and serve `root`. Port 0 picks a free port; see
    /// [`DevServer::local_addr`].
    pub async fn start(
        root: impl Into<PathBuf>,
        host: &str,
        port: u16,
        reload: ReloadHandle,
    ) -> Result<Self> {
        let root = root.into();
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .map_err(|e| SitepipeError::ServerError(format!("binding {host}:{port}: {e}")))?;
        let addr = listener.local_addr()?;

        let (closing_tx, closing_rx) = watch::channel(false);
        let app = router(ServerState {
            root: root.clone(),
            reload,
            closing: closing_rx,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = served {
                warn!(error = %err, "dev server stopped with an error");
            }
        });

        info!(url = %format!("http://{addr}/"), root = %root.display(), "dev server listening");
        Ok(Self {
            addr,
            closing: closing_tx,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn stop(mut self) {
        let _ = self.closing.send(true);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            warn!(error = %err, "dev server task ended abnormally");
        }
        info!("dev server stopped");
    }
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events))
        .route(SCRIPT_PATH, get(client_script))
        .fallback(serve_file)
        .with_state(state)
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!("live-reload client connected");
    let stream = futures::stream::unfold(
        (state.reload.subscribe(), state.closing),
        |(mut rx, mut closing)| async move {
            loop {
                if *closing.borrow() {
                    return None;
                }
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(event) => {
                            let sse = Event::default().event(event.as_str()).data(event.as_str());
                            return Some((Ok(sse), (rx, closing)));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "live-reload client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                    changed = closing.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                }
            }
        },
    );
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Serve from the build root, injecting the reload script into HTML.
async fn serve_file(State(state): State<ServerState>, req: Request) -> Response {
    let served = match ServeDir::new(&state.root).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let is_html = served
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || !served.status().is_success() {
        return served.map(Body::new);
    }

    let (mut parts, body) = served.into_parts();
    let bytes = match axum::body::to_bytes(Body::new(body), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "reading page for script injection failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read page").into_response();
        }
    };
    let html = inject_reload_script(&String::from_utf8_lossy(&bytes));

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    Response::from_parts(parts, Body::from(html))
}
