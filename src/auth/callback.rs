use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{OriginalUri, State},
    response::Html,
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

pub const REDIRECT_PATH: &str = "/oauth2/redirect";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const RECEIVED_PAGE: &str = "<!doctype html><html><body>\
<h1>Authenticating...</h1><p>You can close this window and return to the terminal.</p>\
</body></html>";
const ALREADY_DONE_PAGE: &str = "<!doctype html><html><body>\
<h1>Already handled</h1><p>This sign-in has already been received.</p>\
</body></html>";

#[derive(Clone)]
struct CallbackState {
    base: Url,
    sender: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

fn router(state: CallbackState) -> Router {
    Router::new()
        .route(REDIRECT_PATH, get(redirect))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    // path only: the query carries the token
                    let path = req.uri().path().to_owned();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        %path,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn redirect(
    State(state): State<CallbackState>,
    OriginalUri(uri): OriginalUri,
) -> Html<&'static str> {
    let sender = state
        .sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let Some(sender) = sender else {
        return Html(ALREADY_DONE_PAGE);
    };
    match state.base.join(&uri.to_string()) {
        Ok(url) => {
            if sender.send(url).is_err() {
                warn!("redirect arrived after the receiver went away");
            }
        }
        Err(e) => warn!(error = %e, "could not rebuild redirect url"),
    }
    Html(RECEIVED_PAGE)
}

/// Binds `addr` and waits for the browser to arrive at the redirect path.
pub async fn wait_for_redirect(addr: SocketAddr) -> anyhow::Result<Url> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind oauth callback listener on {addr}"))?;
    receive_redirect(listener).await
}

/// Serves the redirect path on `listener` until one request arrives, then shuts down.
pub async fn receive_redirect(listener: TcpListener) -> anyhow::Result<Url> {
    let addr = listener.local_addr().context("callback listener address")?;
    let base = Url::parse(&format!("http://{addr}/")).context("callback base url")?;
    let (url_tx, url_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app = router(CallbackState {
        base,
        sender: Arc::new(Mutex::new(Some(url_tx))),
    });

    info!(%addr, path = REDIRECT_PATH, "waiting for oauth redirect");
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let url = url_rx
        .await
        .context("callback listener stopped before a redirect arrived")?;
    let _ = stop_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "callback listener failed during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "callback listener task panicked"),
        Err(_) => warn!("callback listener did not stop in time"),
    }
    Ok(url)
}
