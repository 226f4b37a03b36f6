use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    errors::{not_found, respond_to_errors},
    rate_limit::rate_limit,
};
use crate::state::AppState;
use crate::{auth, reviews, tours, users, views};

/// Client scripts for the pages, relative to the working directory.
const SCRIPTS_DIR: &str = "public/js";

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.limits.body_limit_kb * 1024;

    let api = Router::new()
        .merge(tours::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(reviews::router())
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/api/v1", api)
        .merge(views::router())
        .nest_service("/js", ServeDir::new(SCRIPTS_DIR))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), respond_to_errors))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
