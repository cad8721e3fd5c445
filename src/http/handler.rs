//! Gateway handler factory.
//!
//! # Responsibilities
//! - Glue one configured HTTP route to one RPC call
//! - Map errors to the HTTP surface: validation → 400, pool saturation →
//!   503, backend error / timeout / malformed response → 500
//!
//! # Design Decisions
//! - The handler is thin: the pool and the transport do the hard work
//! - The pool slot is released on every exit path after acquisition
//! - `(service, method)` is resolved once, at router-build time

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::Json;
use serde_json::{json, Value};

use crate::config::{RouteConfig, TimeoutConfig};
use crate::http::params;
use crate::observability::metrics;
use crate::rpc::{RpcClientPool, RpcError};

/// Acquisition timeout for the health and status probes.
const PROBE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything one route's handler needs, resolved at build time.
struct RouteContext {
    route: RouteConfig,
    pool: Arc<RpcClientPool>,
    service: String,
    method: String,
    call_timeout: Duration,
    acquire_timeout: Duration,
}

/// Build the axum method router for one configured route.
pub fn route_handler(
    route: RouteConfig,
    pool: Arc<RpcClientPool>,
    timeouts: &TimeoutConfig,
) -> MethodRouter {
    let (service, method) = service_and_method(&route);
    tracing::info!(
        path = %route.path,
        http_method = %route.http_method,
        service = %service,
        method = %method,
        "registering route"
    );

    let http_method = route.http_method.clone();
    let ctx = Arc::new(RouteContext {
        route,
        pool,
        service,
        method,
        call_timeout: timeouts.rpc_call(),
        acquire_timeout: timeouts.pool_acquire(),
    });

    let handler = move |Path(path_params): Path<HashMap<String, String>>,
                        Query(query): Query<HashMap<String, String>>,
                        body: Bytes| {
        let ctx = Arc::clone(&ctx);
        async move { dispatch(ctx, path_params, query, body).await }
    };

    match http_method.as_str() {
        "POST" => post(handler),
        _ => get(handler),
    }
}

/// Validate → acquire → call → unwrap → reply.
async fn dispatch(
    ctx: Arc<RouteContext>,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    let args = match params::extract_args(&ctx.route, &path_params, &query, &body) {
        Ok(args) => args,
        Err(err) => {
            return respond(
                &ctx,
                started,
                StatusCode::BAD_REQUEST,
                json!({"error": err.to_string()}),
            );
        }
    };

    // The guard returns the slot even if this future is cancelled while
    // parked on the call below.
    let client = match ctx.pool.acquire(ctx.acquire_timeout).await {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(path = %ctx.route.path, error = %err, "no transport available");
            let message = match err {
                RpcError::ShuttingDown => err.to_string(),
                _ => "all clients are busy".to_string(),
            };
            return respond(
                &ctx,
                started,
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": message}),
            );
        }
    };

    tracing::debug!(
        service = %ctx.service,
        method = %ctx.method,
        client = %client.whoami(),
        "dispatching rpc call"
    );
    let result = client
        .call(&ctx.service, &ctx.method, args, Some(ctx.call_timeout))
        .await;
    client.release().await;

    match result {
        Ok(payload) => match payload.get("response").and_then(Value::as_object) {
            Some(inner) => respond(&ctx, started, StatusCode::OK, Value::Object(inner.clone())),
            None => respond(
                &ctx,
                started,
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "unexpected response structure"}),
            ),
        },
        Err(err) => respond(
            &ctx,
            started,
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": err.to_string()}),
        ),
    }
}

fn respond(ctx: &RouteContext, started: Instant, status: StatusCode, body: Value) -> Response {
    metrics::record_request(
        &ctx.route.http_method,
        &ctx.route.path,
        status.as_u16(),
        started,
    );
    (status, Json(body)).into_response()
}

/// Resolve the `(service, method)` pair for a route.
///
/// A configured pair wins, with underscores in the service rewritten to
/// dots. Otherwise both are derived from the route path: segments joined
/// by dots form the service and the last segment is the method; a single
/// segment maps to `<segment>.request` and the root path to `api.request`.
fn service_and_method(route: &RouteConfig) -> (String, String) {
    if let (Some(service), Some(method)) = (&route.service, &route.method) {
        if !service.is_empty() && !method.is_empty() {
            return (service.replace('_', "."), method.clone());
        }
    }

    let path = route.path.trim_matches('/');
    let parts: Vec<&str> = path.split('/').collect();

    if parts.len() == 1 && parts[0].is_empty() {
        return ("api".to_string(), "request".to_string());
    }
    if parts.len() == 1 {
        return (parts[0].to_string(), "request".to_string());
    }

    let method = parts[parts.len() - 1].to_string();
    let service = parts[..parts.len() - 1].join(".");
    (service, method)
}

/// `GET /health`: probe pool availability.
pub async fn health(pool: Arc<RpcClientPool>) -> Response {
    match pool.acquire(PROBE_ACQUIRE_TIMEOUT).await {
        Ok(client) => {
            client.release().await;
            (StatusCode::OK, Json(json!({"status": "healthy"}))).into_response()
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "reason": "RPC client unavailable"})),
        )
            .into_response(),
    }
}

/// `GET /status`: application status based on internal checks.
pub async fn status(pool: Arc<RpcClientPool>) -> Response {
    match pool.acquire(PROBE_ACQUIRE_TIMEOUT).await {
        Ok(client) => {
            client.release().await;
            (StatusCode::OK, Json(json!({"status": "operational"}))).into_response()
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "degraded", "reason": "RPC client issue"})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str, service: Option<&str>, method: Option<&str>) -> RouteConfig {
        RouteConfig {
            path: path.into(),
            http_method: "GET".into(),
            service: service.map(String::from),
            method: method.map(String::from),
            params: Vec::new(),
            description: String::new(),
        }
    }

    #[test]
    fn configured_service_rewrites_underscores() {
        let (service, method) = service_and_method(&route(
            "/login",
            Some("control_authentication"),
            Some("login"),
        ));
        assert_eq!(service, "control.authentication");
        assert_eq!(method, "login");
    }

    #[test]
    fn path_derived_service_and_method() {
        let (service, method) = service_and_method(&route("/payments/card/authorize", None, None));
        assert_eq!(service, "payments.card");
        assert_eq!(method, "authorize");
    }

    #[test]
    fn single_segment_path_defaults_method() {
        let (service, method) = service_and_method(&route("/payments", None, None));
        assert_eq!(service, "payments");
        assert_eq!(method, "request");
    }

    #[test]
    fn root_path_maps_to_api_request() {
        let (service, method) = service_and_method(&route("/", None, None));
        assert_eq!(service, "api");
        assert_eq!(method, "request");
    }
}
