use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Logs every request with a generated request id and the `X-Actor` header,
/// so registry mutations in the event log can be matched to request logs.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = Uuid::new_v4();
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let actor = req
            .headers()
            .get("X-Actor")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        info!(%request_id, method = %method, uri = %uri, actor = %actor, "Request started");

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis();

            match &result {
                Ok(response) if response.status().is_server_error() => {
                    error!(%request_id, method = %method, uri = %uri, status = response.status().as_u16(), duration_ms = %duration_ms, "Request failed");
                }
                Ok(response) if response.status().is_client_error() => {
                    warn!(%request_id, method = %method, uri = %uri, status = response.status().as_u16(), duration_ms = %duration_ms, "Request rejected");
                }
                Ok(response) => {
                    info!(%request_id, method = %method, uri = %uri, status = response.status().as_u16(), duration_ms = %duration_ms, "Request completed");
                }
                Err(err) => {
                    error!(%request_id, method = %method, uri = %uri, duration_ms = %duration_ms, error = %err, "Request errored");
                }
            }

            result
        })
    }
}
