//! Request logging for the command endpoint.

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::USER_AGENT;
use futures::future::{Ready, ready};
use tracing::info;

/// Longest response summary written to the access log.
const SUMMARY_LIMIT: usize = 80;

/// Short human-readable description of a response body, attached to the
/// response so the access log can include it.
#[derive(Debug, Clone)]
pub struct ResponseSummary(pub String);

/// Logs every request with peer, method, path, status, response summary and
/// user agent once the response is ready.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerService { service }))
    }
}

pub struct RequestLoggerService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let peer = req.peer_addr().map(|addr| addr.to_string()).unwrap_or_else(|| "-".into());
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let version = req.version();
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;

            let summary = res
                .response()
                .extensions()
                .get::<ResponseSummary>()
                .map(|summary| truncate(&summary.0, SUMMARY_LIMIT))
                .unwrap_or_default();

            info!(
                "Request from {} {} {} {:?} {} \"{}\" \"{}\"",
                peer,
                method,
                uri,
                version,
                res.status().as_u16(),
                summary,
                user_agent
            );

            Ok(res)
        })
    }
}

fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
