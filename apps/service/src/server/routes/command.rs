use std::str;
use std::time::SystemTime;

use actix_web::http::header::{CONTENT_TYPE, ContentType};
use actix_web::http::{Method, StatusCode};
use actix_web::{HttpRequest, HttpResponse, web};
use futures::StreamExt;
use tracing::{info, warn};

use crate::crypto::{RequestVerifier, SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER};
use crate::monitoring::CheckRegistry;
use crate::server::dispatch::{SlashCommand, dispatch};
use crate::server::error::CommandError;
use crate::server::middleware::ResponseSummary;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Largest accepted request body; larger bodies are rejected with 400.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Fields of a slash-command submission that are used.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandForm {
    pub command: Option<String>,
    pub text: Option<String>,
    pub user_name: Option<String>,
}

/// Command endpoint.
///
/// The body of a `POST` is buffered up front so that it is both signed over
/// and parsed. Other methods are rejected without reading it.
pub async fn command_route(
    req: HttpRequest,
    payload: web::Payload,
    verifier: web::Data<RequestVerifier>,
    registry: web::Data<CheckRegistry>,
) -> Result<HttpResponse, CommandError> {
    let body = if req.method() == Method::POST {
        read_body(payload, MAX_BODY_SIZE).await.inspect_err(|e| {
            warn!("Rejected {} {} from {}: {}", req.method(), req.path(), peer(&req), e);
        })?
    } else {
        web::Bytes::new()
    };

    let signed = SignedRequest {
        method: req.method().as_str(),
        timestamp: header(&req, TIMESTAMP_HEADER),
        signature: header(&req, SIGNATURE_HEADER),
        body: &body,
    };

    if let Err(e) = verifier.verify(&signed, SystemTime::now()) {
        warn!("Rejected {} {} from {}: {}", req.method(), req.path(), peer(&req), e);
        return Err(e.into());
    }

    let form = parse_form(&req, &body).inspect_err(|e| {
        warn!("Rejected {} {} from {}: {}", req.method(), req.path(), peer(&req), e);
    })?;

    let command = SlashCommand::parse(form.text.as_deref().unwrap_or_default());
    info!(
        "Command {:?} from {}",
        command,
        form.user_name.as_deref().unwrap_or("unknown user")
    );

    Ok(text_response(StatusCode::OK, dispatch(&registry, &command)))
}

/// Buffer the request body, failing once it grows past `limit` bytes.
async fn read_body(mut payload: web::Payload, limit: usize) -> Result<web::Bytes, CommandError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| CommandError::BadRequest(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(CommandError::BodyTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Parse a urlencoded form body.
pub fn parse_form(req: &HttpRequest, body: &[u8]) -> Result<CommandForm, CommandError> {
    if let Some(content_type) = req.headers().get(CONTENT_TYPE) {
        let content_type = content_type
            .to_str()
            .map_err(|_| CommandError::BadRequest("invalid content type".into()))?;
        if !content_type.trim_start().starts_with(FORM_CONTENT_TYPE) {
            return Err(CommandError::BadRequest(format!("unexpected content type {content_type}")));
        }
    }

    str::from_utf8(body).map_err(|e| CommandError::BadRequest(e.to_string()))?;

    let mut form = CommandForm::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        let slot = match key.as_ref() {
            "command" => &mut form.command,
            "text" => &mut form.text,
            "user_name" => &mut form.user_name,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    Ok(form)
}

fn text_response(status: StatusCode, body: String) -> HttpResponse {
    let mut response =
        HttpResponse::build(status).insert_header(ContentType::plaintext()).body(body.clone());
    response.extensions_mut().insert(ResponseSummary(body));
    response
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

fn peer(req: &HttpRequest) -> String {
    req.peer_addr().map(|addr| addr.to_string()).unwrap_or_else(|| "-".into())
}
