//! Inbound command endpoint.
//!
//! A single `POST /` route receives slash commands from the chat webhook.
//! Every request is verified against the shared signing secret before it is
//! dispatched to the scheduled checks.

pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod routes;

use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use tracing::info;

pub use error::{AppError, CommandError};
pub use middleware::RequestLogger;

use crate::crypto::RequestVerifier;
use crate::monitoring::CheckRegistry;

/// Serve the command endpoint until the server is stopped.
pub async fn run_server(
    addr: SocketAddr,
    verifier: RequestVerifier,
    registry: CheckRegistry,
) -> Result<(), AppError> {
    let verifier = web::Data::new(verifier);
    let registry = web::Data::new(registry);

    info!("Starting command listener on {}", addr);
    HttpServer::new(move || {
        App::new()
            .app_data(verifier.clone())
            .app_data(registry.clone())
            .wrap(RequestLogger)
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
