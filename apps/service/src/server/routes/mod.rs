use actix_web::web;

pub mod command;

/// Register the endpoint's routes.
///
/// `/` accepts every method so that non-`POST` requests reach the verifier
/// and get a proper 405.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::route().to(command::command_route)));
}
