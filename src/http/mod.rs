/// HTTP server module

pub mod middleware;
pub mod routes;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::app_state::AppState;
use crate::config::Config;
use middleware::{logger::Logger, request_id::RequestId, token_auth::TokenAuth};

pub async fn start_server(config: Config, app_state: AppState) -> io::Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(
        service_name = %config.service.name,
        service_version = %config.service.version,
        bind_addr = %bind_addr,
        log_level = %config.telemetry.log_level,
        log_format = %config.telemetry.log_format,
        "Starting HTTP server"
    );

    let app_state = web::Data::new(app_state);
    let request_id_header = config.telemetry.request_id_header.clone();
    let token_auth = TokenAuth::new(config.auth.clone());
    let cors_origins = config.server.cors_allow_origins.clone();
    let body_limit = config.server.request_body_limit_bytes;

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        for origin in &cors_origins {
            if origin == "*" {
                cors = cors.allow_any_origin();
                break;
            }
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(body_limit))
            .wrap(cors)
            .wrap(Logger)
            .wrap(token_auth.clone())
            .wrap(RequestId::new(request_id_header.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
