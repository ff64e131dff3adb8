use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use log::{error, info};

use posnet_gateway::api::posnet_controller::{
    cancel, complete_3d, initiate_3d, postauth, preauth, refund, resolve_3d, sale, GatewayState,
};
use posnet_gateway::config::GatewayConfig;
use posnet_gateway::services::middleware::{GatewayAuth, GatewayAuthConfig};
use posnet_gateway::services::posnet_client::PosnetClient;
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    info!(
        "Posnet environment {} at {}",
        config.environment,
        config
            .endpoints
            .url_for(&config.environment)
            .unwrap_or("<unresolved>")
    );

    let client = PosnetClient::new(
        config.credentials.clone(),
        config.endpoints.clone(),
        config.timeout,
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let state = web::Data::new(GatewayState {
        client,
        environment: config.environment.clone(),
        return_url: config.return_url.clone(),
        lang: config.lang.clone(),
    });

    let auth_config = GatewayAuthConfig::new(
        &config.service_key,
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    )
    .with_header_name(&config.service_header)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?
    .with_trusted_proxy(config.trust_forwarded_headers);
    auth_config.start_cleanup_task();

    info!("Starting server at {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(GatewayAuth::new(auth_config.clone()))
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .service(
                web::scope("/api")
                    .route("/sale", web::post().to(sale))
                    .route("/preauth", web::post().to(preauth))
                    .route("/postauth", web::post().to(postauth))
                    .route("/refund", web::post().to(refund))
                    .route("/cancel", web::post().to(cancel))
                    .route("/3d/initiate", web::post().to(initiate_3d))
                    .route("/3d/resolve", web::post().to(resolve_3d))
                    .route("/3d/complete", web::post().to(complete_3d)),
            )
            .route(
                "/health",
                web::get().to(|| async { HttpResponse::Ok().body("Service is running") }),
            )
    })
    .bind((config.host.clone(), config.port))?
    .run()
    .await
}
