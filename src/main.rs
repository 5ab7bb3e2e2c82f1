use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, Data, FormConfig, JsonConfig, PathConfig, QueryConfig};
use actix_web::{get, App, HttpServer, Responder, ResponseError};
use mongodb::{bson, Client};
use serde_json::json;
use tracing::{debug, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::fmt::format::FmtSpan;

mod campaign;
mod config;
mod creative;
mod database;
mod error;
mod ratelimit;
mod seed;
mod serving;
mod tracking;
mod typedid;
mod utils;

use config::Config;
use database::{Database, MongoDatabase};
use error::Error;
use ratelimit::middleware::RateLimit;
use ratelimit::{RateLimitConfig, RateLimiter};
use tracking::guard::ReplayGuard;
use tracking::token::TokenCodec;

#[get("/health")]
async fn health() -> impl Responder {
    web::Json(json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> Result<(), IoError> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    let config = Config::from_env();

    info!("connecting to db: {}", config.mongodb_uri);
    let db = Client::with_uri_str(&config.mongodb_uri)
        .await
        .map_err(|err| IoError::new(ErrorKind::Other, err))?
        .database(&config.database_name);

    // ping the database to ensure connection is established
    db.run_command(bson::doc! { "ping": 1 }, None)
        .await
        .map_err(|err| IoError::new(ErrorKind::Other, err))?;

    let database = MongoDatabase::initialize(db.clone())
        .await
        .map_err(|err| IoError::new(ErrorKind::Other, err.to_string()))?;
    let database = if config.seed_demo_data {
        seed::seed(&database)
            .await
            .map_err(|err| IoError::new(ErrorKind::Other, err.to_string()))?;
        // seeding drops the database, so the indexes need recreating
        MongoDatabase::initialize(db)
            .await
            .map_err(|err| IoError::new(ErrorKind::Other, err.to_string()))?
    } else {
        database
    };

    let codec = Data::new(TokenCodec::new(
        &config.token_secret,
        config.token_ttl_seconds,
    ));
    let guard = Data::new(ReplayGuard::new(config.replay_guard_capacity));
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));

    let sweeper = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = sweeper.sweep();
            debug!(removed, "rate limiter sweep");
        }
    });

    let bind_address = config.bind_address.clone();
    let app_config = Data::new(config);
    info!("listening on {}", bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(JsonConfig::default().error_handler(|err, _req| {
                // format json errors with custom format
                Error::InvalidJson(err).into()
            }))
            .app_data(PathConfig::default().error_handler(|err, _req| {
                // format path errors with custom format
                Error::InvalidPath(err).into()
            }))
            .app_data(FormConfig::default().error_handler(|err, _req| {
                // format form errors with custom format
                Error::InvalidForm(err).into()
            }))
            .app_data(QueryConfig::default().error_handler(|err, _req| {
                // format query errors with custom format
                Error::InvalidQuery(err).into()
            }))
            .app_data(Data::new(Box::new(database.clone()) as Box<dyn Database>))
            .app_data(codec.clone())
            .app_data(guard.clone())
            .app_data(app_config.clone())
            .wrap(RateLimit::new(Arc::clone(&limiter)))
            .wrap(TracingLogger::default())
            .service(health)
            .service(serving::endpoints::request_ad)
            .service(tracking::endpoints::track_impression)
            .service(tracking::endpoints::track_click)
            .service(tracking::endpoints::track_click_redirect)
            .default_service(web::to(|| async { Error::PathDoesNotExist.error_response() }))
    })
    .bind(bind_address)?
    .run()
    .await
}
