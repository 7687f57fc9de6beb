mod api;
mod bot;
mod calendar;
mod config;
mod datastore;
mod labels;
mod metrics;
mod selection;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;
#[macro_use]
extern crate diesel;

use crate::api::admin::AdminAuth;
use crate::config::Config;
use crate::datastore::postgres::PostgresStore;
use actix_service::Service;
use actix_web::{dev::ServiceResponse, middleware, web, App, HttpServer};
use datastore::postgres;
use futures::future::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};

#[allow(clippy::cognitive_complexity)]
fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Couldn't load config from {}: {:#}", config_file_path, e);
            return;
        }
    };

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting fsplink");

    let sys = actix_rt::System::new("fsplink");

    // Build the postgres client
    let db = PostgresStore::new(
        postgres::Dsn::new(&config),
        config.db_pool_size,
        Duration::from_secs(config.db_connection_timeout),
    )
    .expect("couldn't connect to Postgres");
    prometheus::register(Box::new(db.clone())).expect("couldn't register DB metrics");

    // Build the userfacing app state
    let state = api::State { ds: Arc::new(db) };
    let admin_auth = AdminAuth {
        token_sha256: config.admin_token_sha256.clone(),
        disabled: config.disable_auth,
    };
    if admin_auth.disabled {
        warn!("Auth is disabled. This should only happen in testing.");
    } else if admin_auth.token_sha256.is_none() {
        warn!("no admin_token_sha256 configured, every admin request will be rejected");
    }

    // Start the userfacing API server
    info!(
        addr = &config.userfacing_listen_address[..],
        "starting userfacing API server"
    );
    let max_body_size = config.max_body_size;
    HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .data(state.clone())
            // enable logger
            .wrap(middleware::Logger::default())
            // limit size of the payload (global configuration)
            .data(web::JsonConfig::default().limit(max_body_size))
            .configure(api::userfacing::configure::<PostgresStore>)
            .configure(api::users::configure::<PostgresStore>)
            .configure(api::admin::configure::<PostgresStore>(admin_auth.clone()))
    })
    .bind(config.userfacing_listen_address.clone())
    .expect("couldn't start userfacing HTTP server")
    .run();

    // Start the metrics server
    info!(
        addr = &config.metrics_address[..],
        "starting metrics server"
    );
    HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(config.metrics_address)
    .expect("couldn't start metrics server")
    .run();

    // Start the Telegram bot
    match config.bot {
        Some(bot_config) => {
            if let Err(e) = bot::spawn(bot_config) {
                error!("couldn't start the bot thread: {}", e);
            }
        }
        None => info!("no bot token, bot will not start"),
    }

    if let Err(e) = sys.run() {
        error!("actix runtime terminated: {}", e);
    }
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}
