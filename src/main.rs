use actix_web::middleware::NormalizePath;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::io;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod docs;
mod error;
mod gate;
mod mail;
mod model;
mod models;
mod queue;
mod routes;
mod utils;

#[cfg(test)]
mod test_support;

use config::Config;
use mail::graph::GraphMailer;
use routes::AppState;

use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Time-in service is running"
}

/// `timein hash-password <password>` prints an argon2 hash for
/// `ADMIN_PASSWORD_HASH` / `USER_PASSWORD_HASH` and exits.
fn hash_password_command(args: &[String]) -> Option<io::Result<()>> {
    if args.get(1).map(String::as_str) != Some("hash-password") {
        return None;
    }

    let result = match args.get(2) {
        Some(password) => auth::password::hash_password(password)
            .map(|hash| println!("{hash}"))
            .map_err(|e| io::Error::other(e.to_string())),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "usage: timein hash-password <password>",
        )),
    };
    Some(result)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if let Some(result) = hash_password_command(&args) {
        return result;
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return Err(io::Error::other(e.to_string()));
        }
    };

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    for dir in [&config.data_dir, &config.uploads_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let mailer = GraphMailer::from_config(&config).map_err(|e| {
        error!(error = %e, "Failed to build mail client");
        io::Error::other(e.to_string())
    })?;

    let server_addr = config.server_addr.clone();
    let state = AppState::new(config, Arc::new(mailer));

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .service(index)
            .configure(|cfg| routes::configure(cfg, &state))
    })
    .bind(server_addr)?
    .run()
    .await
}
