use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use anyhow::Context;
use dotenvy::dotenv;
use tracing_actix_web::TracingLogger;

use vidaplus::auth::TokenService;
use vidaplus::config::Settings;
use vidaplus::store::{PgStore, build_pool, run_migrations};
use vidaplus::{routes, store_data, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let settings = Settings::load().context("failed to load configuration")?;
    telemetry::init(settings.log.json);

    let jwt_secret = settings.jwt_secret()?;
    let tokens = web::Data::new(TokenService::new(
        jwt_secret,
        chrono::Duration::hours(settings.auth.token_ttl_hours),
    ));

    // create db connection pool
    let pool = build_pool(&settings.database.url, settings.database.max_connections)?;
    if settings.database.run_migrations {
        run_migrations(&pool)?;
    }
    let store = store_data(PgStore::new(pool));

    let allowed_origin = settings.cors.allowed_origin.clone();
    let (host, port) = settings.bind_address();
    tracing::info!(%host, port, "starting VidaPlus API");

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .app_data(store.clone())
            .app_data(tokens.clone())
            .configure(routes::configure)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?
        .run()
        .await
        .context("server error")
}
