use std::{error::Error, sync::Arc};

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tokio::{fs, net, task};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use deskflow::{
    db,
    server::{self, AppState},
    suggest, Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let db_client = match &config.db.url {
        Some(url) => {
            let (db_client, db_connection) = db::connect(url).await?;
            task::spawn(async move {
                if let Err(e) = db_connection.await {
                    panic!("database connection failed: {e}");
                }
            });
            db_client
        }
        None => {
            tracing::info!("no database configured, keeping data in memory");
            db::Client::memory()
        }
    };
    if config.db.seed {
        db::seed::apply(&db_client).await?;
    }

    let suggest_client: Arc<dyn suggest::Client> = match &config.suggest.url {
        Some(url) => Arc::new(suggest::Remote::new(url.parse()?)),
        None => Arc::new(suggest::Catalog::builtin(config.suggest.limit)),
    };

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let state = Arc::new(AppState::new(
        db_client,
        suggest_client,
        &config.suggest,
        &config.jwt,
    ));
    task::spawn(server::sweep_idle_drafts(Arc::clone(&state)));

    let app = server::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
