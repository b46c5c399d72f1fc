use axum::http::{header, HeaderValue, Method};
use domain::pipeline::SalesPipeline;
use log::*;
use service::config::Config;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
pub(crate) mod middleware;
mod router;

pub use error::{Error, Result};

/// State shared by every handler: the process configuration and the assembled pipeline.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<SalesPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<SalesPipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Wires the pipeline on top of the service layer's database connection.
    pub fn from_service(service_state: &service::AppState) -> Result<Self> {
        let pipeline = SalesPipeline::from_db(
            &service_state.config,
            service_state.database_connection.clone(),
        )?;
        Ok(Self::new(service_state.config.clone(), Arc::new(pipeline)))
    }
}

pub fn app(app_state: AppState) -> axum::Router {
    let cors_layer = cors_layer(&app_state.config);
    router::define_routes(app_state).layer(cors_layer)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub async fn init_server(service_state: service::AppState) -> std::io::Result<()> {
    let app_state = AppState::from_service(&service_state).map_err(std::io::Error::other)?;
    let config = &service_state.config;

    let interface = config.interface.as_deref().unwrap_or("127.0.0.1");
    let server_url = format!("{interface}:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&server_url).await?;

    info!(
        "Server starting... listening for connections on http://{server_url} ({})",
        config.runtime_env
    );

    axum::serve(listener, app(app_state)).await
}
