pub mod adapters;
mod app;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod fcm;
pub mod ports;
pub mod push;
mod state;
pub mod types;

pub use app::app;
pub use dispatch::Dispatcher;
pub use error::{DispatchError, ErrorKind};
pub use push::{VapidCredentials, generate_vapid_credentials};

pub async fn serve(config: config::AppConfig) -> std::io::Result<()> {
    let addr = config.bind;
    let router = app(config).map_err(std::io::Error::other)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await
}
