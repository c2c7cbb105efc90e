pub mod app;
pub mod client;
pub mod config;
pub mod day_sheet;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;
pub mod upstream;

pub use app::router;
pub use client::{HttpBackend, SchedulerClient};
pub use config::{ClientConfig, ProxyConfig};
pub use state::AppState;
