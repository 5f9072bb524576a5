mod routes;
mod server;

pub mod analysis;
pub mod app;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod frame_store;
pub mod freshness;
pub mod inference;
pub mod telemetry;

pub use app::start_app;
