pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod mqtt;
pub mod session;
pub mod view;
pub mod ws;

// Re-export commonly used items
pub use config::Config;
pub use controller::{Controller, GraphHandler, MonitorPage, Page};
pub use error::{AppError, Result};
pub use session::{PageHandle, Session};
pub use view::ViewUpdate;
pub use ws::{AppState, ClientMessage, ServerMessage};
