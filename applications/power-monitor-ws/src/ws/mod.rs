pub mod connection;
pub mod handler;
pub mod protocol;

pub use handler::{health_check, ws_graph, ws_monitor, AppState, ConnectionSlot};
pub use protocol::{ClientMessage, ServerMessage};
