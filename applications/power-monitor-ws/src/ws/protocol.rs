use crate::controller::{CommandReply, Page};
use crate::view::ViewUpdate;
use serde::{Deserialize, Serialize};

/// Messages sent from the browser to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Toggle { outlet: String },
    Ping,
}

/// Messages sent from the server to the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full render; sent on connect and again after the client fell behind
    Snapshot {
        page: Page,
        updates: Vec<ViewUpdate>,
    },
    Updates {
        page: Page,
        timestamp: String,
        updates: Vec<ViewUpdate>,
    },
    Toggled {
        outlet: String,
        enabled: bool,
        pending: bool,
    },
    Pong {
        timestamp: String,
    },
    Error {
        message: String,
        code: String,
    },
}

impl ServerMessage {
    pub fn snapshot(page: Page, updates: Vec<ViewUpdate>) -> Self {
        ServerMessage::Snapshot { page, updates }
    }

    pub fn updates(page: Page, updates: Vec<ViewUpdate>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        ServerMessage::Updates {
            page,
            timestamp: now,
            updates,
        }
    }

    pub fn pong() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        ServerMessage::Pong { timestamp: now }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.into(),
        }
    }
}

impl From<CommandReply> for ServerMessage {
    fn from(reply: CommandReply) -> Self {
        match reply {
            CommandReply::Toggled {
                outlet,
                enabled,
                pending,
            } => ServerMessage::Toggled {
                outlet,
                enabled,
                pending,
            },
        }
    }
}
