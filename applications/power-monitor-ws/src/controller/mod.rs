pub mod averages;
pub mod graph;
pub mod monitor;

pub use graph::GraphHandler;
pub use monitor::MonitorPage;

use crate::error::{AppError, Result};
use crate::mqtt::{Publication, Subscription};
use crate::view::ViewUpdate;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Graph,
    Monitor,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Graph => "graph",
            Page::Monitor => "monitor",
        }
    }
}

/// Requests a browser can make of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCommand {
    ToggleOutlet { outlet: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandReply {
    /// The command was published; `enabled` is the state now shown while the device confirms.
    Toggled {
        outlet: String,
        enabled: bool,
        pending: bool,
    },
}

/// What a controller wants done after handling an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub updates: Vec<ViewUpdate>,
    pub publications: Vec<Publication>,
}

impl Reaction {
    pub fn render(updates: Vec<ViewUpdate>) -> Self {
        Self {
            updates,
            publications: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.publications.is_empty()
    }
}

/// A view controller driven by one MQTT session. The session owns the controller
/// and calls into it from a single task, so implementations hold plain state.
pub trait Controller: Send + 'static {
    fn page(&self) -> Page;

    /// Topics to (re)subscribe after every connection acknowledgement.
    fn subscriptions(&self) -> Vec<Subscription>;

    fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: DateTime<FixedOffset>,
    ) -> Result<Reaction>;

    fn handle_command(
        &mut self,
        command: PageCommand,
        _now: DateTime<FixedOffset>,
    ) -> Result<(Reaction, CommandReply)> {
        Err(AppError::Unsupported(format!(
            "{:?} on the {} page",
            command,
            self.page().as_str()
        )))
    }

    /// Periodic housekeeping, called on the session's tick.
    fn tick(&mut self, _now: DateTime<FixedOffset>) -> Reaction {
        Reaction::default()
    }

    /// Everything a freshly connected browser needs to draw the page.
    fn snapshot(&self) -> Vec<ViewUpdate>;
}
