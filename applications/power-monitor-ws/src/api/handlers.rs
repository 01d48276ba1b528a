use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::controller::{CommandReply, Page, PageCommand};
use crate::error::Result;
use crate::session::PageHandle;
use crate::view::ViewUpdate;
use crate::ws::AppState;

const GRAPH_PAGE: &str = include_str!("../../assets/graph.html");
const MONITOR_PAGE: &str = include_str!("../../assets/monitor.html");

/// Everything needed to draw a page from scratch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub page: Page,
    pub updates: Vec<ViewUpdate>,
}

impl From<&PageHandle> for PageSnapshot {
    fn from(handle: &PageHandle) -> Self {
        Self {
            page: handle.page(),
            updates: handle.snapshot(),
        }
    }
}

/// GET /
pub async fn graph_page() -> Html<&'static str> {
    Html(GRAPH_PAGE)
}

/// GET /monitor
pub async fn monitor_page() -> Html<&'static str> {
    Html(MONITOR_PAGE)
}

/// GET /api/v1/graph
pub async fn get_graph(State(state): State<Arc<AppState>>) -> Json<PageSnapshot> {
    Json(PageSnapshot::from(&state.graph))
}

/// GET /api/v1/monitor
pub async fn get_monitor(State(state): State<Arc<AppState>>) -> Json<PageSnapshot> {
    Json(PageSnapshot::from(&state.monitor))
}

/// POST /api/v1/monitor/outlets/{outlet}/toggle
/// Returns 202 Accepted: the command is published, the device has not confirmed it yet
pub async fn toggle_outlet(
    State(state): State<Arc<AppState>>,
    Path(outlet): Path<String>,
) -> Result<(StatusCode, Json<CommandReply>)> {
    let reply = state
        .monitor
        .command(PageCommand::ToggleOutlet { outlet })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ElementId;

    #[test]
    fn test_pages_carry_their_element_ids() {
        for id in [ElementId::GraphHeader, ElementId::Graph] {
            assert!(GRAPH_PAGE.contains(&format!("id=\"{}\"", id.as_str())));
        }
        for id in [
            ElementId::TimeText,
            ElementId::WattageText,
            ElementId::DiffText,
            ElementId::BottomPane,
        ] {
            assert!(MONITOR_PAGE.contains(&format!("id=\"{}\"", id.as_str())));
        }
    }

    #[test]
    fn test_graph_stacks_device_averages() {
        let y_axis = GRAPH_PAGE
            .lines()
            .find(|line| line.trim_start().starts_with("y: {"))
            .expect("graph page should configure a y axis");

        assert!(y_axis.contains("stacked: true"));
    }

    #[test]
    fn test_snapshot_from_handle() {
        let handle = PageHandle::detached(
            Page::Monitor,
            vec![ViewUpdate::Alert {
                message: "Invalid Device ID".into(),
            }],
        );

        let snapshot = PageSnapshot::from(&handle);
        assert_eq!(snapshot.page, Page::Monitor);
        assert_eq!(snapshot.updates.len(), 1);
    }
}
