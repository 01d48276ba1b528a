//! DOM-level view updates. The dashboard page owns the elements named by
//! [`ElementId`]; controllers describe what changes and the page applies it.

pub mod chart;
pub mod clock;
pub mod color;

pub use chart::{BubblePoint, ChartData, Dataset, LinePoint};
pub use clock::clock_text;
pub use color::hsv_to_hex;

use serde::{Deserialize, Serialize};

/// Element ids the served page must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementId {
    GraphHeader,
    Graph,
    TimeText,
    WattageText,
    DiffText,
    BottomPane,
}

impl ElementId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementId::GraphHeader => "graph-header",
            ElementId::Graph => "graph",
            ElementId::TimeText => "time-text",
            ElementId::WattageText => "wattage-text",
            ElementId::DiffText => "diff-text",
            ElementId::BottomPane => "bottom-pane",
        }
    }
}

/// One toggle button in the outlet grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletButton {
    pub outlet: String,
    pub label: String,
    pub enabled: bool,
    /// A toggle was sent and the device has not confirmed it yet
    pub pending: bool,
}

impl OutletButton {
    pub fn new(outlet: &str, enabled: bool, wattage: f64, pending: bool) -> Self {
        Self {
            outlet: outlet.to_string(),
            label: outlet_label(outlet, enabled, wattage),
            enabled,
            pending,
        }
    }
}

pub fn outlet_label(outlet: &str, enabled: bool, wattage: f64) -> String {
    format!(
        "{} ({}) {:.3} W",
        outlet,
        if enabled { "On" } else { "Off" },
        wattage
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ViewUpdate {
    SetText { target: ElementId, text: String },
    SetColor { target: ElementId, color: String },
    /// Cover the page with a blocking overlay
    Block { message: String },
    Unblock,
    Alert { message: String },
    /// Full rebuild of the outlet grid inside `#bottom-pane`
    RenderOutlets { buttons: Vec<OutletButton> },
    /// Full chart (re)creation inside `#graph`
    RenderChart { chart: ChartData },
    /// Replace the points of the current-usage bubble series
    SetBubble { points: Vec<BubblePoint> },
}

impl ViewUpdate {
    pub fn text(target: ElementId, text: impl Into<String>) -> Self {
        ViewUpdate::SetText {
            target,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlet_labels() {
        assert_eq!(outlet_label("p1", true, 12.345), "p1 (On) 12.345 W");
        assert_eq!(outlet_label("p2", false, 0.0), "p2 (Off) 0.000 W");
    }

    #[test]
    fn test_view_update_wire_format() {
        let update = ViewUpdate::text(ElementId::WattageText, "12 W");

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"op": "set_text", "target": "wattage-text", "text": "12 W"})
        );
    }

    #[test]
    fn test_element_ids_match_serialized_names() {
        for id in [
            ElementId::GraphHeader,
            ElementId::Graph,
            ElementId::TimeText,
            ElementId::WattageText,
            ElementId::DiffText,
            ElementId::BottomPane,
        ] {
            let json = serde_json::to_value(id).unwrap();
            assert_eq!(json, serde_json::Value::String(id.as_str().to_string()));
        }
    }
}
