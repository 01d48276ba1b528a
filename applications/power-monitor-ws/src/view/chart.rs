use serde::{Deserialize, Serialize};

pub const LINE_COLOR: &str = "#46bdc6";
pub const BUBBLE_COLOR: &str = "rgba(94, 120, 247, .6)";
pub const CURRENT_USAGE_LABEL: &str = "Current Usage";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BubblePoint {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

/// Datasets in the shape the charting library consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Dataset {
    #[serde(rename_all = "camelCase")]
    Line {
        label: String,
        data: Vec<LinePoint>,
        border_color: String,
        tension: f64,
    },
    #[serde(rename_all = "camelCase")]
    Bubble {
        label: String,
        data: Vec<BubblePoint>,
        background_color: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Tick label per whole hour on the fractional-hour x axis
    pub x_labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// `12 AM`, `3 AM`, ... every third hour, blank in between.
pub fn hour_tick_labels() -> Vec<String> {
    (0..24)
        .map(|hour| {
            if hour % 3 != 0 {
                return String::new();
            }
            let display = match hour % 12 {
                0 => 12,
                h => h,
            };
            let suffix = if hour < 12 { "AM" } else { "PM" };
            format!("{} {}", display, suffix)
        })
        .collect()
}
