use crate::config::GraphDevice;
use crate::controller::averages::{to_local_hours, utc_offset_hours, HourlyAverages};
use crate::controller::{Controller, Page, Reaction};
use crate::error::{AppError, Result};
use crate::models::UsageReading;
use crate::mqtt::topics::{usage_topic, Topic};
use crate::mqtt::{QoS, Subscription};
use crate::view::chart::{
    hour_tick_labels, BUBBLE_COLOR, CURRENT_USAGE_LABEL, LINE_COLOR,
};
use crate::view::{BubblePoint, ChartData, Dataset, ElementId, LinePoint, ViewUpdate};
use chrono::{DateTime, FixedOffset, Timelike};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Bubble radius per watt of total usage.
const RADIUS_PER_WATT: f64 = 0.1;
const LINE_TENSION: f64 = 0.2;

#[derive(Debug, Clone)]
struct DeviceSeries {
    id: String,
    label: String,
    utc_averages: HourlyAverages,
}

/// Multi-device page: historical hourly averages per device plus the live total.
pub struct GraphHandler {
    devices: Vec<DeviceSeries>,
    readings: BTreeMap<String, f64>,
    utc_offset_hours: i32,
    bubble: Vec<BubblePoint>,
    qos: QoS,
}

impl GraphHandler {
    pub fn new(devices: &[GraphDevice], qos: QoS, now: DateTime<FixedOffset>) -> Result<Self> {
        let devices = devices
            .iter()
            .map(|device| {
                let utc_averages: HourlyAverages =
                    device.averages.as_slice().try_into().map_err(|_| {
                        AppError::Config(format!(
                            "device '{}' needs 24 hourly averages, got {}",
                            device.id,
                            device.averages.len()
                        ))
                    })?;
                Ok(DeviceSeries {
                    id: device.id.clone(),
                    label: device.label.clone(),
                    utc_averages,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            devices,
            readings: BTreeMap::new(),
            utc_offset_hours: utc_offset_hours(now.offset()),
            bubble: Vec::new(),
            qos,
        })
    }

    /// Sum of the latest reading of every device heard from so far.
    pub fn total_wattage(&self) -> f64 {
        self.readings.values().sum()
    }

    pub fn utc_offset(&self) -> i32 {
        self.utc_offset_hours
    }

    /// Record a device's latest wattage and redraw the total.
    pub fn on_usage(
        &mut self,
        device_id: &str,
        reading: UsageReading,
        now: DateTime<FixedOffset>,
    ) -> Vec<ViewUpdate> {
        self.readings.insert(device_id.to_string(), reading.wattage);

        let total = self.total_wattage();
        debug!(device_id, wattage = reading.wattage, total, "usage updated");

        self.bubble = vec![current_usage_point(total, now)];
        vec![
            header_update(total),
            ViewUpdate::SetBubble {
                points: self.bubble.clone(),
            },
        ]
    }

    pub fn chart(&self) -> ChartData {
        let mut datasets: Vec<Dataset> = self
            .devices
            .iter()
            .map(|device| {
                let local = to_local_hours(&device.utc_averages, self.utc_offset_hours);
                Dataset::Line {
                    label: device.label.clone(),
                    data: local
                        .iter()
                        .enumerate()
                        .map(|(hour, &y)| LinePoint { x: hour as f64, y })
                        .collect(),
                    border_color: LINE_COLOR.to_string(),
                    tension: LINE_TENSION,
                }
            })
            .collect();

        datasets.push(Dataset::Bubble {
            label: CURRENT_USAGE_LABEL.to_string(),
            data: self.bubble.clone(),
            background_color: BUBBLE_COLOR.to_string(),
        });

        ChartData {
            x_labels: hour_tick_labels(),
            datasets,
        }
    }
}

impl Controller for GraphHandler {
    fn page(&self) -> Page {
        Page::Graph
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.devices
            .iter()
            .map(|device| Subscription::new(usage_topic(&device.id), self.qos))
            .collect()
    }

    fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: DateTime<FixedOffset>,
    ) -> Result<Reaction> {
        match Topic::parse(topic) {
            Some(Topic::Usage(device_id)) => {
                let reading = UsageReading::parse(topic, payload)?;
                Ok(Reaction::render(self.on_usage(device_id, reading, now)))
            }
            _ => Err(AppError::UnknownTopic(topic.to_string())),
        }
    }

    fn tick(&mut self, now: DateTime<FixedOffset>) -> Reaction {
        // The averages are re-indexed to local time; follow daylight saving changes
        let offset = utc_offset_hours(now.offset());
        if offset == self.utc_offset_hours {
            return Reaction::default();
        }

        info!(
            from = self.utc_offset_hours,
            to = offset,
            "local UTC offset changed, redrawing averages"
        );
        self.utc_offset_hours = offset;
        Reaction::render(vec![ViewUpdate::RenderChart {
            chart: self.chart(),
        }])
    }

    fn snapshot(&self) -> Vec<ViewUpdate> {
        let mut updates = Vec::with_capacity(2);
        if !self.readings.is_empty() {
            updates.push(header_update(self.total_wattage()));
        }
        updates.push(ViewUpdate::RenderChart {
            chart: self.chart(),
        });
        updates
    }
}

fn header_update(total: f64) -> ViewUpdate {
    ViewUpdate::text(
        ElementId::GraphHeader,
        format!("Total Current Usage: {:.1} W", total),
    )
}

/// Bubble at the current fractional hour of day, sized by total wattage.
fn current_usage_point(total: f64, now: DateTime<FixedOffset>) -> BubblePoint {
    BubblePoint {
        x: now.hour() as f64 + now.minute() as f64 / 60.0,
        y: total,
        r: total * RADIUS_PER_WATT,
    }
}
