use crate::controller::{CommandReply, Controller, Page, PageCommand, Reaction};
use crate::error::{AppError, Result};
use crate::models::{ConnectionState, OutletState, SetEnabledCommand, UsageReport};
use crate::mqtt::topics::{
    broker_state_topic, is_valid_device_id, set_enabled_topic, usage_topic, Topic,
};
use crate::mqtt::{Publication, QoS, Subscription};
use crate::view::{hsv_to_hex, ElementId, OutletButton, ViewUpdate};
use chrono::{DateTime, Duration, FixedOffset};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const INVALID_DEVICE_ALERT: &str = "Invalid Device ID";
pub const DISCONNECTED_ADVISORY: &str = "This device does not seem to be connected to the Internet. \
     Please make sure it is powered on and connected to the network.";

/// Neutral color the device reports when usage matches the hourly average.
const DEFAULT_DIFF_COLOR: [f64; 3] = [0.2, 1.0, 0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    /// No bridge state received yet
    Unknown,
    Blocked,
    Clear,
}

/// A toggle that was published but not yet reflected in a usage report.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingToggle {
    desired: bool,
    deadline: DateTime<FixedOffset>,
}

/// Single-device page: readouts, outlet grid and outlet toggling.
pub struct MonitorPage {
    device_id: String,
    qos: QoS,
    pending_timeout: Duration,
    wattage: f64,
    difference: f64,
    diff_color: [f64; 3],
    outlets: BTreeMap<String, OutletState>,
    pending: BTreeMap<String, PendingToggle>,
    overlay: Overlay,
}

impl MonitorPage {
    /// Fails with [`AppError::InvalidDeviceId`] for an empty id (or one that is not a
    /// single topic level); callers show [`INVALID_DEVICE_ALERT`] and never connect.
    pub fn new(device_id: &str, qos: QoS, pending_timeout: std::time::Duration) -> Result<Self> {
        if !is_valid_device_id(device_id) {
            return Err(AppError::InvalidDeviceId(device_id.to_string()));
        }

        let pending_timeout = Duration::from_std(pending_timeout)
            .map_err(|e| AppError::Config(format!("pending timeout out of range: {}", e)))?;

        Ok(Self {
            device_id: device_id.to_string(),
            qos,
            pending_timeout,
            wattage: 0.0,
            difference: 0.0,
            diff_color: DEFAULT_DIFF_COLOR,
            outlets: BTreeMap::new(),
            pending: BTreeMap::new(),
            overlay: Overlay::Unknown,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    /// Enabled state as shown on the page: the pending request if any, else the device's.
    pub fn outlet_enabled(&self, outlet: &str) -> Option<bool> {
        let state = self.outlets.get(outlet)?;
        Some(
            self.pending
                .get(outlet)
                .map(|p| p.desired)
                .unwrap_or(state.enabled),
        )
    }

    pub fn is_pending(&self, outlet: &str) -> bool {
        self.pending.contains_key(outlet)
    }

    pub fn on_connection_state(&mut self, state: ConnectionState) -> Vec<ViewUpdate> {
        match state {
            ConnectionState::Connected => {
                info!(device_id = %self.device_id, "device connected");
                self.overlay = Overlay::Clear;
            }
            ConnectionState::Disconnected => {
                info!(device_id = %self.device_id, "device disconnected");
                self.overlay = Overlay::Blocked;
            }
        }
        self.overlay_update().into_iter().collect()
    }

    /// The device is authoritative: its report replaces everything, and settles any
    /// pending toggle it agrees with.
    pub fn on_usage_changed(&mut self, report: UsageReport) -> Vec<ViewUpdate> {
        self.wattage = report.wattage;
        self.difference = report.difference;
        self.diff_color = report.diff_color;
        self.outlets = report.outlets;

        let outlets = &self.outlets;
        self.pending.retain(|name, pending| match outlets.get(name) {
            Some(state) if state.enabled == pending.desired => {
                debug!(outlet = %name, enabled = state.enabled, "toggle confirmed");
                false
            }
            Some(_) => true,
            None => {
                warn!(outlet = %name, "outlet disappeared while a toggle was pending");
                false
            }
        });

        let mut updates = self.text_updates();
        updates.push(self.outlets_update());
        updates
    }

    /// Flip an outlet locally, redraw the grid and build the command for the device.
    pub fn toggle_outlet(
        &mut self,
        outlet: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<(Vec<ViewUpdate>, Publication, bool)> {
        let enabled = self
            .outlet_enabled(outlet)
            .ok_or_else(|| AppError::UnknownOutlet(outlet.to_string()))?;
        let desired = !enabled;

        self.pending.insert(
            outlet.to_string(),
            PendingToggle {
                desired,
                deadline: now + self.pending_timeout,
            },
        );

        let command = SetEnabledCommand::single(outlet, desired);
        let publication = Publication {
            topic: set_enabled_topic(&self.device_id),
            qos: self.qos,
            retain: false,
            payload: serde_json::to_vec(&command)?,
        };

        info!(device_id = %self.device_id, outlet, enabled = desired, "outlet toggle sent");
        Ok((vec![self.outlets_update()], publication, desired))
    }

    /// Revert toggles the device never confirmed.
    pub fn expire_pending(&mut self, now: DateTime<FixedOffset>) -> Vec<ViewUpdate> {
        let before = self.pending.len();
        self.pending.retain(|name, pending| {
            if pending.deadline <= now {
                warn!(outlet = %name, desired = pending.desired, "toggle not confirmed in time, reverting");
                false
            } else {
                true
            }
        });

        if self.pending.len() == before {
            Vec::new()
        } else {
            vec![self.outlets_update()]
        }
    }

    pub fn outlet_buttons(&self) -> Vec<OutletButton> {
        self.outlets
            .iter()
            .map(|(name, state)| {
                let pending = self.pending.get(name);
                let enabled = pending.map(|p| p.desired).unwrap_or(state.enabled);
                OutletButton::new(name, enabled, state.wattage, pending.is_some())
            })
            .collect()
    }

    fn outlets_update(&self) -> ViewUpdate {
        ViewUpdate::RenderOutlets {
            buttons: self.outlet_buttons(),
        }
    }

    fn overlay_update(&self) -> Option<ViewUpdate> {
        match self.overlay {
            Overlay::Unknown => None,
            Overlay::Blocked => Some(ViewUpdate::Block {
                message: DISCONNECTED_ADVISORY.to_string(),
            }),
            Overlay::Clear => Some(ViewUpdate::Unblock),
        }
    }

    fn text_updates(&self) -> Vec<ViewUpdate> {
        let [hue, _, value] = self.diff_color;
        vec![
            ViewUpdate::text(ElementId::WattageText, format!("{:.0} W", self.wattage)),
            ViewUpdate::text(ElementId::DiffText, difference_text(self.difference)),
            ViewUpdate::SetColor {
                target: ElementId::DiffText,
                color: hsv_to_hex(hue * 360.0, 1.0, value),
            },
        ]
    }
}

fn difference_text(difference: f64) -> String {
    let sign = if difference >= 0.0 { '+' } else { '-' };
    format!("{} {:.2} W", sign, difference.abs())
}

impl Controller for MonitorPage {
    fn page(&self) -> Page {
        Page::Monitor
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(usage_topic(&self.device_id), self.qos),
            Subscription::new(broker_state_topic(&self.device_id), self.qos),
        ]
    }

    fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        _now: DateTime<FixedOffset>,
    ) -> Result<Reaction> {
        match Topic::parse(topic) {
            Some(Topic::BrokerState(id)) if id == self.device_id => Ok(Reaction::render(
                self.on_connection_state(ConnectionState::from_payload(payload)),
            )),
            Some(Topic::Usage(id)) if id == self.device_id => {
                let report = UsageReport::parse(topic, payload)?;
                Ok(Reaction::render(self.on_usage_changed(report)))
            }
            _ => Err(AppError::UnknownTopic(topic.to_string())),
        }
    }

    fn handle_command(
        &mut self,
        command: PageCommand,
        now: DateTime<FixedOffset>,
    ) -> Result<(Reaction, CommandReply)> {
        match command {
            PageCommand::ToggleOutlet { outlet } => {
                let (updates, publication, enabled) = self.toggle_outlet(&outlet, now)?;
                Ok((
                    Reaction {
                        updates,
                        publications: vec![publication],
                    },
                    CommandReply::Toggled {
                        outlet,
                        enabled,
                        pending: true,
                    },
                ))
            }
        }
    }

    fn tick(&mut self, now: DateTime<FixedOffset>) -> Reaction {
        Reaction::render(self.expire_pending(now))
    }

    fn snapshot(&self) -> Vec<ViewUpdate> {
        let mut updates: Vec<ViewUpdate> = self.overlay_update().into_iter().collect();
        updates.extend(self.text_updates());
        updates.push(self.outlets_update());
        updates
    }
}
