//! Topic names shared with the monitor devices and the broker bridge.

pub fn usage_topic(device_id: &str) -> String {
    format!("devices/{}/monitor/usage", device_id)
}

pub fn set_enabled_topic(device_id: &str) -> String {
    format!("devices/{}/monitor/set_enabled", device_id)
}

/// Published by the broker for every bridge; the devices bridge as `{id}_broker`.
pub fn broker_state_topic(device_id: &str) -> String {
    format!("$SYS/broker/connection/{}_broker/state", device_id)
}

/// A device id must be usable as a single topic level. A leftover `$(VAR)`
/// placeholder means the environment was never filled in.
pub fn is_valid_device_id(device_id: &str) -> bool {
    !device_id.is_empty() && !device_id.contains(['/', '+', '#']) && !device_id.contains("$(")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic<'a> {
    Usage(&'a str),
    BrokerState(&'a str),
}

impl<'a> Topic<'a> {
    pub fn parse(topic: &'a str) -> Option<Self> {
        let segments: Vec<&str> = topic.split('/').collect();
        match segments[..] {
            ["devices", id, "monitor", "usage"] if !id.is_empty() => Some(Topic::Usage(id)),
            ["$SYS", "broker", "connection", bridge, "state"] => bridge
                .strip_suffix("_broker")
                .filter(|id| !id.is_empty())
                .map(Topic::BrokerState),
            _ => None,
        }
    }
}
