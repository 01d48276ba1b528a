use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authoritative state of one outlet as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutletState {
    pub enabled: bool,
    pub wattage: f64,
}

/// Body of `devices/{id}/monitor/set_enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEnabledCommand {
    pub outlets: BTreeMap<String, bool>,
}

impl SetEnabledCommand {
    /// A command addressing exactly one outlet.
    pub fn single(outlet: impl Into<String>, enabled: bool) -> Self {
        let mut outlets = BTreeMap::new();
        outlets.insert(outlet.into(), enabled);
        Self { outlets }
    }
}
