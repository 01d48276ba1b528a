pub mod backoff;
pub mod client;
pub mod topics;

pub use backoff::Backoff;
pub use client::{build_options, next_event, qos, MqttEvent};
pub use rumqttc::QoS;

/// A topic the session subscribes to every time the broker acknowledges a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// An outbound message produced by a controller and sent by its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: Vec<u8>,
}
