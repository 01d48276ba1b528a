use crate::config::{MqttConfig, MqttTransport};
use crate::error::{AppError, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use std::time::Duration;
use uuid::Uuid;

/// What a session cares about from the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// The broker acknowledged a (re)connection; subscriptions must be issued again.
    Connected,
    Message { topic: String, payload: Vec<u8> },
    /// Our DISCONNECT went out; the event loop has nothing left to do.
    Disconnected,
}

/// Build client options for one controller. Every call gets a fresh random client id,
/// so two controllers never kick each other off the broker.
pub fn build_options(cfg: &MqttConfig, role: &str) -> Result<MqttOptions> {
    let client_id = format!("{}-{}-{}", cfg.client_id_prefix, role, Uuid::new_v4());

    let mut opts = match cfg.transport {
        MqttTransport::Tcp => {
            let mut opts = MqttOptions::new(client_id, cfg.host.clone(), cfg.port);
            if cfg.port == 8883 {
                opts.set_transport(Transport::tls_with_default_config());
            }
            opts
        }
        MqttTransport::Websocket => {
            if !cfg.path.starts_with('/') {
                return Err(AppError::Config(format!(
                    "websocket path must start with '/' (got {})",
                    cfg.path
                )));
            }
            // rumqttc expects the full websocket URL in place of the host
            let url = format!("ws://{}:{}{}", cfg.host, cfg.port, cfg.path);
            let mut opts = MqttOptions::new(client_id, url, cfg.port);
            opts.set_transport(Transport::Ws);
            opts
        }
    };

    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    opts.set_clean_session(true);
    if let (Some(u), Some(p)) = (&cfg.username, &cfg.password) {
        opts.set_credentials(u.clone(), p.clone());
    }
    Ok(opts)
}

pub fn new(options: MqttOptions) -> (AsyncClient, EventLoop) {
    AsyncClient::new(options, 50)
}

pub fn qos(v: u8) -> QoS {
    match v {
        2 => QoS::ExactlyOnce,
        0 => QoS::AtMostOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// Poll the event loop until something a session reacts to shows up.
pub async fn next_event(eventloop: &mut EventLoop) -> Result<MqttEvent> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(MqttEvent::Connected),
            Ok(Event::Incoming(Packet::Publish(p))) => {
                return Ok(MqttEvent::Message {
                    topic: p.topic,
                    payload: p.payload.to_vec(),
                })
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(MqttEvent::Disconnected),
            Ok(_) => continue,
            Err(e) => return Err(AppError::Mqtt(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;

    fn mqtt_config(transport: MqttTransport, port: u16) -> MqttConfig {
        MqttConfig {
            host: "broker.local".into(),
            port,
            transport,
            path: "/mqtt".into(),
            client_id_prefix: "power-monitor".into(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            qos: 1,
            reconnect: ReconnectConfig::default(),
        }
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos(0), QoS::AtMostOnce);
        assert_eq!(qos(1), QoS::AtLeastOnce);
        assert_eq!(qos(2), QoS::ExactlyOnce);
    }

    #[test]
    fn test_websocket_options_use_url() {
        let opts = build_options(&mqtt_config(MqttTransport::Websocket, 9001), "graph").unwrap();

        let (host, port) = opts.broker_address();
        assert_eq!(host, "ws://broker.local:9001/mqtt");
        assert_eq!(port, 9001);
        assert!(opts.client_id().starts_with("power-monitor-graph-"));
    }

    #[test]
    fn test_client_ids_are_unique() {
        let cfg = mqtt_config(MqttTransport::Tcp, 1883);
        let a = build_options(&cfg, "monitor").unwrap();
        let b = build_options(&cfg, "monitor").unwrap();

        assert_ne!(a.client_id(), b.client_id());
    }

    #[test]
    fn test_rejects_relative_websocket_path() {
        let mut cfg = mqtt_config(MqttTransport::Websocket, 9001);
        cfg.path = "mqtt".into();

        assert!(matches!(build_options(&cfg, "graph"), Err(AppError::Config(_))));
    }
}
