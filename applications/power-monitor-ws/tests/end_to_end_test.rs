/// End-to-end test against a real MQTT broker
///
/// Plays the part of a monitor device with a second client: publishes a usage
/// report, then checks that an outlet toggle from the page reaches the device.
///
/// Run with: MQTT_HOST=localhost MQTT_PORT=1883 cargo test --test end_to_end_test -- --ignored
use power_monitor_ws::config::Config;
use power_monitor_ws::controller::{CommandReply, Controller, MonitorPage, Page, PageCommand};
use power_monitor_ws::mqtt::{self, Backoff, QoS};
use power_monitor_ws::session::{PageHandle, Session};
use power_monitor_ws::view::ViewUpdate;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

fn broker() -> (String, u16) {
    let host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);
    (host, port)
}

#[tokio::test]
#[ignore]
async fn test_toggle_reaches_device() {
    let (host, port) = broker();

    if tokio::net::TcpStream::connect((host.as_str(), port))
        .await
        .is_err()
    {
        eprintln!(
            "⚠️  Skipping test: no MQTT broker at {}:{}\n\
             Start one with: docker run -d -p 1883:1883 eclipse-mosquitto:2 mosquitto -c /mosquitto-no-auth.conf",
            host, port
        );
        return;
    }

    let device_id = format!("e2e{}", uuid::Uuid::new_v4().simple());
    let config = Config::from_yaml(&format!(
        r#"
mqtt:
  host: "{host}"
  port: {port}
  transport: tcp
server:
  host: "127.0.0.1"
  port: 8080
  max_connections: 1
monitor:
  device_id: "{device_id}"
"#
    ))
    .unwrap();

    // The page under test
    let page = MonitorPage::new(&device_id, QoS::AtLeastOnce, Duration::from_secs(10)).unwrap();
    let (handle, channels) = PageHandle::channel(Page::Monitor, page.snapshot());
    let mut updates = handle.subscribe();
    let session = Session::new(
        page,
        mqtt::build_options(&config.mqtt, "e2e").unwrap(),
        Backoff::from_config(&config.mqtt.reconnect),
        Duration::from_secs(1),
        channels,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let session_task = tokio::spawn(session.run(shutdown_rx));

    // The fake device
    let mut opts = MqttOptions::new(format!("{}-device", device_id), host.clone(), port);
    opts.set_keep_alive(Duration::from_secs(5));
    let (device, mut device_loop) = AsyncClient::new(opts, 10);
    device
        .subscribe(
            format!("devices/{}/monitor/set_enabled", device_id),
            QoS::AtLeastOnce,
        )
        .await
        .unwrap();

    let (command_tx, mut command_rx) = tokio::sync::mpsc::channel::<Vec<u8>>(4);
    tokio::spawn(async move {
        while let Ok(event) = device_loop.poll().await {
            if let Event::Incoming(Packet::Publish(p)) = event {
                let _ = command_tx.send(p.payload.to_vec()).await;
            }
        }
    });

    // Give the page session time to connect and subscribe
    tokio::time::sleep(Duration::from_secs(1)).await;

    device
        .publish(
            format!("devices/{}/monitor/usage", device_id),
            QoS::AtLeastOnce,
            false,
            r#"{"wattage": 42.0, "difference": 1.5, "diff_color": [0.2, 1.0, 0.5], "outlets": {"plug1": {"enabled": true, "wattage": 42.0}}}"#,
        )
        .await
        .unwrap();

    let rendered = timeout(Duration::from_secs(5), async {
        loop {
            let batch = updates.recv().await.unwrap();
            if batch
                .iter()
                .any(|u| matches!(u, ViewUpdate::RenderOutlets { buttons } if !buttons.is_empty()))
            {
                return batch;
            }
        }
    })
    .await
    .expect("usage report should render the outlet grid");
    assert!(!rendered.is_empty());

    let reply = handle
        .command(PageCommand::ToggleOutlet {
            outlet: "plug1".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        reply,
        CommandReply::Toggled {
            outlet: "plug1".into(),
            enabled: false,
            pending: true
        }
    );

    let command = timeout(Duration::from_secs(5), command_rx.recv())
        .await
        .expect("device should receive the set_enabled command")
        .unwrap();
    assert_eq!(
        String::from_utf8(command).unwrap(),
        r#"{"outlets":{"plug1":false}}"#
    );

    shutdown_tx.send(true).unwrap();
    let result = timeout(Duration::from_secs(5), session_task)
        .await
        .expect("session should stop on shutdown")
        .unwrap();
    assert!(result.is_ok());
}
