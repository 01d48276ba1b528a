//! One MQTT session per page. The session task is the only owner of its controller:
//! broker events (forwarded from a separate event loop task), browser commands and
//! housekeeping ticks are handled in one `select!` loop, and the rendered results
//! fan out to browsers through a [`PageHandle`].

use crate::controller::{CommandReply, Controller, Page, PageCommand, Reaction};
use crate::error::{AppError, Result};
use crate::mqtt::{self, Backoff, MqttEvent};
use crate::view::{clock_text, ElementId, ViewUpdate};
use chrono::{DateTime, FixedOffset, Local};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, SubscribeFilter};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 100;
const COMMAND_CHANNEL_CAPACITY: usize = 16;
const EVENT_CHANNEL_CAPACITY: usize = 100;
/// How long the event loop gets to flush DISCONNECT on shutdown.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

pub struct CommandRequest {
    pub command: PageCommand,
    pub reply: oneshot::Sender<Result<CommandReply>>,
}

/// The web layer's view of a page: the latest full render, a stream of
/// incremental updates and, when a session runs, a way to send it commands.
#[derive(Clone)]
pub struct PageHandle {
    page: Page,
    updates: broadcast::Sender<Vec<ViewUpdate>>,
    snapshot: watch::Receiver<Vec<ViewUpdate>>,
    commands: Option<mpsc::Sender<CommandRequest>>,
}

/// Session-side ends of a [`PageHandle`].
pub struct SessionChannels {
    pub updates: broadcast::Sender<Vec<ViewUpdate>>,
    pub snapshot: watch::Sender<Vec<ViewUpdate>>,
    pub commands: mpsc::Receiver<CommandRequest>,
}

impl PageHandle {
    pub fn channel(page: Page, initial: Vec<ViewUpdate>) -> (Self, SessionChannels) {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let handle = Self {
            page,
            updates: updates.clone(),
            snapshot: snapshot_rx,
            commands: Some(command_tx),
        };
        let channels = SessionChannels {
            updates,
            snapshot: snapshot_tx,
            commands: command_rx,
        };
        (handle, channels)
    }

    /// A page that never gets a session, e.g. one that failed its start-up checks.
    /// It keeps serving `snapshot` and rejects commands.
    pub fn detached(page: Page, snapshot: Vec<ViewUpdate>) -> Self {
        let (updates, _) = broadcast::channel(1);
        let (_, snapshot_rx) = watch::channel(snapshot);
        Self {
            page,
            updates,
            snapshot: snapshot_rx,
            commands: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ViewUpdate>> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Vec<ViewUpdate> {
        self.snapshot.borrow().clone()
    }

    /// Push updates that do not come from the controller (the clock). Returns the
    /// number of browsers that received them.
    pub fn broadcast(&self, updates: Vec<ViewUpdate>) -> usize {
        self.updates.send(updates).unwrap_or(0)
    }

    pub async fn command(&self, command: PageCommand) -> Result<CommandReply> {
        let sender = self.commands.as_ref().ok_or_else(|| {
            AppError::Unsupported(format!("the {} page is not running", self.page.as_str()))
        })?;

        let (reply, response) = oneshot::channel();
        sender
            .send(CommandRequest { command, reply })
            .await
            .map_err(|_| AppError::Internal("page session has stopped".to_string()))?;

        response
            .await
            .map_err(|_| AppError::Internal("page session dropped the command".to_string()))?
    }
}

pub struct Session<C: Controller> {
    controller: C,
    client: AsyncClient,
    pump: EventPump,
    tick_interval: Duration,
    channels: SessionChannels,
}

impl<C: Controller> Session<C> {
    pub fn new(
        controller: C,
        options: MqttOptions,
        backoff: Backoff,
        tick_interval: Duration,
        channels: SessionChannels,
    ) -> Self {
        let (client, eventloop) = mqtt::client::new(options);
        Self {
            pump: EventPump {
                page: controller.page().as_str(),
                eventloop,
                backoff,
            },
            controller,
            client,
            tick_interval,
            channels,
        }
    }

    /// Drive the page until shutdown, or until reconnect attempts run out.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Session {
            controller,
            client,
            pump,
            tick_interval,
            channels,
        } = self;
        let mut page = PageState {
            controller,
            client,
            channels,
        };
        let name = page.controller.page().as_str();
        info!(page = name, "starting MQTT session");
        page.channels.snapshot.send_replace(page.controller.snapshot());

        // The event loop gets its own task: `poll` must never be cancelled mid-connect,
        // and it has to keep draining the client's request queue while this loop works.
        let (event_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut pump_task = tokio::spawn(pump.run(event_tx));

        let mut ticker = tokio::time::interval(tick_interval);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!(page = name, "shutdown requested, disconnecting");
                    if let Err(e) = page.client.try_disconnect() {
                        debug!(page = name, error = %e, "disconnect failed");
                    }
                    if tokio::time::timeout(DISCONNECT_GRACE, &mut pump_task).await.is_err() {
                        pump_task.abort();
                    }
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(MqttEvent::Connected) => {
                        info!(page = name, "connected to broker");
                        page.subscribe_all();
                    }
                    Some(MqttEvent::Message { topic, payload }) => {
                        page.on_message(&topic, &payload);
                    }
                    Some(MqttEvent::Disconnected) | None => {
                        return match (&mut pump_task).await {
                            Ok(result) => result,
                            Err(e) => Err(AppError::Internal(format!(
                                "{} event loop task failed: {}",
                                name, e
                            ))),
                        };
                    }
                },
                Some(request) = page.channels.commands.recv() => {
                    page.on_command(request);
                }
                _ = ticker.tick() => {
                    let reaction = page.controller.tick(now());
                    page.apply(reaction);
                }
            }
        }
    }
}

/// Owns the rumqttc event loop: polls it, backs off between failed connection
/// attempts and forwards what the page needs to the session.
struct EventPump {
    page: &'static str,
    eventloop: EventLoop,
    backoff: Backoff,
}

impl EventPump {
    async fn run(mut self, events: mpsc::Sender<MqttEvent>) -> Result<()> {
        loop {
            match mqtt::next_event(&mut self.eventloop).await {
                Ok(MqttEvent::Disconnected) => {
                    debug!(page = self.page, "disconnected from broker");
                    return Ok(());
                }
                Ok(event) => {
                    if event == MqttEvent::Connected {
                        self.backoff.reset();
                    }
                    if events.send(event).await.is_err() {
                        // Session is gone
                        return Ok(());
                    }
                }
                Err(e) => {
                    let Some(delay) = self.backoff.next_delay() else {
                        error!(page = self.page, error = %e, attempts = self.backoff.attempts(), "giving up on broker connection");
                        return Err(AppError::Mqtt(format!(
                            "{} session gave up after {} attempts: {}",
                            self.page,
                            self.backoff.attempts(),
                            e
                        )));
                    };
                    warn!(page = self.page, error = %e, delay_ms = delay.as_millis() as u64, "connection lost, reconnecting");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// The parts of a session its `select!` loop works on.
struct PageState<C: Controller> {
    controller: C,
    client: AsyncClient,
    channels: SessionChannels,
}

impl<C: Controller> PageState<C> {
    /// One SUBSCRIBE per connection. The request is queued without waiting so the
    /// session never blocks on the client while the event loop catches up.
    fn subscribe_all(&mut self) {
        let filters: Vec<SubscribeFilter> = self
            .controller
            .subscriptions()
            .into_iter()
            .map(|s| SubscribeFilter::new(s.topic, s.qos))
            .collect();
        if filters.is_empty() {
            return;
        }

        let count = filters.len();
        match self.client.try_subscribe_many(filters) {
            Ok(()) => debug!(count, "subscribe requested"),
            Err(e) => warn!(count, error = %e, "subscribe failed"),
        }
    }

    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        match self.controller.handle_message(topic, payload, now()) {
            Ok(reaction) => self.apply(reaction),
            Err(e) => warn!(topic = %topic, error = %e, "dropping message"),
        }
    }

    fn on_command(&mut self, request: CommandRequest) {
        let result = match self.controller.handle_command(request.command, now()) {
            Ok((reaction, reply)) => {
                self.apply(reaction);
                Ok(reply)
            }
            Err(e) => {
                debug!(error = %e, "command rejected");
                Err(e)
            }
        };

        if request.reply.send(result).is_err() {
            debug!("command requester went away before the reply");
        }
    }

    fn apply(&mut self, reaction: Reaction) {
        for publication in reaction.publications {
            if let Err(e) = self.client.try_publish(
                publication.topic.clone(),
                publication.qos,
                publication.retain,
                publication.payload,
            ) {
                warn!(topic = %publication.topic, error = %e, "publish failed");
            }
        }

        if reaction.updates.is_empty() {
            return;
        }
        self.channels.snapshot.send_replace(self.controller.snapshot());
        // No receivers just means no browser is open
        let _ = self.channels.updates.send(reaction.updates);
    }
}

/// Refresh `#time-text` on a fixed interval, independent of broker traffic.
pub async fn run_clock(handle: PageHandle, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = ticker.tick() => {
                let text = clock_text(Local::now().time());
                handle.broadcast(vec![ViewUpdate::text(ElementId::TimeText, text)]);
            }
        }
    }
}

/// Resolves once shutdown is signalled or the signalling side is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_page_rejects_commands() {
        let handle = PageHandle::detached(Page::Monitor, vec![]);

        let result = handle
            .command(PageCommand::ToggleOutlet {
                outlet: "p1".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let (handle, mut channels) = PageHandle::channel(Page::Monitor, vec![]);

        tokio::spawn(async move {
            if let Some(request) = channels.commands.recv().await {
                let PageCommand::ToggleOutlet { outlet } = request.command;
                let _ = request.reply.send(Ok(CommandReply::Toggled {
                    outlet,
                    enabled: false,
                    pending: true,
                }));
            }
        });

        let reply = handle
            .command(PageCommand::ToggleOutlet {
                outlet: "p1".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            reply,
            CommandReply::Toggled {
                outlet: "p1".into(),
                enabled: false,
                pending: true
            }
        );
    }

    #[tokio::test]
    async fn test_stopped_session_is_reported() {
        let (handle, channels) = PageHandle::channel(Page::Graph, vec![]);
        drop(channels);

        let result = handle
            .command(PageCommand::ToggleOutlet {
                outlet: "p1".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_snapshot_follows_session() {
        let (handle, channels) = PageHandle::channel(Page::Graph, vec![]);

        channels
            .snapshot
            .send_replace(vec![ViewUpdate::text(ElementId::GraphHeader, "x")]);
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let (tx, mut rx) = watch::channel(false);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .expect("shutdown should resolve");
    }

    #[tokio::test]
    async fn test_clock_stops_on_shutdown() {
        let handle = PageHandle::detached(Page::Monitor, vec![]);
        let mut updates = handle.subscribe();
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_clock(handle, Duration::from_millis(10), rx));
        let first = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            &first[0],
            ViewUpdate::SetText { target: ElementId::TimeText, .. }
        ));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
