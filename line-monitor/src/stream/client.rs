//! Reconnecting push-channel client.

use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::error::StreamError;
use super::message::StreamMessage;
use super::state::{ConnectionMachine, ConnectionState, Effect, ReconnectPolicy};
use super::transport::{Connector, FrameStream};

/// Default time allowed for a connection attempt to open or fail.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the queue towards the message router.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Force-close an attempt that has not opened within this time.
    pub connect_timeout: Duration,
    /// Backoff and retry budget.
    pub policy: ReconnectPolicy,
    /// Reconnect automatically after a close.
    pub auto_reconnect: bool,
    /// Capacity of the decoded-message queue.
    pub queue_capacity: usize,
}

impl StreamConfig {
    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            policy: ReconnectPolicy::default(),
            auto_reconnect: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Connect,
    Disconnect,
    Shutdown,
}

/// Handle to the push-channel actor.
///
/// Cheap to clone; every clone talks to the same connection. Lifecycle:
/// [`spawn`](Self::spawn) creates the actor idle, [`connect`](Self::connect)
/// starts it, [`disconnect`](Self::disconnect) stops it, and
/// [`shutdown`](Self::shutdown) disposes of it.
#[derive(Clone)]
pub struct StreamClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    last_message: watch::Receiver<Option<StreamMessage>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StreamClient {
    /// Spawn the actor on the current runtime.
    ///
    /// Returns the client handle and the queue of decoded messages, in
    /// arrival order.
    pub fn spawn<C: Connector>(
        connector: C,
        config: StreamConfig,
    ) -> (Self, mpsc::Receiver<StreamMessage>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (last_tx, last_rx) = watch::channel(None);

        let actor = Actor {
            connector,
            machine: ConnectionMachine::new(config.policy, config.auto_reconnect),
            connect_timeout: config.connect_timeout,
            link: Link::Idle,
            reconnect: None,
            commands: command_rx,
            messages: message_tx,
            state: state_tx,
            last_message: last_tx,
        };
        let task = tokio::spawn(actor.run());

        let client = Self {
            commands: command_tx,
            state: state_rx,
            last_message: last_rx,
            task: Arc::new(Mutex::new(Some(task))),
        };
        (client, message_rx)
    }

    /// Open the connection unless one is already open or opening.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and stop reconnecting. Idempotent.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Disconnect and stop the actor, waiting for it to finish.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown);

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "stream client task failed");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The most recently decoded message.
    pub fn last_message(&self) -> Option<StreamMessage> {
        self.last_message.borrow().clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(?command, "stream client already shut down");
        }
    }
}

/// The single connection handle.
enum Link {
    Idle,
    Opening(BoxFuture<'static, Result<FrameStream, StreamError>>),
    Open(FrameStream),
}

enum LinkEvent {
    Opened(Result<FrameStream, StreamError>),
    Frame(Option<Result<String, StreamError>>),
}

impl Link {
    async fn next_event(&mut self) -> LinkEvent {
        match self {
            Link::Idle => std::future::pending().await,
            Link::Opening(attempt) => LinkEvent::Opened(attempt.await),
            Link::Open(frames) => LinkEvent::Frame(frames.next().await),
        }
    }
}

async fn reconnect_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

struct Actor<C> {
    connector: C,
    machine: ConnectionMachine,
    connect_timeout: Duration,
    link: Link,
    reconnect: Option<Pin<Box<Sleep>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    messages: mpsc::Sender<StreamMessage>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<StreamMessage>>,
}

impl<C: Connector> Actor<C> {
    async fn run(mut self) {
        loop {
            let flow = tokio::select! {
                command = self.commands.recv() => self.handle_command(command),
                event = self.link.next_event() => self.handle_link(event).await,
                () = reconnect_timer(&mut self.reconnect) => {
                    self.handle_reconnect_due();
                    ControlFlow::Continue(())
                }
            };
            self.publish();
            if flow.is_break() {
                break;
            }
        }
        debug!("stream client stopped");
    }

    /// Apply one command; `Break` once the actor should stop.
    fn handle_command(&mut self, command: Option<Command>) -> ControlFlow<()> {
        match command {
            Some(Command::Connect) => self.handle_connect(),
            Some(Command::Disconnect) => self.handle_disconnect(),
            Some(Command::Shutdown) | None => {
                self.handle_disconnect();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_connect(&mut self) {
        match self.machine.connect() {
            Effect::Open => self.start_attempt(),
            _ => debug!(state = %self.machine.state(), "connect ignored"),
        }
    }

    fn handle_disconnect(&mut self) {
        self.machine.disconnect();
        self.reconnect = None;
        // drops any pending attempt (and its timeout) or live connection
        self.link = Link::Idle;
        info!("push channel disconnected");
    }

    fn handle_reconnect_due(&mut self) {
        self.reconnect = None;
        if self.machine.reconnect_due() == Effect::Open {
            self.start_attempt();
        }
    }

    fn start_attempt(&mut self) {
        self.reconnect = None;

        let timeout = self.connect_timeout;
        let attempt = self.connector.open();
        self.link = Link::Opening(
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(StreamError::Timeout(timeout)),
                }
            }
            .boxed(),
        );
        info!(attempt = self.machine.attempts(), "opening push channel");
    }

    async fn handle_link(&mut self, event: LinkEvent) -> ControlFlow<()> {
        match event {
            LinkEvent::Opened(Ok(frames)) => {
                self.machine.opened();
                self.link = Link::Open(frames);
                info!("push channel connected");
            }
            LinkEvent::Opened(Err(e)) => {
                warn!(error = %e, "push channel connection failed");
                self.link = Link::Idle;
                self.handle_close();
            }
            LinkEvent::Frame(Some(Ok(text))) => return self.dispatch(&text).await,
            LinkEvent::Frame(Some(Err(e))) => {
                warn!(error = %e, "push channel dropped");
                self.link = Link::Idle;
                self.handle_close();
            }
            LinkEvent::Frame(None) => {
                info!("push channel closed by peer");
                self.link = Link::Idle;
                self.handle_close();
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_close(&mut self) {
        match self.machine.closed() {
            Effect::ScheduleReconnect(delay) => {
                info!(?delay, attempt = self.machine.attempts(), "scheduling reconnect");
                self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Effect::GiveUp => {
                error!(
                    attempts = self.machine.attempts(),
                    "reconnect attempts exhausted, waiting for explicit connect"
                );
            }
            Effect::None | Effect::Open => {}
        }
    }

    /// Decode a frame and queue it for the router.
    ///
    /// Commands are still served while the queue is full; a message whose
    /// link is torn down before it fits is dropped.
    async fn dispatch(&mut self, text: &str) -> ControlFlow<()> {
        let message = match StreamMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return ControlFlow::Continue(());
            }
        };
        debug!(kind = message.type_name(), at = %message.timestamp, "push message");
        self.last_message.send_replace(Some(message.clone()));

        let messages = self.messages.clone();
        loop {
            tokio::select! {
                biased;
                permit = messages.reserve() => {
                    match permit {
                        Ok(permit) => permit.send(message),
                        Err(_) => debug!("message queue closed, dropping message"),
                    }
                    return ControlFlow::Continue(());
                }
                command = self.commands.recv() => {
                    let flow = self.handle_command(command);
                    if flow.is_break() || !matches!(self.link, Link::Open(_)) {
                        debug!("link closed while the message queue was full, dropping message");
                        return flow;
                    }
                }
            }
        }
    }

    fn publish(&self) {
        let state = self.machine.state();
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}
