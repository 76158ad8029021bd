mod manager;
mod state;

pub use state::{ChannelStatus, ConnectionState, ReconnectBudget};

use crate::codec::{self, CodecError};
use crate::config::ChannelConfig;
use crate::dispatch::{Dispatcher, Subscription};
use crate::model::{InboundMessage, MessageKind, OutboundIntent};
use manager::{Command, ConnectionManager};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5001/ws";
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

type Hook = Arc<dyn Fn() + Send + Sync>;
type MessageHook = Arc<dyn Fn(&InboundMessage) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ChannelError) + Send + Sync>;

#[derive(Debug)]
pub enum ChannelError {
    InvalidEndpoint(String),
    Transport(String),
    Encode(CodecError),
    Closed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(msg) => write!(f, "invalid endpoint: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Encode(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "channel task has stopped"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

// hooks run on the connection task and must not block
#[derive(Clone, Default)]
pub struct LifecycleCallbacks {
    on_open: Option<Hook>,
    on_message: Option<MessageHook>,
    on_close: Option<Hook>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for LifecycleCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl LifecycleCallbacks {
    pub(crate) fn opened(&self) {
        if let Some(hook) = &self.on_open {
            hook();
        }
    }

    pub(crate) fn message(&self, message: &InboundMessage) {
        if let Some(hook) = &self.on_message {
            hook(message);
        }
    }

    pub(crate) fn closed(&self) {
        if let Some(hook) = &self.on_close {
            hook();
        }
    }

    pub(crate) fn errored(&self, err: &ChannelError) {
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub url: String,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub user_id: Option<String>,
    pub callbacks: LifecycleCallbacks,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            user_id: None,
            callbacks: LifecycleCallbacks::default(),
        }
    }
}

impl ChannelOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            url: config.url.clone(),
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            user_id: config.user_id.clone(),
            callbacks: LifecycleCallbacks::default(),
        }
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_open = Some(Arc::new(hook));
        self
    }

    pub fn on_message(mut self, hook: impl Fn(&InboundMessage) + Send + Sync + 'static) -> Self {
        self.callbacks.on_message = Some(Arc::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_close = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&ChannelError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(hook));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    dispatcher: Dispatcher,
    user_id: Option<Arc<str>>,
}

pub fn spawn(options: ChannelOptions) -> ChannelHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(ChannelStatus::default());
    let dispatcher = Dispatcher::new();
    let user_id = options.user_id.as_deref().map(Arc::from);

    let manager = ConnectionManager::new(options, status_tx, dispatcher.clone());
    tokio::spawn(manager.run(commands_rx));

    ChannelHandle {
        commands: commands_tx,
        status: status_rx,
        dispatcher,
        user_id,
    }
}

impl ChannelHandle {
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    pub fn send(&self, intent: &OutboundIntent) -> Result<SendOutcome, ChannelError> {
        self.send_raw(intent.tag(), intent)
    }

    pub fn send_ping(&self) -> Result<SendOutcome, ChannelError> {
        self.send(&OutboundIntent::Ping {
            timestamp: codec::now_unix_ms(),
        })
    }

    pub fn send_raw<T: Serialize + ?Sized>(
        &self,
        message_type: &str,
        data: &T,
    ) -> Result<SendOutcome, ChannelError> {
        let frame =
            codec::encode(message_type, data, self.user_id.as_deref()).map_err(ChannelError::Encode)?;

        if !self.status.borrow().is_connected() {
            tracing::warn!(message_type, "channel not connected; dropping outbound message");
            return Ok(SendOutcome::Dropped);
        }

        self.commands
            .send(Command::Send {
                message_type: message_type.to_string(),
                frame,
            })
            .map_err(|_| ChannelError::Closed)?;
        Ok(SendOutcome::Sent)
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    pub async fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> bool {
        let mut status = self.status.clone();
        let reached = tokio::time::timeout(timeout, status.wait_for(|s| s.state == state)).await;
        matches!(reached, Ok(Ok(_)))
    }

    pub fn subscribe(&self, kinds: &[MessageKind]) -> Subscription {
        self.dispatcher.subscribe(kinds)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("channel task has stopped; command ignored");
        }
    }
}
