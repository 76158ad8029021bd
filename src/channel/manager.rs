use super::state::{ChannelStatus, ConnectionState, ReconnectBudget};
use super::{ChannelError, ChannelOptions, LifecycleCallbacks};
use crate::codec::{self, CodecError};
use crate::dispatch::Dispatcher;
use crate::model::InboundMessage;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Sleep};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, handshake::client::Request, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingConnect = Pin<Box<dyn Future<Output = Result<Socket, tungstenite::Error>> + Send>>;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub(super) enum Command {
    Connect,
    Disconnect,
    Send { message_type: String, frame: String },
}

enum Inbound {
    Frame(Message),
    Failed(tungstenite::Error),
    Ended,
}

pub(super) struct ConnectionManager {
    endpoint: String,
    budget: ReconnectBudget,
    callbacks: LifecycleCallbacks,
    status: watch::Sender<ChannelStatus>,
    dispatcher: Dispatcher,
    socket: Option<Socket>,
    connecting: Option<PendingConnect>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl ConnectionManager {
    pub(super) fn new(
        options: ChannelOptions,
        status: watch::Sender<ChannelStatus>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            endpoint: options.url,
            budget: ReconnectBudget::new(options.max_reconnect_attempts, options.reconnect_interval),
            callbacks: options.callbacks,
            status,
            dispatcher,
            socket: None,
            connecting: None,
            reconnect_timer: None,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Connect) => self.connect(true),
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::Send { message_type, frame }) => {
                        self.transmit(&message_type, frame).await
                    }
                    None => break,
                },
                result = finish_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }
                inbound = next_inbound(&mut self.socket) => self.on_inbound(inbound),
                _ = reconnect_due(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.connect(false);
                }
            }
        }

        self.disconnect().await;
        tracing::debug!(endpoint = %self.endpoint, "channel task stopped");
    }

    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    fn connect(&mut self, manual: bool) {
        let state = self.state();
        if matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
            tracing::debug!(state = %state, "connect ignored");
            return;
        }

        if manual {
            self.reconnect_timer = None;
            if self.budget.is_exhausted() {
                self.budget.reset();
            }
        }

        self.transition(ConnectionState::Connecting);
        self.status.send_modify(|status| {
            status.reconnect_attempts = self.budget.attempts_made();
            status.reconnect_exhausted = false;
        });

        let request = match client_request(&self.endpoint) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "cannot open channel");
                self.raise_error(err);
                return;
            }
        };

        tracing::info!(
            endpoint = %self.endpoint,
            attempt = self.budget.attempts_made(),
            "connecting"
        );
        self.connecting = Some(Box::pin(async move {
            tokio_tungstenite::connect_async(request)
                .await
                .map(|(socket, _response)| socket)
        }));
    }

    fn on_connect_result(&mut self, result: Result<Socket, tungstenite::Error>) {
        match result {
            Ok(socket) => {
                self.socket = Some(socket);
                self.budget.reset();
                self.transition(ConnectionState::Connected);
                self.status.send_modify(|status| {
                    status.reconnect_attempts = 0;
                    status.reconnect_exhausted = false;
                    status.last_error = None;
                });
                tracing::info!(endpoint = %self.endpoint, "channel connected");
                self.callbacks.opened();
            }
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "connect failed");
                self.raise_error(ChannelError::Transport(err.to_string()));
                self.on_closed();
            }
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Frame(Message::Text(text)) => self.deliver(codec::decode(&text)),
            Inbound::Frame(Message::Binary(bytes)) => self.deliver(codec::decode_bytes(&bytes)),
            Inbound::Frame(Message::Close(frame)) => {
                tracing::info!(endpoint = %self.endpoint, frame = ?frame, "server closed channel");
                self.on_closed();
            }
            Inbound::Frame(_) => {}
            Inbound::Failed(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "transport error");
                self.raise_error(ChannelError::Transport(err.to_string()));
                self.on_closed();
            }
            Inbound::Ended => self.on_closed(),
        }
    }

    fn deliver(&self, decoded: Result<InboundMessage, CodecError>) {
        match decoded {
            Ok(message) => {
                self.callbacks.message(&message);
                self.dispatcher.dispatch(message);
            }
            Err(err) => tracing::warn!(error = %err, "discarding malformed inbound frame"),
        }
    }

    async fn transmit(&mut self, message_type: &str, frame: String) {
        let Some(socket) = self.socket.as_mut() else {
            tracing::warn!(message_type, "channel not connected; dropping outbound message");
            return;
        };
        if let Err(err) = socket.send(Message::Text(frame)).await {
            tracing::warn!(message_type, error = %err, "send failed");
            self.raise_error(ChannelError::Transport(err.to_string()));
            self.on_closed();
        }
    }

    fn on_closed(&mut self) {
        self.socket = None;
        self.transition(ConnectionState::Disconnected);
        self.callbacks.closed();

        match self.budget.next_delay() {
            Some(delay) => {
                let attempt = self.budget.attempts_made();
                self.status.send_modify(|status| status.reconnect_attempts = attempt);
                tracing::info!(
                    attempt,
                    max_attempts = self.budget.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                self.status.send_modify(|status| status.reconnect_exhausted = true);
                tracing::warn!(
                    endpoint = %self.endpoint,
                    attempts = self.budget.attempts_made(),
                    "reconnect attempts exhausted; waiting for manual connect"
                );
            }
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_timer = None;
        self.connecting = None;

        match self.socket.take() {
            Some(mut socket) => {
                // handles must see disconnected before the close handshake is awaited
                self.transition(ConnectionState::Disconnected);
                if tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await.is_err() {
                    tracing::debug!(endpoint = %self.endpoint, "close handshake timed out");
                }
                tracing::info!(endpoint = %self.endpoint, "channel disconnected");
                self.callbacks.closed();
            }
            None => self.transition(ConnectionState::Disconnected),
        }
    }

    fn raise_error(&self, err: ChannelError) {
        self.transition(ConnectionState::Errored);
        let detail = err.to_string();
        self.status.send_modify(|status| status.last_error = Some(detail));
        self.callbacks.errored(&err);
    }

    fn transition(&self, next: ConnectionState) {
        self.status.send_if_modified(|status| {
            if status.state == next {
                return false;
            }
            let legal = status.state.can_transition_to(next);
            if !legal {
                tracing::error!(from = %status.state, to = %next, "unexpected connection state transition");
            }
            debug_assert!(legal, "illegal connection state transition {} -> {}", status.state, next);
            status.state = next;
            true
        });
    }
}

fn client_request(endpoint: &str) -> Result<Request, ChannelError> {
    let request = endpoint
        .into_client_request()
        .map_err(|err| ChannelError::InvalidEndpoint(format!("{endpoint}: {err}")))?;
    match request.uri().scheme_str() {
        Some("ws") | Some("wss") => {}
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "{endpoint}: unsupported scheme {}",
                other.unwrap_or("<none>")
            )))
        }
    }
    if request.uri().host().is_none() {
        return Err(ChannelError::InvalidEndpoint(format!("{endpoint}: missing host")));
    }
    Ok(request)
}

async fn finish_connect(pending: &mut Option<PendingConnect>) -> Result<Socket, tungstenite::Error> {
    match pending.as_mut() {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

async fn next_inbound(socket: &mut Option<Socket>) -> Inbound {
    let Some(socket) = socket.as_mut() else {
        return std::future::pending().await;
    };
    match socket.next().await {
        Some(Ok(message)) => Inbound::Frame(message),
        Some(Err(err)) => Inbound::Failed(err),
        None => Inbound::Ended,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
