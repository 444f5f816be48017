//! Connection engine: command issuance, read loop and correlation.
//!
//! Commands resolve strictly in issue order. Each issued command sits in a
//! FIFO queue with one or more response stages; every inbound frame that
//! classifies as a command response is matched against the head stage of
//! the head command, resolves it (with a reply, a device status or a
//! mismatch) and is never matched against anything else. Event frames
//! bypass the queue and fan out to subscribers, except that a stage marked
//! as event-completing (radio reset's device-started stage) gets first
//! look.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

use meshserial_protocol::{
    Classifier, Command, Event, Frame, FrameKind, PrefixCheck, Reassembler, ResponsePrefix,
    StatusCode,
};

use crate::error::HostError;
use crate::transport::{BoxedTransport, Transport};

/// Default per-stage response timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read buffer size (4 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Minimum read buffer size (256 B).
pub const MIN_READ_BUFFER_SIZE: usize = 256;

/// Maximum read buffer size (64 KiB).
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default capacity for the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to wait for each response stage.
    pub command_timeout: Duration,
    /// Read buffer size for transport reads.
    pub read_buffer_size: usize,
    /// Response opcode table used to classify inbound frames.
    pub classifier: Classifier,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            classifier: Classifier::default(),
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A resolved response stage: the raw frame plus where the reply payload
/// begins within it.
#[derive(Debug)]
pub struct StageReply {
    pub frame: Frame,
    pub payload_start: usize,
}

impl StageReply {
    /// The reply payload the prefix match exposed.
    pub fn payload(&self) -> &[u8] {
        &self.frame.as_bytes()[self.payload_start..]
    }
}

struct Stage {
    expected: ResponsePrefix,
    resolver: oneshot::Sender<Result<StageReply, HostError>>,
}

struct PendingCommand {
    name: &'static str,
    stages: VecDeque<Stage>,
}

/// A connection to a mesh device over some byte transport.
pub struct Connection {
    config: ConnectionConfig,
    /// Write half of the transport (for issuing commands).
    writer: Mutex<Option<WriteHalf<BoxedTransport>>>,
    /// Read half of the transport (owned by the read loop).
    reader: Mutex<Option<ReadHalf<BoxedTransport>>>,
    /// Reassembler for inbound chunks.
    reassembler: Mutex<Reassembler>,
    /// Issued commands awaiting responses, in issue order.
    pending: Mutex<VecDeque<PendingCommand>>,
    /// Is the connection up?
    connected: AtomicBool,
    /// Broadcast channel for device events.
    events: broadcast::Sender<Event>,
    /// Count of response-classified frames that arrived with nothing
    /// pending.
    unsolicited: AtomicU64,
    /// Background read task, aborted on close.
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Attaches the engine to an open transport and starts the read loop.
    pub async fn attach<T>(transport: T, config: ConnectionConfig) -> Arc<Self>
    where
        T: Transport + 'static,
    {
        let boxed: BoxedTransport = Box::new(transport);
        let (read_half, write_half) = tokio::io::split(boxed);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let connection = Arc::new(Self {
            config,
            writer: Mutex::new(Some(write_half)),
            reader: Mutex::new(Some(read_half)),
            reassembler: Mutex::new(Reassembler::new()),
            pending: Mutex::new(VecDeque::new()),
            connected: AtomicBool::new(true),
            events,
            unsolicited: AtomicU64::new(0),
            read_task: Mutex::new(None),
        });

        let reader_conn = connection.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = reader_conn.read_loop().await {
                tracing::debug!("read loop ended: {}", e);
            }
        });
        *connection.read_task.lock().await = Some(task);

        tracing::debug!("transport attached");
        connection
    }

    /// Subscribes to device events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Issues a command and waits for every response stage it expects.
    ///
    /// Returns the final stage's reply; intermediate stages (radio reset's
    /// acknowledgment) are checked and discarded. Encoding, enqueueing and
    /// writing happen under the writer lock, so concurrent callers cannot
    /// interleave the queue order with the wire order.
    pub async fn execute(&self, command: Command) -> Result<StageReply, HostError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(HostError::NotConnected);
        }

        let name = command.name();
        let encoded = command.encode()?;
        let stages = command.response_stages();

        let mut receivers = Vec::with_capacity(stages.len());
        let mut queued = PendingCommand {
            name,
            stages: VecDeque::with_capacity(stages.len()),
        };
        for expected in stages {
            let (tx, rx) = oneshot::channel();
            queued.stages.push_back(Stage {
                expected,
                resolver: tx,
            });
            receivers.push(rx);
        }

        {
            let mut writer_guard = self.writer.lock().await;
            let writer = writer_guard.as_mut().ok_or(HostError::NotConnected)?;
            self.pending.lock().await.push_back(queued);
            tracing::debug!("issuing {} ({} bytes)", name, encoded.len());
            if let Err(e) = writer.write_all(&encoded).await {
                self.pending.lock().await.pop_back();
                return Err(HostError::Io(e));
            }
            if let Err(e) = writer.flush().await {
                self.pending.lock().await.pop_back();
                return Err(HostError::Io(e));
            }
        }

        let timeout_ms = self.config.command_timeout.as_millis() as u64;
        let mut last = None;
        for rx in receivers {
            let resolved = tokio::time::timeout(self.config.command_timeout, rx)
                .await
                .map_err(|_| {
                    tracing::debug!("{} timed out after {} ms", name, timeout_ms);
                    HostError::Timeout {
                        command: name,
                        timeout_ms,
                    }
                })?
                .map_err(|_| HostError::ConnectionClosed)?;
            last = Some(resolved?);
        }
        last.ok_or(HostError::UnexpectedReply { command: name })
    }

    /// Reads transport chunks and dispatches reassembled frames.
    async fn read_loop(&self) -> Result<(), HostError> {
        tracing::debug!("read loop started");
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let read_result = {
                let mut reader_guard = self.reader.lock().await;
                match reader_guard.as_mut() {
                    Some(reader) => reader.read(&mut buf).await,
                    // close() took the reader
                    None => return Ok(()),
                }
            };

            let n = match read_result {
                Ok(0) => {
                    tracing::debug!("transport closed by peer");
                    self.connected.store(false, Ordering::SeqCst);
                    self.fail_pending().await;
                    return Err(HostError::ConnectionClosed);
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!("transport read failed: {}", e);
                    self.connected.store(false, Ordering::SeqCst);
                    self.fail_pending().await;
                    return Err(HostError::Io(e));
                }
            };

            let frames = self.reassembler.lock().await.feed(&buf[..n]);
            for frame in frames {
                tracing::trace!("frame {:02X?}", frame.as_bytes());
                match self.config.classifier.classify(&frame) {
                    FrameKind::CommandResponse => self.dispatch_response(frame).await,
                    FrameKind::Event => self.dispatch_event(frame).await,
                }
            }
        }
    }

    /// Correlates a response-classified frame with the head of the queue.
    async fn dispatch_response(&self, frame: Frame) {
        let mut pending = self.pending.lock().await;
        loop {
            let Some(front) = pending.front_mut() else {
                drop(pending);
                self.note_unsolicited(&frame);
                return;
            };
            let Some(stage) = front.stages.front() else {
                // entries are popped with their last stage; an empty one
                // here is stale
                pending.pop_front();
                continue;
            };

            // A closed resolver means the waiter timed out and gave up;
            // the entry stays queued so its reply, if it ever arrives, is
            // consumed here instead of mis-correlating with a later
            // command.
            let abandoned = stage.resolver.is_closed();

            match stage.expected.check(&frame) {
                PrefixCheck::Match { payload_start } => {
                    let name = front.name;
                    if let Some(stage) = front.stages.pop_front() {
                        let reply = StageReply {
                            frame,
                            payload_start,
                        };
                        if stage.resolver.send(Ok(reply)).is_err() {
                            tracing::warn!("discarding late {} response", name);
                        }
                    }
                    if front.stages.is_empty() {
                        pending.pop_front();
                    }
                    return;
                }
                PrefixCheck::Status(status) => {
                    // The frame is the reply; the device rejected the
                    // command. The whole command completes.
                    if let Some(mut entry) = pending.pop_front() {
                        let status = StatusCode::from_byte(status);
                        tracing::debug!("{} failed with {}", entry.name, status);
                        if let Some(stage) = entry.stages.pop_front() {
                            let err = HostError::Status {
                                command: entry.name,
                                status,
                            };
                            if stage.resolver.send(Err(err)).is_err() {
                                tracing::warn!(
                                    "discarding late {} error status {}",
                                    entry.name,
                                    status
                                );
                            }
                        }
                    }
                    return;
                }
                PrefixCheck::Mismatch => {
                    if abandoned {
                        let name = front.name;
                        pending.pop_front();
                        tracing::debug!("dropping abandoned {} command", name);
                        // re-match the frame against the next entry
                        continue;
                    }
                    // The head stage owns this frame even though it does
                    // not match; the command fails and completes.
                    if let Some(mut entry) = pending.pop_front() {
                        if let Some(stage) = entry.stages.pop_front() {
                            tracing::warn!(
                                "{} response mismatch: expected {:02X?}, got {:02X?}",
                                entry.name,
                                stage.expected.expected_bytes(),
                                frame.as_bytes()
                            );
                            let err = HostError::PrefixMismatch {
                                command: entry.name,
                                expected: stage.expected.expected_bytes().to_vec(),
                                frame: frame.as_bytes().to_vec(),
                            };
                            let _ = stage.resolver.send(Err(err));
                        }
                    }
                    return;
                }
            }
        }
    }

    /// Fans an event out to subscribers, giving an event-completing head
    /// stage first look.
    async fn dispatch_event(&self, frame: Frame) {
        let event = Event::decode(&frame);

        {
            let mut pending = self.pending.lock().await;
            if let Some(front) = pending.front_mut() {
                let check = front
                    .stages
                    .front()
                    .filter(|stage| stage.expected.is_event_completion())
                    .map(|stage| stage.expected.check(&frame));
                if let Some(PrefixCheck::Match { payload_start }) = check {
                    let name = front.name;
                    if let Some(stage) = front.stages.pop_front() {
                        let reply = StageReply {
                            frame: frame.clone(),
                            payload_start,
                        };
                        if stage.resolver.send(Ok(reply)).is_err() {
                            tracing::warn!("discarding late {} completion event", name);
                        }
                    }
                    if front.stages.is_empty() {
                        pending.pop_front();
                    }
                }
            }
        }

        tracing::debug!("event {}", event.name());
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn note_unsolicited(&self, frame: &Frame) {
        let total = self.unsolicited.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            "unsolicited response {:02X?} (total {})",
            frame.as_bytes(),
            total
        );
    }

    /// Drops every pending command; waiters observe the closed channel.
    async fn fail_pending(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::debug!("failing {} pending commands", pending.len());
        }
        pending.clear();
    }

    /// Returns whether the connection is up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), HostError> {
        tracing::debug!("closing connection");

        // Stop new commands first
        self.connected.store(false, Ordering::SeqCst);

        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let _ = self.reader.lock().await.take();

        self.fail_pending().await;

        tracing::debug!("connection closed");
        Ok(())
    }

    /// Number of commands awaiting responses.
    pub fn pending_count(&self) -> usize {
        self.pending.try_lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Number of response-classified frames that arrived with nothing
    /// pending.
    pub fn unsolicited_count(&self) -> u64 {
        self.unsolicited.load(Ordering::Relaxed)
    }
}
