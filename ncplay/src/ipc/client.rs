//! Request/response correlation over the backend control connection
//!
//! One connection carries any number of in-flight requests. Each request gets
//! a fresh id and its own deadline; replies are matched by id, never by
//! arrival order. A background reader task splits the byte stream into lines,
//! completes waiting callers, and fans unsolicited events out on a broadcast
//! channel.

use crate::error::{Error, Result};
use crate::ipc::endpoint::{self, IpcStream};
use crate::ipc::protocol::{self, BackendEvent, Inbound};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Request ids are unique across every connection this process opens
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Events buffered per subscriber before the slowest one starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 64;

type Reply = std::result::Result<Value, String>;
type Waiter = oneshot::Sender<Reply>;

/// In-flight requests keyed by request id
#[derive(Default)]
struct PendingTable {
    /// Set once the connection is gone; no new waiters are admitted after that
    closed: bool,
    waiters: HashMap<u64, Waiter>,
}

struct Shared {
    writer: tokio::sync::Mutex<WriteHalf<Box<dyn IpcStream>>>,
    pending: Mutex<PendingTable>,
    timeout: Duration,
    /// Dropped on close so subscribers see the stream end
    events: Mutex<Option<broadcast::Sender<BackendEvent>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events(&self) -> MutexGuard<'_, Option<broadcast::Sender<BackendEvent>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forget(&self, request_id: u64) {
        self.pending().waiters.remove(&request_id);
    }

    /// Mark the connection closed and fail every outstanding request.
    ///
    /// Dropping the senders wakes each waiter with a receive error, which
    /// surfaces as `ConnectionClosed`.
    fn close(&self) {
        self.events().take();

        let mut pending = self.pending();
        pending.closed = true;
        let abandoned = pending.waiters.len();
        pending.waiters.clear();
        if abandoned > 0 {
            debug!("Connection closed with {} request(s) outstanding", abandoned);
        }
    }

    fn dispatch(&self, line: &[u8]) {
        match protocol::decode_line(line) {
            Some(Inbound::Reply { request_id, outcome }) => {
                let waiter = self.pending().waiters.remove(&request_id);
                match waiter {
                    Some(tx) => {
                        // Receiver may have just timed out; nothing to do then
                        let _ = tx.send(outcome);
                    }
                    None => debug!("Discarding reply for unknown or abandoned request_id {}", request_id),
                }
            }
            Some(Inbound::Event(event)) => {
                debug!(event = %event.name, "Backend event");
                if let Some(tx) = self.events().as_ref() {
                    // No subscribers is fine
                    let _ = tx.send(event);
                }
            }
            None => {
                let text = String::from_utf8_lossy(line);
                if !text.trim().is_empty() {
                    debug!("Dropping unroutable line from backend: {}", text.trim());
                }
            }
        }
    }

    async fn write_line(&self, line: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(line).await?;
            writer.flush().await
        }
        .await;

        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::NotConnected => Error::ConnectionClosed,
            _ => Error::Io(e),
        })
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}

/// Handle to a backend control connection.
///
/// Cloning is cheap; all clones share the connection, the id counter and the
/// correlation table.
#[derive(Clone)]
pub struct IpcClient {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for IpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcClient")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .field("timeout", &self.shared.timeout)
            .finish()
    }
}

impl IpcClient {
    /// Connect to the control endpoint.
    ///
    /// Fails with `BackendNotRunning` when nothing listens at `endpoint`, and
    /// with `ConnectionFailed` for any other connection problem.
    pub async fn connect(endpoint: &Path, timeout: Duration) -> Result<Self> {
        let stream = endpoint::connect(endpoint).await?;
        debug!("Connected to backend at {}", endpoint.display());
        Ok(Self::from_stream(stream, timeout))
    }

    /// Drive an already-open byte stream. Must be called inside a tokio runtime.
    pub fn from_stream<S: IpcStream>(stream: S, timeout: Duration) -> Self {
        let boxed: Box<dyn IpcStream> = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(write_half),
            pending: Mutex::new(PendingTable::default()),
            timeout,
            events: Mutex::new(Some(events)),
            reader: Mutex::new(None),
        });

        let handle = tokio::spawn(read_loop(read_half, Arc::downgrade(&shared)));
        *shared.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Self { shared }
    }

    /// Send `[name, ...args]` and wait for the matching reply.
    ///
    /// Resolves with the reply's `data` field. Rejects with
    /// `BackendReportedError` when the reply carries a non-success error,
    /// `RequestTimeout` when no reply arrives within the deadline, and
    /// `ConnectionClosed` when the connection drops first. The request is
    /// removed from the correlation table on every path, so a late reply is
    /// discarded by the reader.
    pub async fn send_command(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let line = protocol::encode_request(name, &args, request_id)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending();
            if pending.closed {
                return Err(Error::ConnectionClosed);
            }
            pending.waiters.insert(request_id, tx);
        }

        debug!(request_id, command = name, "Sending request");

        let exchange = async {
            self.shared.write_line(&line).await?;
            rx.await.map_err(|_| Error::ConnectionClosed)
        };

        match tokio::time::timeout(self.shared.timeout, exchange).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(message))) => Err(Error::BackendReportedError(message)),
            Ok(Err(e)) => {
                self.shared.forget(request_id);
                Err(e)
            }
            Err(_) => {
                self.shared.forget(request_id);
                warn!(request_id, command = name, "Request timed out");
                Err(Error::RequestTimeout {
                    command: name.to_string(),
                    request_id,
                    timeout_ms: self.shared.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Receive every event emitted after this call.
    ///
    /// The receiver reports `Closed` once the connection is gone, immediately
    /// so if it already is.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BackendEvent> {
        match self.shared.events().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// True once the backend hung up or `disconnect` was called
    pub fn is_closed(&self) -> bool {
        self.shared.pending().closed
    }

    /// Number of requests still awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.shared.pending().waiters.len()
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Release the connection. Outstanding requests fail with `ConnectionClosed`.
    pub async fn disconnect(&self) {
        self.shared.close();

        let reader = self.shared.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = reader {
            handle.abort();
        }

        let mut writer = self.shared.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Error shutting down control connection: {}", e);
        }
    }
}

async fn read_loop(read_half: ReadHalf<Box<dyn IpcStream>>, shared: Weak<Shared>) {
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("Backend closed the control connection");
                break;
            }
            Ok(_) => match shared.upgrade() {
                Some(shared) => shared.dispatch(&line),
                None => return,
            },
            Err(e) => {
                warn!("Control connection read failed: {}", e);
                break;
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        shared.close();
    }
}
