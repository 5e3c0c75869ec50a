use super::{
    MessageHandler, RawMessage, StreamConfig, backoff::ReconnectBackoff, pool::WorkerPool,
    timeout::TimeoutStream,
};
use crate::error::DataError;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent, self-healing WebSocket connection feeding a [`WorkerPool`].
///
/// Every text frame is stamped with a sequence number and submitted to the pool in read
/// order. Connect failures, socket errors, idle timeouts and server closures all lead to a
/// reconnect after the current [`ReconnectBackoff`] delay; only [`Self::stop`] ends the loop.
pub struct StreamingClient {
    config: StreamConfig,
    handler: Arc<dyn MessageHandler>,
    sequence: Arc<AtomicU64>,
    session: Mutex<Option<Session>>,
}

struct Session {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Why a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Ended,
    Error(DataError),
}

impl StreamingClient {
    pub fn new(config: StreamConfig, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            config,
            handler,
            sequence: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(None),
        }
    }

    /// Spawn the connection loop and return immediately. No-op if a session is running.
    pub fn start(&self) {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|session| !session.handle.is_finished()) {
            debug!(url = %self.config.url, "streaming client already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(
            self.config.clone(),
            Arc::clone(&self.handler),
            Arc::clone(&self.sequence),
            shutdown_rx,
        ));

        *session = Some(Session {
            shutdown_tx,
            handle,
        });
    }

    /// Signal shutdown and wait until the connection is released and the worker pool has
    /// handled every message read before the signal. No-op if nothing is running.
    pub async fn stop(&self) {
        let session = self.session.lock().take();
        let Some(Session {
            shutdown_tx,
            handle,
        }) = session
        else {
            return;
        };

        let _ = shutdown_tx.send(true);
        if let Err(error) = handle.await {
            warn!(%error, "streaming client task failed");
        }
    }

    pub async fn restart(&self) {
        self.stop().await;
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Sequence number of the last frame read, 0 if none yet.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("url", &self.config.url.as_str())
            .field("last_sequence", &self.last_sequence())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Resolves once shutdown is signalled or the signalling side is gone.
async fn stopped(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn run(
    config: StreamConfig,
    handler: Arc<dyn MessageHandler>,
    sequence: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let pool = WorkerPool::spawn(handler, config.workers, config.queue_capacity);
    let mut backoff = ReconnectBackoff::new(config.reconnect_initial, config.reconnect_max);

    info!(url = %config.url, workers = config.workers, "starting streaming client");

    loop {
        let connected = tokio::select! {
            biased;
            _ = stopped(&mut shutdown_rx) => break,
            connected = connect(&config) => connected,
        };

        match connected {
            Ok(websocket) => {
                info!(url = %config.url, "connected to stream");
                backoff.reset();

                match run_session(websocket, &config, &pool, &sequence, &mut shutdown_rx).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Ended => info!(url = %config.url, "stream ended"),
                    SessionEnd::Error(error) => {
                        warn!(url = %config.url, %error, transport = error.is_transport(), "stream failed")
                    }
                }
            }
            Err(error) => warn!(%error, "failed to connect to stream"),
        }

        let delay = backoff.on_failure();
        info!(delay_secs = delay.as_secs_f64(), "reconnecting after delay");

        tokio::select! {
            biased;
            _ = stopped(&mut shutdown_rx) => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    pool.shutdown().await;
    info!(url = %config.url, "streaming client stopped");
}

async fn connect(config: &StreamConfig) -> Result<WsStream, DataError> {
    let url = config.url.as_str();
    match tokio::time::timeout(config.connect_timeout, connect_async(url)).await {
        Ok(Ok((websocket, _response))) => Ok(websocket),
        Ok(Err(error)) => Err(DataError::Connect {
            url: url.to_string(),
            reason: error.to_string(),
        }),
        Err(_elapsed) => Err(DataError::Connect {
            url: url.to_string(),
            reason: format!("timed out after {:?}", config.connect_timeout),
        }),
    }
}

/// Drive one connection: a keepalive ping task owning the write half, and the read loop
/// owning the read half. Whichever way the read loop ends, the ping task is stopped before
/// returning.
async fn run_session(
    websocket: WsStream,
    config: &StreamConfig,
    pool: &WorkerPool,
    sequence: &AtomicU64,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, read) = websocket.split();

    let ping_interval = config.ping_interval;
    let (ping_shutdown_tx, mut ping_shutdown_rx) = mpsc::channel::<()>(1);

    let ping_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(ping_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = write.send(Message::Ping(vec![].into())).await {
                        debug!(%error, "failed to send ping, connection likely dead");
                        break;
                    }
                }
                _ = ping_shutdown_rx.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut read = TimeoutStream::new(read, config.read_timeout);

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = stopped(shutdown_rx) => break SessionEnd::Shutdown,
            next = read.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                let message = RawMessage {
                    sequence: sequence.fetch_add(1, Ordering::SeqCst) + 1,
                    payload: text.as_str().to_owned(),
                };
                if let Err(error) = pool.submit(message).await {
                    break SessionEnd::Error(error);
                }
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "server closed connection");
                break SessionEnd::Ended;
            }
            Some(Ok(_)) => {
                // Ping/Pong are answered by tungstenite, binary frames are not used
            }
            Some(Err(error)) => break SessionEnd::Error(DataError::from(error)),
            None => break SessionEnd::Ended,
        }
    };

    let _ = ping_shutdown_tx.send(()).await;
    if let Err(error) = ping_task.await {
        warn!(%error, "ping task failed");
    }

    end
}
