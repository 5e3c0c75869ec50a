use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Reconnecting WebSocket client delivering raw text frames to a [`pool::WorkerPool`].
pub mod client;

/// Exponential reconnect delay.
pub mod backoff;

/// Bounded queue drained by a fixed number of worker tasks.
pub mod pool;

/// Idle read timeout stream wrapper.
pub mod timeout;

/// Default connect timeout for one WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default initial reconnect delay.
pub const DEFAULT_RECONNECT_INITIAL: Duration = Duration::from_secs(5);

/// Default upper bound of the reconnect delay.
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(60);

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// One text frame read from the transport.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RawMessage {
    /// Position of the frame in read order, strictly increasing over the client lifetime.
    pub sequence: u64,
    pub payload: String,
}

/// Processes [`RawMessage`]s on the worker pool.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: RawMessage);
}

/// Connection, keepalive and worker pool parameters of a [`client::StreamingClient`].
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub url: Url,
    pub ping_interval: Duration,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl StreamConfig {
    /// Binance defaults for the given combined stream `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ping_interval: crate::exchange::binance::PING_INTERVAL_BINANCE,
            read_timeout: timeout::DEFAULT_WS_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_initial: DEFAULT_RECONNECT_INITIAL,
            reconnect_max: DEFAULT_RECONNECT_MAX,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
