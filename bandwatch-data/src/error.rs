use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `bandwatch-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("SocketError: {0}")]
    Socket(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to deserialise payload: {error}, payload: {payload}")]
    Deserialise { error: String, payload: String },

    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("unsupported kline interval: {0}")]
    UnsupportedInterval(String),

    #[error("invalid kline: {0}")]
    InvalidKline(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("update consumer is closed")]
    ConsumerClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DataError {
    /// Determine if an error originates from the streaming connection itself, and
    /// is therefore resolved by the reconnect loop rather than by dropping a message.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transport(&self) -> bool {
        match self {
            DataError::Socket(_) | DataError::Connect { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn deserialise(error: serde_json::Error, payload: &str) -> Self {
        const MAX_PAYLOAD_CHARS: usize = 256;
        Self::Deserialise {
            error: error.to_string(),
            payload: payload.chars().take(MAX_PAYLOAD_CHARS).collect(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite;

    #[test]
    fn test_data_error_is_transport() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: closed socket is a transport error
                input: DataError::from(tungstenite::Error::ConnectionClosed),
                expected: true,
            },
            TestCase {
                // TC1: failed connection attempt is a transport error
                input: DataError::Connect {
                    url: "wss://fstream.binance.com/stream".to_string(),
                    reason: "connection refused".to_string(),
                },
                expected: true,
            },
            TestCase {
                // TC2: unsupported message type is dropped, not reconnected
                input: DataError::UnsupportedMessageType("24hrTicker".to_string()),
                expected: false,
            },
            TestCase {
                // TC3: malformed kline is a parse error
                input: DataError::InvalidKline("missing close".to_string()),
                expected: false,
            },
            TestCase {
                // TC4: backfill request failure is reported, not reconnected
                input: DataError::Http("HTTP error: 429 Too Many Requests".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_transport();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_deserialise_error_truncates_payload() {
        let payload = "x".repeat(1_000);
        let error = serde_json::from_str::<serde_json::Value>(&payload).unwrap_err();

        match DataError::deserialise(error, &payload) {
            DataError::Deserialise { payload, .. } => assert_eq!(payload.len(), 256),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
