use std::time::Duration;

/// Failures from the network primitives.
///
/// None of these are fatal to a run. The runner counts failed iterations by [NetError::class]
/// and the virtual user moves on to its next iteration, opening a fresh connection if needed.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The TCP connection could not be established: refused, unresolvable or timed out.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading or writing failed, or the connection was already closed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A single operation took longer than the configured I/O timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// No TLS version and cipher suite acceptable to both peers, or the peer certificate was
    /// rejected.
    #[error("TLS negotiation failed: {0}")]
    TlsNegotiation(String),
    /// The HTTP exchange failed after, or instead of, a successful handshake.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl NetError {
    pub fn closed() -> Self {
        NetError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "connection is closed",
        ))
    }

    /// Stable name for this kind of failure, used to group failed iterations.
    pub fn class(&self) -> &'static str {
        match self {
            NetError::Connect { .. } => "connect",
            NetError::Io(_) => "io",
            NetError::Timeout { .. } => "timeout",
            NetError::TlsNegotiation(_) => "tls_negotiation",
            NetError::Http(_) => "http",
        }
    }
}
