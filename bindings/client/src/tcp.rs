use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use gale_core::prelude::{ConnectionToken, ConnectionTracker, NetError};
use gale_instruments::{report_operation, OperationRecord, Reporter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::timeout::within;

#[cfg(windows)]
pub const LINE_TERMINATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_TERMINATOR: &str = "\n";

/// A TCP connection owned by a single virtual user.
///
/// Any failed read or write closes the connection. Later operations fail with
/// [NetError::closed] until the virtual user opens a new one.
#[derive(Debug)]
pub struct TcpConnection {
    address: String,
    open: Option<OpenStream>,
    io_timeout: Duration,
    reporter: Arc<Reporter>,
}

#[derive(Debug)]
struct OpenStream {
    stream: TcpStream,
    // Dropped together with the stream.
    _token: ConnectionToken,
}

impl TcpConnection {
    pub(crate) async fn connect(
        address: &str,
        io_timeout: Duration,
        tracker: &Arc<ConnectionTracker>,
        reporter: Arc<Reporter>,
    ) -> Result<Self, NetError> {
        let operation_record = OperationRecord::new("tcp_connect");
        let result = within("connect", io_timeout, async {
            TcpStream::connect(address)
                .await
                .map_err(|source| NetError::Connect {
                    address: address.to_string(),
                    source,
                })
        })
        .await;
        report_operation(&reporter, operation_record, &result);

        let stream = result?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Could not disable Nagle's algorithm for {address}: {e}");
        }
        log::debug!("Connected to {address}");

        Ok(Self {
            address: address.to_string(),
            open: Some(OpenStream {
                stream,
                _token: tracker.track(),
            }),
            io_timeout,
            reporter,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Write `text` followed by [LINE_TERMINATOR].
    pub async fn write_line(&mut self, text: &str) -> Result<(), NetError> {
        let operation_record = OperationRecord::new("tcp_write_line");

        let mut line = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.push_str(text);
        line.push_str(LINE_TERMINATOR);

        let result = match self.open.as_mut() {
            Some(open) => {
                within("write", self.io_timeout, async {
                    open.stream.write_all(line.as_bytes()).await?;
                    open.stream.flush().await
                })
                .await
            }
            None => Err(NetError::closed()),
        };

        self.close_on_error(&result);
        report_operation(&self.reporter, operation_record, &result);

        result
    }

    /// Read whatever the peer has sent, up to `max_bytes`.
    ///
    /// Returns as soon as some data is available, so the result may be shorter than `max_bytes`
    /// even if the peer sent more. A read of zero bytes means the peer closed the connection and
    /// is returned as an error.
    pub async fn read_up_to(&mut self, max_bytes: usize) -> Result<Bytes, NetError> {
        let operation_record = OperationRecord::new("tcp_read");

        let result = match self.open.as_mut() {
            Some(open) => {
                let mut buf = BytesMut::zeroed(max_bytes);
                let read = within("read", self.io_timeout, open.stream.read(&mut buf)).await;
                match read {
                    Ok(0) if max_bytes > 0 => Err(NetError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    ))),
                    Ok(n) => {
                        buf.truncate(n);
                        Ok(buf.freeze())
                    }
                    Err(e) => Err(e),
                }
            }
            None => Err(NetError::closed()),
        };

        self.close_on_error(&result);
        report_operation(&self.reporter, operation_record, &result);

        result
    }

    /// Release the socket. Safe to call more than once, and after a failure.
    pub fn close(&mut self) {
        if self.open.take().is_some() {
            log::debug!("Closed connection to {}", self.address);
        }
    }

    fn close_on_error<T>(&mut self, result: &Result<T, NetError>) {
        if let Err(e) = result {
            log::debug!("Closing connection to {} after error: {e}", self.address);
            self.close();
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
