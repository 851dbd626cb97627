use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gale_core::prelude::{ConnectionTracker, NetError, TlsVersion};
use http_body_util::{BodyExt, Empty, Limited};
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, CONNECTION, HOST, USER_AGENT};
use hyper::{HeaderMap, Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use url::Url;

use crate::timeout::within;
use crate::tls::{negotiated, NegotiatedTls, TlsConnector};

/// Responses with a larger body are rejected.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// The outcome of a single HTTPS request, including what the TLS handshake negotiated.
#[derive(Debug, Clone)]
pub struct HttpsResponse {
    pub status: u16,
    pub tls: NegotiatedTls,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpsResponse {
    pub fn tls_version(&self) -> Option<TlsVersion> {
        self.tls.version
    }

    pub fn cipher_suite(&self) -> Option<&str> {
        self.tls.cipher_suite.as_deref()
    }

    /// First header with this name, ignoring case. `None` if the value is not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Issue a `GET` over a fresh TLS connection that is closed before this returns.
pub(crate) async fn get(
    url: &str,
    connector: &TlsConnector,
    io_timeout: Duration,
    tracker: &Arc<ConnectionTracker>,
) -> Result<HttpsResponse, NetError> {
    let url = Url::parse(url).map_err(|e| NetError::Http(format!("invalid URL {url}: {e}")))?;
    if url.scheme() != "https" {
        return Err(NetError::Http(format!(
            "unsupported scheme [{}], only https is supported",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| NetError::Http(format!("no host in URL {url}")))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(443);
    let address = format!("{host}:{port}");
    let request = build_request(&url, &host)?;

    let stream = within("connect", io_timeout, async {
        TcpStream::connect(address.as_str())
            .await
            .map_err(|source| NetError::Connect {
                address: address.clone(),
                source,
            })
    })
    .await?;
    let _token = tracker.track();

    let stream = within(
        "tls_handshake",
        io_timeout,
        connector.handshake(host.trim_start_matches('[').trim_end_matches(']'), stream),
    )
    .await?;
    let tls = negotiated(stream.ssl());
    log::debug!(
        "Negotiated {:?} with {:?} for {address}",
        tls.version,
        tls.cipher_suite
    );

    let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(http_error)?;
    // Drives the socket until the response is consumed, then shuts the TLS stream down.
    let mut connection = tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::trace!("HTTP connection ended with an error: {e}");
        }
    });

    let exchange = async {
        let response = within("read_head", io_timeout, async {
            sender.send_request(request).await.map_err(http_error)
        })
        .await?;
        let (parts, body) = response.into_parts();
        let body = within("read_body", io_timeout, async {
            Limited::new(body, MAX_BODY_BYTES)
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|e| NetError::Http(format!("failed to read response body: {e}")))
        })
        .await?;

        Ok::<_, NetError>(HttpsResponse {
            status: parts.status.as_u16(),
            tls,
            headers: parts.headers,
            body,
        })
    };
    let result = exchange.await;

    let closed = match &result {
        Ok(_) => match within("shutdown", io_timeout, async {
            (&mut connection).await.map_err(std::io::Error::other)
        })
        .await
        {
            Err(NetError::Timeout { .. }) => {
                log::trace!("TLS shutdown for {address} did not complete in time");
                false
            }
            _ => true,
        },
        Err(_) => false,
    };
    if !closed {
        connection.abort();
        // The socket is dropped with the task.
        let _ = connection.await;
    }

    result
}

fn build_request(url: &Url, host: &str) -> Result<Request<Empty<Bytes>>, NetError> {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Request::builder()
        .method(Method::GET)
        .uri(target)
        .header(HOST, host_header)
        .header(USER_AGENT, concat!("gale/", env!("CARGO_PKG_VERSION")))
        .header(ACCEPT, "*/*")
        .header(CONNECTION, "close")
        .body(Empty::new())
        .map_err(|e| NetError::Http(format!("invalid request for {url}: {e}")))
}

fn http_error(e: hyper::Error) -> NetError {
    NetError::Http(format!("HTTP exchange failed: {e}"))
}
