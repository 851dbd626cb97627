use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::{ConnectionTracker, NetError, TlsPolicy};
use gale_instruments::{report_operation, OperationRecord, Reporter};

use crate::https::{self, HttpsResponse};
use crate::tcp::TcpConnection;
use crate::tls::TlsConnector;

/// Opens instrumented connections for a run.
///
/// Build one per run and clone it into each virtual user. Clones share the reporter, the
/// connection tracker and the TLS configuration.
#[derive(Debug, Clone)]
pub struct NetClient {
    reporter: Arc<Reporter>,
    tracker: Arc<ConnectionTracker>,
    io_timeout: Duration,
    tls: TlsConnector,
}

impl NetClient {
    pub fn new(
        reporter: Arc<Reporter>,
        tracker: Arc<ConnectionTracker>,
        io_timeout: Duration,
        tls_policy: &TlsPolicy,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            reporter,
            tracker,
            io_timeout,
            tls: TlsConnector::new(tls_policy)?,
        })
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Open a TCP connection to `address`, given as `host:port`.
    pub async fn connect_tcp(&self, address: &str) -> Result<TcpConnection, NetError> {
        let address = address.strip_prefix("tcp://").unwrap_or(address);
        TcpConnection::connect(
            address,
            self.io_timeout,
            &self.tracker,
            self.reporter.clone(),
        )
        .await
    }

    /// Fetch `url` over HTTPS, constrained by the run's TLS policy.
    pub async fn https_get(&self, url: &str) -> Result<HttpsResponse, NetError> {
        let operation_record = OperationRecord::new("https_get");
        let result = https::get(url, &self.tls, self.io_timeout, &self.tracker).await;
        report_operation(&self.reporter, operation_record, &result);

        result
    }
}
