use std::future::Future;
use std::time::Duration;

use gale_core::prelude::NetError;

/// Bound a single I/O operation by the run's I/O timeout.
pub(crate) async fn within<T, E>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, NetError>
where
    E: Into<NetError>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(NetError::Timeout { operation, after }),
    }
}
