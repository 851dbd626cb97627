mod checks;
mod report;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use checks::{CheckContext, CheckRecorder, CheckResult};
pub use gale_summary_model::CheckCounts;
pub use report::{ReportCollector, ReportConfig, Reporter};

/// Timing for a single network operation, such as a TCP read or an HTTPS request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// How long the operation took, once it has finished.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Finish the operation with the outcome of `response` and hand it to the reporter.
pub fn report_operation<T, E>(
    reporter: &Arc<Reporter>,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response.is_err());
    reporter.add_operation(&operation_record);
}
