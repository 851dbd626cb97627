mod in_memory_reporter;

use std::collections::BTreeMap;

use gale_summary_model::CheckCounts;
use parking_lot::Mutex;

use crate::OperationRecord;

use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector: Send {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Called once at the end of a run with the final check counts.
    fn finalize(&self, checks: &BTreeMap<String, CheckCounts>);
}

/// Choose which collectors receive operation records during a run.
#[derive(Default)]
pub struct ReportConfig {
    enable_in_memory: bool,
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl ReportConfig {
    /// Keep operations in memory and print check and operation tables at the end of the run.
    pub fn enable_in_memory(mut self) -> Self {
        self.enable_in_memory = true;
        self
    }

    pub fn with_collector(mut self, collector: Box<dyn ReportCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors = self.collectors;
        if self.enable_in_memory {
            collectors.push(Box::new(InMemoryReporter::new()));
        }

        Reporter {
            collectors: collectors.into_iter().map(Mutex::new).collect(),
        }
    }
}

/// Fans operation records out to the configured collectors.
///
/// With no collectors configured this is a no-op reporter.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector>>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn finalize(&self, checks: &BTreeMap<String, CheckCounts>) {
        for collector in &self.collectors {
            collector.lock().finalize(checks);
        }
    }
}
