mod checks_table;
mod operations_table;

use crate::report::in_memory_reporter::checks_table::CheckRow;
use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::OperationRecord;
use gale_summary_model::CheckCounts;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::Table;

/// A very basic reporter that is useful while developing scenarios. It keeps all of the operations
/// in memory and prints a summary of the checks and operations at the end of the run.
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self {
            operation_records: Vec::new(),
        }
    }

    fn check_rows(checks: &BTreeMap<String, CheckCounts>) -> Vec<CheckRow> {
        checks
            .iter()
            .map(|(name, counts)| CheckRow {
                check: name.clone(),
                passes: counts.passed,
                fails: counts.failed,
                pass_rate: counts.pass_rate(),
            })
            .collect()
    }

    fn operation_rows(&self) -> Vec<OperationRow> {
        self.operation_records
            .iter()
            .fold(
                BTreeMap::<&str, Vec<&OperationRecord>>::new(),
                |mut acc, record| {
                    acc.entry(record.operation_id()).or_default().push(record);
                    acc
                },
            )
            .into_iter()
            .map(|(operation_id, operations)| {
                let total_operations = operations.len();
                let durations_ms = operations
                    .iter()
                    .filter_map(|op| op.duration())
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .collect::<Vec<_>>();
                let success_ms = operations
                    .iter()
                    .filter(|op| !op.is_error())
                    .filter_map(|op| op.duration())
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .collect::<Vec<_>>();

                OperationRow {
                    operation_id: operation_id.to_string(),
                    total_operations,
                    errors: operations.iter().filter(|op| op.is_error()).count(),
                    avg_time_ms: durations_ms.iter().sum::<f64>()
                        / durations_ms.len().max(1) as f64,
                    min_time_ms: success_ms.iter().copied().reduce(f64::min),
                    max_time_ms: success_ms.iter().copied().reduce(f64::max),
                }
            })
            .collect()
    }

    fn print_summary(&self, checks: &BTreeMap<String, CheckCounts>) {
        if !checks.is_empty() {
            println!("\nSummary of checks");
            let mut table = Table::new(Self::check_rows(checks));
            table.with(Style::modern());
            println!("{table}");
        }

        if !self.operation_records.is_empty() {
            println!("\nSummary of operations");
            let mut table = Table::new(self.operation_rows());
            table.with(Style::modern());
            println!("{table}");
        }
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn finalize(&self, checks: &BTreeMap<String, CheckCounts>) {
        self.print_summary(checks);
    }
}
