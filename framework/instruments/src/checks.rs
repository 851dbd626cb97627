use std::collections::BTreeMap;

use gale_summary_model::CheckCounts;
use parking_lot::Mutex;

/// Where a check was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckContext {
    pub virtual_user_id: usize,
    pub iteration: u64,
}

/// The outcome of evaluating one named check once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub iteration: u64,
    pub virtual_user_id: usize,
}

/// Shared, append-only log of check results and iteration outcomes for a run.
///
/// Every virtual user appends to the same recorder. The lock is held only to push onto the log,
/// never while doing I/O.
#[derive(Debug, Default)]
pub struct CheckRecorder {
    checks: Mutex<Vec<CheckResult>>,
    iterations: Mutex<IterationLog>,
}

#[derive(Debug, Default)]
struct IterationLog {
    completed: u64,
    failed: BTreeMap<String, u64>,
}

impl CheckRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, passed: bool, context: CheckContext) {
        let result = CheckResult {
            name: name.to_string(),
            passed,
            iteration: context.iteration,
            virtual_user_id: context.virtual_user_id,
        };
        self.checks.lock().push(result);
    }

    /// Record that an iteration ran to completion, with the class of error if it failed.
    pub fn record_iteration(&self, failure: Option<&str>) {
        let mut log = self.iterations.lock();
        log.completed += 1;
        if let Some(class) = failure {
            *log.failed.entry(class.to_string()).or_default() += 1;
        }
    }

    /// Snapshot of every check result recorded so far.
    pub fn results(&self) -> Vec<CheckResult> {
        self.checks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.checks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.lock().completed
    }

    pub fn failed_iterations(&self) -> BTreeMap<String, u64> {
        self.iterations.lock().failed.clone()
    }

    /// Passed and failed counts per check name.
    ///
    /// Meant to be called once every virtual user has stopped. Results recorded while this runs
    /// may or may not be included.
    pub fn summarize(&self) -> BTreeMap<String, CheckCounts> {
        self.checks
            .lock()
            .iter()
            .fold(BTreeMap::new(), |mut acc, result| {
                acc.entry(result.name.clone())
                    .or_insert_with(CheckCounts::default)
                    .add(result.passed);
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx(virtual_user_id: usize, iteration: u64) -> CheckContext {
        CheckContext {
            virtual_user_id,
            iteration,
        }
    }

    #[test]
    fn summarize_partitions_by_name() {
        let recorder = CheckRecorder::new();
        recorder.record("is TLSv1.2", true, ctx(0, 0));
        recorder.record("is sha256 cipher suite", false, ctx(0, 0));
        recorder.record("is TLSv1.2", false, ctx(1, 0));
        recorder.record("is TLSv1.2", true, ctx(0, 1));

        let summary = recorder.summarize();

        assert_eq!(
            CheckCounts {
                passed: 2,
                failed: 1
            },
            summary["is TLSv1.2"]
        );
        assert_eq!(
            CheckCounts {
                passed: 0,
                failed: 1
            },
            summary["is sha256 cipher suite"]
        );
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let recorder = Arc::new(CheckRecorder::new());

        let handles = (0..8)
            .map(|vu| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        recorder.record("verify ag tag", i % 2 == 0, ctx(vu, i));
                        recorder.record_iteration(None);
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        let counts = recorder.summarize()["verify ag tag"];
        assert_eq!(4000, counts.total());
        assert_eq!(2000, counts.passed);
        assert_eq!(4000, recorder.iterations());
    }

    #[test]
    fn iterations_per_virtual_user_stay_ordered() {
        let recorder = Arc::new(CheckRecorder::new());

        let handles = (0..4)
            .map(|vu| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        recorder.record("check", true, ctx(vu, i));
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        let results = recorder.results();
        for vu in 0..4 {
            let iterations = results
                .iter()
                .filter(|r| r.virtual_user_id == vu)
                .map(|r| r.iteration)
                .collect::<Vec<_>>();
            assert_eq!((0..100).collect::<Vec<_>>(), iterations);
        }
    }

    #[test]
    fn failed_iterations_grouped_by_class() {
        let recorder = CheckRecorder::new();
        recorder.record_iteration(None);
        recorder.record_iteration(Some("timeout"));
        recorder.record_iteration(Some("connect"));
        recorder.record_iteration(Some("timeout"));

        assert_eq!(4, recorder.iterations());
        assert_eq!(
            BTreeMap::from([("connect".to_string(), 1), ("timeout".to_string(), 2)]),
            recorder.failed_iterations()
        );
    }
}
