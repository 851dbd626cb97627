use std::collections::{BTreeMap, HashMap};

/// Passed and failed counts for one named check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub passed: u64,
    pub failed: u64,
}

impl CheckCounts {
    pub fn add(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    /// Fraction of evaluations that passed, or `None` if the check never ran.
    pub fn pass_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.passed as f64 / total as f64),
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner unless one is passed on the command line.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The duration that the run was configured with, in seconds
    pub run_duration: u64,
    /// The number of virtual users started
    pub virtual_users: usize,
    /// The number of virtual users still running their behaviour when the run ended
    ///
    /// Virtual users that fail their setup or bail are not counted.
    pub virtual_user_end_count: usize,
    /// Iterations that ran to completion, successful or not
    pub iterations: u64,
    /// Iterations that returned an error, keyed by the class of error
    pub failed_iterations: BTreeMap<String, u64>,
    /// Passed and failed counts for every check, keyed by check name
    pub checks: BTreeMap<String, CheckCounts>,
    /// Connections opened during the run
    pub connections_opened: u64,
    /// Connections closed during the run
    pub connections_closed: u64,
    /// Settings that shaped the run, such as the TLS policy and pacing
    pub settings: HashMap<String, String>,
    /// The version of Gale that was used for this run
    pub gale_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration: u64,
        virtual_users: usize,
        gale_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration,
            virtual_users,
            virtual_user_end_count: 0,
            iterations: 0,
            failed_iterations: BTreeMap::new(),
            checks: BTreeMap::new(),
            connections_opened: 0,
            connections_closed: 0,
            settings: HashMap::with_capacity(0),
            gale_version,
        }
    }

    /// Add a setting
    pub fn add_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Connections that were never closed. Zero for every run that ended cleanly.
    pub fn open_connections(&self) -> u64 {
        self.connections_opened
            .saturating_sub(self.connections_closed)
    }

    /// Total number of failed iterations across all error classes
    pub fn total_failed_iterations(&self) -> u64 {
        self.failed_iterations.values().sum()
    }
}
