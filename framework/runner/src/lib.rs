mod cli;
mod context;
mod definition;
mod executor;
mod options;
mod progress;
mod run;
mod shutdown;
mod types;

pub use cli::parse_tls_version;

pub mod prelude {
    pub use crate::cli::{GaleScenarioCli, ReporterOpt};
    pub use crate::context::{AgentContext, RunPhase, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::options::{ConfigError, RunOptions};
    pub use crate::run::run;
    pub use crate::types::GaleResult;

    pub use gale_core::prelude::{
        AgentBailError, CipherSuites, ConnectionTracker, NetError, ShutdownSignalError,
        TlsPolicy, TlsVersion,
    };
    pub use gale_instruments::{CheckCounts, CheckRecorder, Reporter};
    pub use gale_summary_model::RunSummary;
}
