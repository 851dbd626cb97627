use std::collections::BTreeSet;
use std::time::Duration;

use gale_core::prelude::{CipherSuites, TlsPolicy};

use crate::cli::{GaleScenarioCli, ReporterOpt};

/// The run configuration is invalid. Returned before any virtual user is started.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ConfigError {
    msg: String,
}

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Everything that shapes a run. Fixed once the run has started.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub virtual_users: usize,
    pub duration: Duration,
    /// Per virtual user iteration cap.
    pub iterations: Option<u64>,
    /// Delay between two iterations of the same virtual user.
    pub pacing: Option<Duration>,
    /// Bound on each connect, read, write and TLS handshake.
    pub io_timeout: Duration,
    pub tls: TlsPolicy,
    pub target: Option<String>,
    pub run_id: String,
    pub no_progress: bool,
    pub reporter: ReporterOpt,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.virtual_users == 0 {
            return Err(ConfigError::new("At least one virtual user is required"));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::new("The run duration must be greater than zero"));
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::new(
                "The iteration cap must be greater than zero",
            ));
        }
        if self.io_timeout.is_zero() {
            return Err(ConfigError::new("The I/O timeout must be greater than zero"));
        }
        self.tls
            .validate()
            .map_err(|e| ConfigError::new(format!("Invalid TLS policy: {e}")))?;

        Ok(())
    }
}

/// Values a scenario provides in code, used wherever the command line is silent.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScenarioDefaults {
    pub target: Option<String>,
    pub duration_s: Option<u64>,
    pub pacing: Option<Duration>,
    pub tls: TlsPolicy,
}

/// Merge the command line over the scenario defaults and validate the result.
pub(crate) fn resolve_options(
    cli: &GaleScenarioCli,
    defaults: &ScenarioDefaults,
) -> Result<RunOptions, ConfigError> {
    let duration_s = cli.duration.or(defaults.duration_s).ok_or_else(|| {
        ConfigError::new("No duration configured, pass --duration or set a scenario default")
    })?;

    let pacing = match cli.pacing_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => defaults.pacing.filter(|p| !p.is_zero()),
    };

    let mut tls = defaults.tls.clone();
    if let Some(min) = cli.tls_min {
        tls.min_version = min;
    }
    if let Some(max) = cli.tls_max {
        tls.max_version = max;
    }
    if !cli.tls_cipher_suites.is_empty() {
        tls.cipher_suites = cipher_suites_from_cli(&cli.tls_cipher_suites)?;
    }
    tls.insecure_skip_verify |= cli.insecure_skip_tls_verify;

    let options = RunOptions {
        virtual_users: cli.virtual_users.unwrap_or(1),
        duration: Duration::from_secs(duration_s),
        iterations: cli.iterations,
        pacing,
        io_timeout: Duration::from_millis(cli.io_timeout_ms),
        tls,
        target: cli.target.clone().or_else(|| defaults.target.clone()),
        run_id: cli.run_id.clone().unwrap_or_else(|| nanoid::nanoid!()),
        no_progress: cli.no_progress,
        reporter: cli.reporter,
    };
    options.validate()?;

    Ok(options)
}

fn cipher_suites_from_cli(values: &[String]) -> Result<CipherSuites, ConfigError> {
    let any = values.iter().any(|v| v.eq_ignore_ascii_case("any"));
    if any && values.len() > 1 {
        return Err(ConfigError::new(
            "The cipher suite [any] cannot be combined with other cipher suites",
        ));
    }
    if any {
        return Ok(CipherSuites::Any);
    }

    Ok(CipherSuites::Only(
        values.iter().cloned().collect::<BTreeSet<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use gale_core::prelude::TlsVersion;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> GaleScenarioCli {
        GaleScenarioCli::try_parse_from(std::iter::once("scenario").chain(args.iter().copied()))
            .unwrap()
    }

    fn defaults() -> ScenarioDefaults {
        ScenarioDefaults {
            duration_s: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_when_cli_is_silent() {
        let mut defaults = defaults();
        defaults.pacing = Some(Duration::from_millis(500));

        let options = resolve_options(&cli(&["--run-id", "fixed"]), &defaults).unwrap();

        assert_eq!(1, options.virtual_users);
        assert_eq!(Duration::from_secs(10), options.duration);
        assert_eq!(Some(Duration::from_millis(500)), options.pacing);
        assert_eq!(TlsPolicy::default(), options.tls);
        assert_eq!("fixed", options.run_id);
    }

    #[test]
    fn cli_target_overrides_default_target() {
        let mut defaults = defaults();
        defaults.target = Some("127.0.0.1:8080".to_string());

        let options = resolve_options(&cli(&[]), &defaults).unwrap();
        assert_eq!(Some("127.0.0.1:8080"), options.target.as_deref());

        let options = resolve_options(&cli(&["--target", "127.0.0.1:9090"]), &defaults).unwrap();
        assert_eq!(Some("127.0.0.1:9090"), options.target.as_deref());
    }

    #[test]
    fn cli_overrides_scenario_tls_defaults() {
        let mut defaults = defaults();
        defaults.tls = TlsPolicy {
            min_version: TlsVersion::Tls11,
            max_version: TlsVersion::Tls12,
            cipher_suites: CipherSuites::only(["TLS_RSA_WITH_AES_128_GCM_SHA256"]),
            insecure_skip_verify: false,
        };

        let options = resolve_options(
            &cli(&[
                "--tls-max",
                "tls1.3",
                "--tls-cipher-suite",
                "any",
                "--insecure-skip-tls-verify",
            ]),
            &defaults,
        )
        .unwrap();

        assert_eq!(TlsVersion::Tls11, options.tls.min_version);
        assert_eq!(TlsVersion::Tls13, options.tls.max_version);
        assert_eq!(CipherSuites::Any, options.tls.cipher_suites);
        assert!(options.tls.insecure_skip_verify);
    }

    #[test]
    fn zero_pacing_disables_pacing() {
        let mut defaults = defaults();
        defaults.pacing = Some(Duration::from_millis(500));

        let options = resolve_options(&cli(&["--pacing-ms", "0"]), &defaults).unwrap();

        assert_eq!(None, options.pacing);
    }

    #[test]
    fn missing_duration_is_a_config_error() {
        let result = resolve_options(&cli(&[]), &ScenarioDefaults::default());
        assert!(result.unwrap_err().to_string().contains("No duration"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for args in [
            &["--virtual-users", "0"][..],
            &["--duration", "0"][..],
            &["--iterations", "0"][..],
            &["--io-timeout-ms", "0"][..],
            &["--tls-min", "tls1.3", "--tls-max", "tls1.2"][..],
            &["--tls-cipher-suite", "TLS_NOT_A_SUITE"][..],
            &["--tls-cipher-suite", "any", "--tls-cipher-suite", "TLS_AES_128_GCM_SHA256"][..],
        ] {
            assert!(
                resolve_options(&cli(args), &defaults()).is_err(),
                "expected {args:?} to be rejected"
            );
        }
    }
}
