use clap::Parser;
use gale_core::prelude::TlsVersion;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct GaleScenarioCli {
    /// A connection string for the service to test, such as `127.0.0.1:8080` or
    /// `https://www.test1.com:8080`
    #[clap(short, long)]
    pub target: Option<String>,

    /// The number of virtual users to run
    #[clap(long, alias = "agents")]
    pub virtual_users: Option<usize>,

    /// The number of seconds to run the scenario for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Stop each virtual user after this many iterations, even if the duration has not elapsed
    #[clap(long)]
    pub iterations: Option<u64>,

    /// Delay between iterations of a single virtual user, in milliseconds. Zero disables pacing.
    #[clap(long)]
    pub pacing_ms: Option<u64>,

    /// Upper bound for a single connect, read, write or TLS handshake, in milliseconds
    #[clap(long, default_value = "10000")]
    pub io_timeout_ms: u64,

    /// The lowest TLS version to offer: tls1.0, tls1.1, tls1.2 or tls1.3
    #[clap(long, value_parser = parse_tls_version)]
    pub tls_min: Option<TlsVersion>,

    /// The highest TLS version to offer: tls1.0, tls1.1, tls1.2 or tls1.3
    #[clap(long, value_parser = parse_tls_version)]
    pub tls_max: Option<TlsVersion>,

    /// Allow a cipher suite, by its IANA name. For example
    /// `--tls-cipher-suite=TLS_RSA_WITH_AES_128_GCM_SHA256`.
    ///
    /// Use the flag multiple times to allow several suites. Pass `any` to allow every suite the
    /// TLS library supports.
    #[clap(long = "tls-cipher-suite")]
    pub tls_cipher_suites: Vec<String>,

    /// Skip certificate chain and hostname validation for TLS connections.
    ///
    /// Only use this against test endpoints with self-signed certificates.
    #[clap(long, default_value = "false")]
    pub insecure_skip_tls_verify: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReporterOpt {
    /// Print tables of checks and operations when the run finishes
    #[default]
    InMemory,
    /// Report nothing
    Noop,
}

pub fn parse_tls_version(s: &str) -> anyhow::Result<TlsVersion> {
    Ok(s.parse::<TlsVersion>()?)
}
