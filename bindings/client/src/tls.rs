use std::pin::Pin;

use anyhow::Context;
use gale_core::prelude::{CipherSuite, CipherSuites, NetError, TlsPolicy, TlsVersion};
use openssl::ssl::{ErrorCode, SslConnector, SslMethod, SslRef, SslVerifyMode, SslVersion};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

/// What the handshake settled on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedTls {
    pub version: Option<TlsVersion>,
    /// IANA name when the suite is known, otherwise the name OpenSSL reports.
    pub cipher_suite: Option<String>,
}

/// An OpenSSL connector configured once from the run's [TlsPolicy].
#[derive(Clone)]
pub(crate) struct TlsConnector {
    connector: SslConnector,
    verify_hostname: bool,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("verify_hostname", &self.verify_hostname)
            .finish_non_exhaustive()
    }
}

impl TlsConnector {
    pub(crate) fn new(policy: &TlsPolicy) -> anyhow::Result<Self> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).context("Failed to create TLS connector")?;

        let legacy = policy.legacy_suites();
        let tls13 = policy.tls13_suites();

        let mut min_version = policy.min_version;
        let mut max_version = policy.max_version;
        if let CipherSuites::Only(_) = &policy.cipher_suites {
            // Don't let OpenSSL fall back to its defaults for a protocol range that has no
            // allowed suite.
            if legacy.is_empty() {
                min_version = TlsVersion::Tls13;
            }
            if tls13.is_empty() {
                max_version = max_version.min(TlsVersion::Tls12);
            }
        }

        builder
            .set_min_proto_version(Some(ssl_version(min_version)))
            .context("Failed to set minimum TLS version")?;
        builder
            .set_max_proto_version(Some(ssl_version(max_version)))
            .context("Failed to set maximum TLS version")?;

        // OpenSSL refuses TLS 1.0/1.1 and weak suites at its default security level.
        let security_level = if min_version < TlsVersion::Tls12 {
            ":@SECLEVEL=0"
        } else {
            ""
        };

        match &policy.cipher_suites {
            CipherSuites::Any => {
                if !security_level.is_empty() {
                    builder
                        .set_cipher_list(&format!("DEFAULT{security_level}"))
                        .context("Failed to set cipher list")?;
                }
            }
            CipherSuites::Only(_) => {
                if !legacy.is_empty() {
                    let list = openssl_names(&legacy);
                    builder
                        .set_cipher_list(&format!("{list}{security_level}"))
                        .with_context(|| {
                            format!("None of the cipher suites [{list}] are available")
                        })?;
                }
                if !tls13.is_empty() {
                    let list = openssl_names(&tls13);
                    builder.set_ciphersuites(&list).with_context(|| {
                        format!("None of the cipher suites [{list}] are available")
                    })?;
                }
            }
        }

        if policy.insecure_skip_verify {
            log::warn!("TLS certificate verification is disabled");
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(Self {
            connector: builder.build(),
            verify_hostname: !policy.insecure_skip_verify,
        })
    }

    /// Run the client handshake over an open TCP stream.
    pub(crate) async fn handshake(
        &self,
        host: &str,
        stream: TcpStream,
    ) -> Result<SslStream<TcpStream>, NetError> {
        let ssl = self
            .connector
            .configure()
            .and_then(|config| config.verify_hostname(self.verify_hostname).into_ssl(host))
            .map_err(|e| NetError::TlsNegotiation(e.to_string()))?;
        let mut stream =
            SslStream::new(ssl, stream).map_err(|e| NetError::TlsNegotiation(e.to_string()))?;

        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(|e| {
                if e.code() == ErrorCode::SSL {
                    return NetError::TlsNegotiation(e.to_string());
                }
                match e.into_io_error() {
                    Ok(io) => NetError::Io(io),
                    Err(e) => NetError::TlsNegotiation(e.to_string()),
                }
            })?;

        Ok(stream)
    }
}

pub(crate) fn negotiated(ssl: &SslRef) -> NegotiatedTls {
    NegotiatedTls {
        version: ssl.version2().and_then(tls_version),
        cipher_suite: ssl.current_cipher().map(|cipher| {
            CipherSuite::from_openssl_name(cipher.name())
                .map(|suite| suite.name)
                .unwrap_or(cipher.name())
                .to_string()
        }),
    }
}

fn openssl_names(suites: &[&CipherSuite]) -> String {
    suites
        .iter()
        .map(|s| s.openssl_name)
        .collect::<Vec<_>>()
        .join(":")
}

fn ssl_version(version: TlsVersion) -> SslVersion {
    match version {
        TlsVersion::Tls10 => SslVersion::TLS1,
        TlsVersion::Tls11 => SslVersion::TLS1_1,
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

fn tls_version(version: SslVersion) -> Option<TlsVersion> {
    [
        (SslVersion::TLS1, TlsVersion::Tls10),
        (SslVersion::TLS1_1, TlsVersion::Tls11),
        (SslVersion::TLS1_2, TlsVersion::Tls12),
        (SslVersion::TLS1_3, TlsVersion::Tls13),
    ]
    .into_iter()
    .find_map(|(ssl, tls)| (ssl == version).then_some(tls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_map_both_ways() {
        for version in [
            TlsVersion::Tls10,
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            TlsVersion::Tls13,
        ] {
            assert_eq!(Some(version), tls_version(ssl_version(version)));
        }
        assert_eq!(None, tls_version(SslVersion::SSL3));
    }

    #[test]
    fn build_connector_for_default_policy() {
        assert!(TlsConnector::new(&TlsPolicy::default()).is_ok());
    }

    #[test]
    fn build_connector_for_tls13_only_suites() {
        let policy = TlsPolicy {
            cipher_suites: CipherSuites::only(["TLS_AES_128_GCM_SHA256"]),
            ..Default::default()
        };
        assert!(TlsConnector::new(&policy).is_ok());
    }
}
