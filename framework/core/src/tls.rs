use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl Display for TlsVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TlsVersion::Tls10 => "tls1.0",
            TlsVersion::Tls11 => "tls1.1",
            TlsVersion::Tls12 => "tls1.2",
            TlsVersion::Tls13 => "tls1.3",
        };
        f.write_str(s)
    }
}

impl FromStr for TlsVersion {
    type Err = TlsPolicyError;

    /// Accepts `tls1.2`, `TLS1.2` and the OpenSSL spelling `TLSv1.2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace("tlsv", "tls");
        match normalised.as_str() {
            "tls1.0" | "tls1" => Ok(TlsVersion::Tls10),
            "tls1.1" => Ok(TlsVersion::Tls11),
            "tls1.2" => Ok(TlsVersion::Tls12),
            "tls1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsPolicyError::UnknownVersion(s.to_string())),
        }
    }
}

/// A cipher suite the harness knows how to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    /// IANA name, as used in scenario options and reports.
    pub name: &'static str,
    /// Name understood by OpenSSL. TLS 1.3 suites share their IANA name.
    pub openssl_name: &'static str,
    pub tls13: bool,
}

const fn legacy(name: &'static str, openssl_name: &'static str) -> CipherSuite {
    CipherSuite {
        name,
        openssl_name,
        tls13: false,
    }
}

const fn modern(name: &'static str) -> CipherSuite {
    CipherSuite {
        name,
        openssl_name: name,
        tls13: true,
    }
}

const KNOWN_CIPHER_SUITES: &[CipherSuite] = &[
    modern("TLS_AES_128_GCM_SHA256"),
    modern("TLS_AES_256_GCM_SHA384"),
    modern("TLS_CHACHA20_POLY1305_SHA256"),
    modern("TLS_AES_128_CCM_SHA256"),
    legacy("TLS_RSA_WITH_RC4_128_SHA", "RC4-SHA"),
    legacy("TLS_RSA_WITH_3DES_EDE_CBC_SHA", "DES-CBC3-SHA"),
    legacy("TLS_RSA_WITH_AES_128_CBC_SHA", "AES128-SHA"),
    legacy("TLS_RSA_WITH_AES_256_CBC_SHA", "AES256-SHA"),
    legacy("TLS_RSA_WITH_AES_128_CBC_SHA256", "AES128-SHA256"),
    legacy("TLS_RSA_WITH_AES_256_CBC_SHA256", "AES256-SHA256"),
    legacy("TLS_RSA_WITH_AES_128_GCM_SHA256", "AES128-GCM-SHA256"),
    legacy("TLS_RSA_WITH_AES_256_GCM_SHA384", "AES256-GCM-SHA384"),
    legacy("TLS_DHE_RSA_WITH_AES_128_GCM_SHA256", "DHE-RSA-AES128-GCM-SHA256"),
    legacy("TLS_DHE_RSA_WITH_AES_256_GCM_SHA384", "DHE-RSA-AES256-GCM-SHA384"),
    legacy("TLS_ECDHE_RSA_WITH_RC4_128_SHA", "ECDHE-RSA-RC4-SHA"),
    legacy("TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA", "ECDHE-RSA-DES-CBC3-SHA"),
    legacy("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", "ECDHE-RSA-AES128-SHA"),
    legacy("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", "ECDHE-RSA-AES256-SHA"),
    legacy("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", "ECDHE-RSA-AES128-GCM-SHA256"),
    legacy("TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", "ECDHE-RSA-AES256-GCM-SHA384"),
    legacy("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-RSA-CHACHA20-POLY1305"),
    legacy("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", "ECDHE-ECDSA-AES128-SHA"),
    legacy("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", "ECDHE-ECDSA-AES256-SHA"),
    legacy("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", "ECDHE-ECDSA-AES128-GCM-SHA256"),
    legacy("TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", "ECDHE-ECDSA-AES256-GCM-SHA384"),
    legacy("TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-ECDSA-CHACHA20-POLY1305"),
];

impl CipherSuite {
    /// Find a suite by its IANA name.
    pub fn lookup(name: &str) -> Option<&'static CipherSuite> {
        KNOWN_CIPHER_SUITES.iter().find(|s| s.name == name)
    }

    /// Find a suite by the name OpenSSL reports for it.
    pub fn from_openssl_name(openssl_name: &str) -> Option<&'static CipherSuite> {
        KNOWN_CIPHER_SUITES
            .iter()
            .find(|s| s.openssl_name == openssl_name)
    }
}

/// The cipher suites a run is allowed to offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CipherSuites {
    /// Leave the choice to the TLS library defaults.
    #[default]
    Any,
    /// Offer only these suites, by IANA name.
    Only(BTreeSet<String>),
}

impl CipherSuites {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CipherSuites::Only(names.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TlsPolicyError {
    #[error("unknown TLS version [{0}], expected one of tls1.0, tls1.1, tls1.2, tls1.3")]
    UnknownVersion(String),
    #[error("minimum TLS version {min} is above maximum TLS version {max}")]
    InvertedVersions { min: TlsVersion, max: TlsVersion },
    #[error("the allowed cipher suite list is empty, use [any] to allow every suite")]
    EmptyCipherSuites,
    #[error("unknown cipher suite [{0}]")]
    UnknownCipherSuite(String),
    #[error("none of the allowed cipher suites can be used with TLS versions {min} to {max}")]
    NoUsableCipherSuite { min: TlsVersion, max: TlsVersion },
}

/// Constraints applied to every TLS handshake in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    pub cipher_suites: CipherSuites,
    /// Skip certificate chain and hostname validation. Only meant for testing against
    /// self-signed endpoints.
    pub insecure_skip_verify: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
            cipher_suites: CipherSuites::Any,
            insecure_skip_verify: false,
        }
    }
}

impl TlsPolicy {
    pub fn validate(&self) -> Result<(), TlsPolicyError> {
        if self.min_version > self.max_version {
            return Err(TlsPolicyError::InvertedVersions {
                min: self.min_version,
                max: self.max_version,
            });
        }

        let CipherSuites::Only(names) = &self.cipher_suites else {
            return Ok(());
        };

        if names.is_empty() {
            return Err(TlsPolicyError::EmptyCipherSuites);
        }

        if let Some(unknown) = names.iter().find(|n| CipherSuite::lookup(n).is_none()) {
            return Err(TlsPolicyError::UnknownCipherSuite(unknown.clone()));
        }

        let usable_legacy =
            self.min_version <= TlsVersion::Tls12 && !self.legacy_suites().is_empty();
        let usable_modern =
            self.max_version == TlsVersion::Tls13 && !self.tls13_suites().is_empty();
        if !usable_legacy && !usable_modern {
            return Err(TlsPolicyError::NoUsableCipherSuite {
                min: self.min_version,
                max: self.max_version,
            });
        }

        Ok(())
    }

    /// Allowed suites for TLS 1.2 and below. Empty when any suite is allowed.
    pub fn legacy_suites(&self) -> Vec<&'static CipherSuite> {
        self.known_suites().filter(|s| !s.tls13).collect()
    }

    /// Allowed TLS 1.3 suites. Empty when any suite is allowed.
    pub fn tls13_suites(&self) -> Vec<&'static CipherSuite> {
        self.known_suites().filter(|s| s.tls13).collect()
    }

    fn known_suites(&self) -> impl Iterator<Item = &'static CipherSuite> + '_ {
        let names = match &self.cipher_suites {
            CipherSuites::Any => None,
            CipherSuites::Only(names) => Some(names),
        };
        names
            .into_iter()
            .flatten()
            .filter_map(|n| CipherSuite::lookup(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(min: TlsVersion, max: TlsVersion, suites: CipherSuites) -> TlsPolicy {
        TlsPolicy {
            min_version: min,
            max_version: max,
            cipher_suites: suites,
            insecure_skip_verify: false,
        }
    }

    #[test]
    fn parse_versions() {
        assert_eq!(TlsVersion::Tls11, "tls1.1".parse().unwrap());
        assert_eq!(TlsVersion::Tls12, "TLSv1.2".parse().unwrap());
        assert_eq!(TlsVersion::Tls13, "TLS1.3".parse().unwrap());
        assert_eq!(
            Err(TlsPolicyError::UnknownVersion("ssl3".to_string())),
            "ssl3".parse::<TlsVersion>()
        );
    }

    #[test]
    fn versions_are_ordered() {
        assert!(TlsVersion::Tls10 < TlsVersion::Tls11);
        assert!(TlsVersion::Tls12 < TlsVersion::Tls13);
    }

    #[test]
    fn default_policy_is_valid() {
        assert_eq!(Ok(()), TlsPolicy::default().validate());
    }

    #[test]
    fn inverted_versions_are_rejected() {
        let p = policy(TlsVersion::Tls13, TlsVersion::Tls11, CipherSuites::Any);
        assert_eq!(
            Err(TlsPolicyError::InvertedVersions {
                min: TlsVersion::Tls13,
                max: TlsVersion::Tls11
            }),
            p.validate()
        );
    }

    #[test]
    fn empty_suite_list_is_rejected() {
        let p = policy(
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            CipherSuites::Only(BTreeSet::new()),
        );
        assert_eq!(Err(TlsPolicyError::EmptyCipherSuites), p.validate());
    }

    #[test]
    fn unknown_suite_is_rejected() {
        let p = policy(
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            CipherSuites::only(["TLS_MADE_UP_SUITE"]),
        );
        assert_eq!(
            Err(TlsPolicyError::UnknownCipherSuite(
                "TLS_MADE_UP_SUITE".to_string()
            )),
            p.validate()
        );
    }

    #[test]
    fn tls13_suites_need_tls13() {
        let p = policy(
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            CipherSuites::only(["TLS_AES_128_GCM_SHA256"]),
        );
        assert_eq!(
            Err(TlsPolicyError::NoUsableCipherSuite {
                min: TlsVersion::Tls11,
                max: TlsVersion::Tls12
            }),
            p.validate()
        );
    }

    #[test]
    fn probe_policy_splits_suites() {
        let p = policy(
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            CipherSuites::only([
                "TLS_RSA_WITH_RC4_128_SHA",
                "TLS_RSA_WITH_AES_128_GCM_SHA256",
            ]),
        );
        assert_eq!(Ok(()), p.validate());

        let legacy = p
            .legacy_suites()
            .iter()
            .map(|s| s.openssl_name)
            .collect::<Vec<_>>();
        // Ordered by IANA name.
        assert_eq!(vec!["AES128-GCM-SHA256", "RC4-SHA"], legacy);
        assert!(p.tls13_suites().is_empty());
    }

    #[test]
    fn openssl_names_map_back() {
        let suite = CipherSuite::from_openssl_name("AES128-GCM-SHA256").unwrap();
        assert_eq!("TLS_RSA_WITH_AES_128_GCM_SHA256", suite.name);
        assert!(CipherSuite::from_openssl_name("NOT-A-SUITE").is_none());
    }
}
