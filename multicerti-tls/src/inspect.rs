//! Certificate inspection
//!
//! Reads an issued bundle for reporting. Rendering never calls into this
//! module: whether a host gets its https server depends only on the bundle
//! being present, not on its contents.

use crate::layout::CertPaths;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

/// Renew when fewer than this many seconds of validity remain (30 days)
const RENEWAL_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Certificate inspection errors
#[derive(Debug, Error)]
pub enum CertError {
    #[error("💥 IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("🔍 No certificate found in {0}")]
    NoCertificate(String),

    #[error("🔍 No private key found in {0}")]
    NoPrivateKey(String),

    #[error("⚠️ Invalid certificate in {path}: {message}")]
    Invalid { path: String, message: String },
}

/// 📜 Summary of the leaf certificate of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
    /// Expiry timestamp (Unix seconds)
    pub not_after: i64,
    /// Number of certificates in the chain file
    pub chain_len: usize,
}

impl CertificateInfo {
    /// Seconds of validity left at `now` (negative once expired)
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.not_after - now
    }

    /// Whole days of validity left at `now`
    pub fn remaining_days(&self, now: i64) -> i64 {
        self.remaining_secs(now).div_euclid(24 * 60 * 60)
    }

    /// ⏰ Certificate is about to expire (within 30 days of `now`)
    pub fn needs_renewal(&self, now: i64) -> bool {
        self.remaining_secs(now) < RENEWAL_WINDOW_SECS
    }

    /// Whether every one of `domains` is covered by the certificate
    pub fn covers(&self, domains: &[String]) -> bool {
        domains.iter().all(|d| self.dns_names.iter().any(|n| n == d))
    }
}

/// Current Unix time in seconds
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn read(path: &Path) -> Result<Vec<u8>, CertError> {
    std::fs::read(path).map_err(|source| CertError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// 🔍 Inspect a bundle: parse the leaf certificate and check the key is there
pub fn inspect_bundle(paths: &CertPaths) -> Result<CertificateInfo, CertError> {
    let chain_path = paths.fullchain.display().to_string();
    let chain = read(&paths.fullchain)?;

    let ders = rustls_pemfile::certs(&mut chain.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CertError::Io {
            path: chain_path.clone(),
            source,
        })?;
    let leaf = ders
        .first()
        .ok_or_else(|| CertError::NoCertificate(chain_path.clone()))?;

    let (_, cert) = parse_x509_certificate(leaf).map_err(|e| CertError::Invalid {
        path: chain_path.clone(),
        message: e.to_string(),
    })?;

    let dns_names = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let info = CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        dns_names,
        not_after: cert.validity().not_after.timestamp(),
        chain_len: ders.len(),
    };

    let key_path = paths.privkey.display().to_string();
    let key = read(&paths.privkey)?;
    match rustls_pemfile::private_key(&mut key.as_slice()) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(CertError::NoPrivateKey(key_path)),
        Err(source) => {
            return Err(CertError::Io {
                path: key_path,
                source,
            });
        }
    }

    tracing::debug!(
        "📜 {} covers [{}], expires at {}",
        chain_path,
        info.dns_names.join(", "),
        info.not_after
    );

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CertLayout;
    use rcgen::{date_time_ymd, generate_simple_self_signed, CertificateParams, KeyPair};

    fn write_bundle(layout: &CertLayout, domain: &str, chain: &str, key: &str) -> CertPaths {
        let paths = layout.paths(domain);
        std::fs::create_dir_all(paths.fullchain.parent().unwrap()).unwrap();
        std::fs::write(&paths.fullchain, chain).unwrap();
        std::fs::write(&paths.privkey, key).unwrap();
        paths
    }

    #[test]
    fn test_inspect_self_signed() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path(), tmp.path());
        let names = vec!["example.com".to_string(), "www.example.com".to_string()];
        let issued = generate_simple_self_signed(names.clone()).unwrap();
        let paths = write_bundle(
            &layout,
            "example.com",
            &issued.cert.pem(),
            &issued.key_pair.serialize_pem(),
        );

        let info = inspect_bundle(&paths).unwrap();
        assert_eq!(info.dns_names, names);
        assert_eq!(info.chain_len, 1);
        assert_eq!(info.issuer, info.subject);
        assert!(info.covers(&names));
        assert!(!info.covers(&["other.example.com".to_string()]));
        assert!(!info.needs_renewal(unix_now()));
    }

    #[test]
    fn test_inspect_expired() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path(), tmp.path());
        let mut params = CertificateParams::new(vec!["old.example.com".to_string()]).unwrap();
        params.not_before = date_time_ymd(1999, 1, 1);
        params.not_after = date_time_ymd(2000, 1, 1);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        let paths = write_bundle(&layout, "old.example.com", &cert.pem(), &key.serialize_pem());

        let info = inspect_bundle(&paths).unwrap();
        assert_eq!(info.not_after, 946_684_800);
        assert!(info.needs_renewal(unix_now()));
        assert!(info.remaining_days(unix_now()) < 0);
    }

    #[test]
    fn test_inspect_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path(), tmp.path());
        let paths = write_bundle(&layout, "example.com", "not a pem", "not a key");
        assert!(matches!(
            inspect_bundle(&paths),
            Err(CertError::NoCertificate(_))
        ));
    }

    #[test]
    fn test_inspect_missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path(), tmp.path());
        let issued = generate_simple_self_signed(vec!["example.com".to_string()]).unwrap();
        let paths = write_bundle(&layout, "example.com", &issued.cert.pem(), "");
        assert!(matches!(
            inspect_bundle(&paths),
            Err(CertError::NoPrivateKey(_))
        ));
    }

    #[test]
    fn test_remaining_days() {
        let info = CertificateInfo {
            subject: String::new(),
            issuer: String::new(),
            dns_names: Vec::new(),
            not_after: 10 * 86_400,
            chain_len: 1,
        };
        assert_eq!(info.remaining_days(0), 10);
        assert_eq!(info.remaining_days(86_400 + 1), 8);
        assert!(info.needs_renewal(0));
    }
}
