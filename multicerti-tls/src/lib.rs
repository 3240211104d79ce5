//! Multicerti TLS Module
//!
//! Certificate handling around an external issuance tool:
//! - Filesystem layout of certificate bundles and challenge webroots
//! - certbot request construction (HTTP-01 over a webroot)
//! - Read-only inspection of issued certificates

pub mod certbot;
pub mod inspect;
pub mod layout;

pub use certbot::CertbotRequest;
pub use inspect::{inspect_bundle, CertError, CertificateInfo};
pub use layout::{CertLayout, CertPaths};
