//! Configuration document types
//!
//! These types mirror the multicerti configuration document as stored on
//! disk. Everything is optional at this level; [`validate`] decides what is
//! required and fills in defaults.
//!
//! [`validate`]: super::validation::validate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Default registration email for every virtual host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_email: Option<String>,

    /// Virtual hosts, in rendering order
    #[serde(default)]
    pub vhosts: Vec<VhostRecord>,

    /// Template the nginx configuration is rendered from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_conf_template: Option<String>,

    /// Path of the live nginx configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_conf_location: Option<String>,

    /// Command exiting 0 when nginx is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_status: Option<Vec<String>>,

    /// Command starting nginx
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_start: Option<Vec<String>>,

    /// Command reloading a running nginx
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_reload: Option<Vec<String>>,

    /// nginx executable, used for syntax checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx: Option<String>,

    /// certbot executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certbot: Option<String>,

    /// certbot live directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letsencrypt_live: Option<String>,

    /// Root of the per-host challenge webroots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letsencrypt_webroot: Option<String>,

    /// Keys multicerti does not know about, kept so saving does not lose them
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One virtual host entry of the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VhostRecord {
    /// Domain names; `.example.com` stands for `example.com` and `www.example.com`
    #[serde(default)]
    pub domains: Vec<String>,

    /// `http`, `https` or both
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Upstream addresses to proxy to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<String>>,

    /// URL to permanently redirect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,

    /// Directory to serve files from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Redirect plain http to https
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_to_https: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_email: Option<String>,
}
