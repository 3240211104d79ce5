//! Configuration validation.
//!
//! Turns a loaded [`Conf`] into a [`ValidatedConf`]: virtual hosts built,
//! defaults applied, paths resolved.
//!
//! Every problem is reported, not just the first, each under the path of
//! the offending field (`vhosts[2].domains[0]`).

use crate::config::{Conf, VhostRecord};
use crate::vhost::{HostIds, HostSettings, Protocol, VirtualHost};
use multicerti_tls::layout::{DEFAULT_LIVE_DIR, DEFAULT_WEBROOT_DIR};
use multicerti_tls::{certbot::DEFAULT_CERTBOT, CertLayout};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Problems found with one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub messages: Vec<String>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.messages.join("; "))
    }
}

/// Everything wrong with a configuration document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration:{}", list(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn list(errors: &[FieldError]) -> String {
    errors.iter().map(|e| format!("\n  {}", e)).collect()
}

impl ValidationErrors {
    /// Messages recorded for `path`
    pub fn messages(&self, path: &str) -> &[String] {
        self.errors
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.messages.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let path = path.into();
        match self.errors.iter_mut().find(|e| e.path == path) {
            Some(existing) => existing.messages.push(message.into()),
            None => self.errors.push(FieldError {
                path,
                messages: vec![message.into()],
            }),
        }
    }

    fn len(&self) -> usize {
        self.errors.len()
    }

    /// Reject values nginx cannot hold
    fn printable(&mut self, path: &str, value: &str) -> bool {
        if value.chars().any(char::is_control) {
            self.add(path, "Contains control characters");
            return false;
        }
        true
    }
}

/// nginx service commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommands {
    pub status: Vec<String>,
    pub start: Vec<String>,
    pub reload: Vec<String>,
}

/// A checked document, ready to render and deploy
#[derive(Debug, Clone)]
pub struct ValidatedConf {
    pub vhosts: Vec<VirtualHost>,
    pub nginx_conf_template: PathBuf,
    pub nginx_conf_location: PathBuf,
    pub commands: ServiceCommands,
    pub nginx: String,
    pub certbot: String,
    pub layout: CertLayout,
}

/// `.example.com` means `example.com` and `www.example.com`
pub fn expand_domain(domain: &str) -> Vec<String> {
    match domain.strip_prefix('.') {
        Some(bare) => vec![bare.to_string(), format!("www{}", domain)],
        None => vec![domain.to_string()],
    }
}

/// Letters, digits and inner hyphens, dot-separated, at most 253 bytes
pub fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// `local@domain` with a valid domain and no whitespace
pub fn is_valid_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !local.contains('@')
                && !local.chars().any(char::is_whitespace)
                && domain.contains('.')
                && is_valid_domain(domain)
        }
        None => false,
    }
}

fn check_redirect(errors: &mut Collector, path: &str, redirect: &str) {
    match url::Url::parse(redirect) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.add(path, format!("Unsupported URL scheme `{}`", url.scheme()));
        }
        Ok(url) if url.host_str().is_none_or(str::is_empty) => {
            errors.add(path, "The URL has no host");
        }
        Ok(_) => {}
        Err(e) => errors.add(path, format!("Invalid URL: {}", e)),
    }
}

fn check_command(errors: &mut Collector, key: &str, value: &Option<Vec<String>>, default: &str) -> Vec<String> {
    match value {
        None => ["service", "nginx", default].map(String::from).to_vec(),
        Some(argv) if argv.is_empty() || argv[0].is_empty() => {
            errors.add(key, "The command is empty");
            Vec::new()
        }
        Some(argv) => {
            for (i, arg) in argv.iter().enumerate() {
                errors.printable(&format!("{}[{}]", key, i), arg);
            }
            argv.clone()
        }
    }
}

fn check_vhost(
    errors: &mut Collector,
    index: usize,
    record: &VhostRecord,
    default_email: Option<&str>,
) -> Option<HostSettings> {
    let before = errors.len();
    let at = |field: &str| format!("vhosts[{}].{}", index, field);

    let domains: Vec<String> = record
        .domains
        .iter()
        .flat_map(|domain| expand_domain(domain))
        .collect();
    if domains.is_empty() {
        errors.add(at("domains"), "At least one domain is required");
    }
    for (i, domain) in domains.iter().enumerate() {
        let path = format!("{}[{}]", at("domains"), i);
        if errors.printable(&path, domain) && !is_valid_domain(domain) {
            errors.add(path, format!("`{}` is not a valid domain name", domain));
        }
    }

    let mut protocols = Vec::new();
    if !(1..=2).contains(&record.protocols.len()) {
        errors.add(at("protocols"), "Between 1 and 2 protocols are required");
    }
    for (i, name) in record.protocols.iter().enumerate() {
        let path = format!("{}[{}]", at("protocols"), i);
        match name.parse::<Protocol>() {
            Ok(protocol) if protocols.contains(&protocol) => {
                errors.add(path, format!("Protocol {} is listed twice", protocol));
            }
            Ok(protocol) => protocols.push(protocol),
            Err(message) => errors.add(path, message),
        }
    }

    let targets = [
        record.backends.is_some(),
        record.redirect.is_some(),
        record.root.is_some(),
    ];
    if targets.iter().filter(|set| **set).count() != 1 {
        errors.add(
            format!("vhosts[{}]", index),
            "You must specify either a list of backends, a redirection url or a root directory",
        );
    }

    if let Some(backends) = &record.backends {
        if backends.is_empty() {
            errors.add(at("backends"), "At least one backend is required");
        }
        for (i, backend) in backends.iter().enumerate() {
            let path = format!("{}[{}]", at("backends"), i);
            if errors.printable(&path, backend) && backend.trim().is_empty() {
                errors.add(path, "The backend address is empty");
            }
        }
    }

    if let Some(redirect) = &record.redirect {
        let path = at("redirect");
        if errors.printable(&path, redirect) {
            check_redirect(errors, &path, redirect);
        }
    }

    if let Some(root) = &record.root {
        let path = at("root");
        if errors.printable(&path, root) && root.is_empty() {
            errors.add(path, "The root directory is empty");
        }
    }

    if let Some(email) = &record.registration_email {
        if !is_valid_email(email) {
            errors.add(at("registration_email"), format!("`{}` is not a valid email address", email));
        }
    }
    let registration_email = record
        .registration_email
        .as_deref()
        .or(default_email)
        .map(str::to_string);
    if protocols.contains(&Protocol::Https) && registration_email.is_none() {
        errors.add(
            at("registration_email"),
            "You must specify a registration_email key to use the https protocol",
        );
    }

    if errors.len() > before {
        return None;
    }

    Some(HostSettings {
        domains,
        protocols,
        backends: record.backends.clone(),
        redirect: record.redirect.clone(),
        root: record.root.clone(),
        http_to_https: record.http_to_https.unwrap_or(false),
        registration_email,
    })
}

fn required_path(errors: &mut Collector, key: &str, value: &Option<String>) -> PathBuf {
    match value.as_deref() {
        None | Some("") => {
            errors.add(key, "A path is required");
            PathBuf::new()
        }
        Some(path) => {
            errors.printable(key, path);
            PathBuf::from(path)
        }
    }
}

fn optional_dir(errors: &mut Collector, key: &str, value: &Option<String>, default: &str) -> PathBuf {
    match value.as_deref() {
        None => PathBuf::from(default),
        Some("") => {
            errors.add(key, "A path is required");
            PathBuf::new()
        }
        Some(path) => {
            errors.printable(key, path);
            PathBuf::from(path)
        }
    }
}

/// ✅ Validate a document, building its virtual hosts
pub fn validate(conf: &Conf) -> Result<ValidatedConf, ValidationErrors> {
    let mut errors = Collector::default();

    let default_email = conf.registration_email.as_deref();
    if let Some(email) = default_email {
        if !is_valid_email(email) {
            errors.add("registration_email", format!("`{}` is not a valid email address", email));
        }
    }

    let nginx_conf_template = required_path(&mut errors, "nginx_conf_template", &conf.nginx_conf_template);
    if !nginx_conf_template.as_os_str().is_empty() && !Path::new(&nginx_conf_template).exists() {
        errors.add("nginx_conf_template", "The file does not exist");
    }
    let nginx_conf_location = required_path(&mut errors, "nginx_conf_location", &conf.nginx_conf_location);

    let commands = ServiceCommands {
        status: check_command(&mut errors, "nginx_status", &conf.nginx_status, "status"),
        start: check_command(&mut errors, "nginx_start", &conf.nginx_start, "start"),
        reload: check_command(&mut errors, "nginx_reload", &conf.nginx_reload, "reload"),
    };

    let nginx = conf.nginx.clone().unwrap_or_else(|| "nginx".to_string());
    if nginx.is_empty() {
        errors.add("nginx", "The nginx executable is empty");
    }
    let certbot = conf.certbot.clone().unwrap_or_else(|| DEFAULT_CERTBOT.to_string());
    if certbot.is_empty() {
        errors.add("certbot", "The certbot executable is empty");
    }

    let layout = CertLayout::new(
        optional_dir(&mut errors, "letsencrypt_live", &conf.letsencrypt_live, DEFAULT_LIVE_DIR),
        optional_dir(
            &mut errors,
            "letsencrypt_webroot",
            &conf.letsencrypt_webroot,
            DEFAULT_WEBROOT_DIR,
        ),
    );

    let mut ids = HostIds::new();
    let mut vhosts = Vec::with_capacity(conf.vhosts.len());
    for (index, record) in conf.vhosts.iter().enumerate() {
        let Some(settings) = check_vhost(&mut errors, index, record, default_email) else {
            continue;
        };
        match VirtualHost::new(&mut ids, settings, layout.clone()) {
            Ok(vhost) => vhosts.push(vhost),
            Err(e) => errors.add(format!("vhosts[{}]", index), e.to_string()),
        }
    }

    if !errors.errors.is_empty() {
        tracing::debug!("❌ {} invalid field(s)", errors.errors.len());
        return Err(ValidationErrors {
            errors: errors.errors,
        });
    }

    tracing::debug!("✅ Configuration valid, {} virtual host(s)", vhosts.len());
    Ok(ValidatedConf {
        vhosts,
        nginx_conf_template,
        nginx_conf_location,
        commands,
        nginx,
        certbot,
        layout,
    })
}
