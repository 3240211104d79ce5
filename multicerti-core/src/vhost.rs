//! Virtual hosts and the nginx blocks they generate
//!
//! A [`VirtualHost`] is immutable once built. Its https server block is a
//! function of the certificate files currently on disk: nothing about
//! issuance is remembered between renders, so a certificate that appears
//! between two renders shows up in the second one.

use multicerti_config::{Block, Directive, Node};
use multicerti_tls::{CertLayout, CertbotRequest};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const SSL_PROTOCOLS: [&str; 3] = ["TLSv1", "TLSv1.1", "TLSv1.2"];

const SSL_CIPHERS: &str = concat!(
    "ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:ECDHE-ECDSA-AES128-GCM-SHA256:",
    "ECDHE-RSA-AES128-GCM-SHA256:ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:",
    "DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384:ECDHE-ECDSA-AES128-SHA256:",
    "ECDHE-RSA-AES128-SHA256:ECDHE-ECDSA-AES128-SHA:ECDHE-RSA-AES256-SHA384:ECDHE-RSA-AES128-SHA:",
    "ECDHE-ECDSA-AES256-SHA384:ECDHE-ECDSA-AES256-SHA:ECDHE-RSA-AES256-SHA:DHE-RSA-AES128-SHA256:",
    "DHE-RSA-AES128-SHA:DHE-RSA-AES256-SHA256:DHE-RSA-AES256-SHA:ECDHE-ECDSA-DES-CBC3-SHA:",
    "ECDHE-RSA-DES-CBC3-SHA:EDH-RSA-DES-CBC3-SHA:AES128-GCM-SHA256:AES256-GCM-SHA384:AES128-SHA256:",
    "AES256-SHA256:AES128-SHA:AES256-SHA:DES-CBC3-SHA:!DSS",
);

/// Virtual host construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VhostError {
    #[error("A virtual host needs at least one domain")]
    NoDomains,

    #[error("A virtual host needs at least one protocol")]
    NoProtocols,

    #[error("Protocol {0} is listed twice")]
    DuplicateProtocol(Protocol),

    #[error("Exactly one of backends, redirect or root must be set ({0} given)")]
    Target(usize),

    #[error("The list of backends is empty")]
    NoBackends,

    #[error("A registration email is required to use the https protocol")]
    MissingEmail,
}

/// Transport a virtual host is served over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("Unknown protocol `{}` (expected http or https)", other)),
        }
    }
}

/// What the root location of a host does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Reverse proxy to an upstream group of these addresses
    Backends(Vec<String>),
    /// Permanent redirect, request URI appended
    Redirect(String),
    /// Static files from a directory
    Root(String),
}

/// Allocates virtual host ids, starting at 1.
///
/// Owned by whatever builds the hosts of one document, so two hosts built
/// from the same counter never share an upstream group name.
#[derive(Debug)]
pub struct HostIds {
    next: u64,
}

impl Default for HostIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HostIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Raw settings for one virtual host, checked by [`VirtualHost::new`]
#[derive(Debug, Clone, Default)]
pub struct HostSettings {
    pub domains: Vec<String>,
    pub protocols: Vec<Protocol>,
    pub backends: Option<Vec<String>>,
    pub redirect: Option<String>,
    pub root: Option<String>,
    pub http_to_https: bool,
    pub registration_email: Option<String>,
}

/// 🏠 One site behind nginx
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHost {
    id: u64,
    domains: Vec<String>,
    protocols: Vec<Protocol>,
    target: Target,
    http_to_https: bool,
    registration_email: Option<String>,
    layout: CertLayout,
}

impl VirtualHost {
    /// Check `settings` and take the next id from `ids`
    pub fn new(
        ids: &mut HostIds,
        settings: HostSettings,
        layout: CertLayout,
    ) -> Result<Self, VhostError> {
        let HostSettings {
            domains,
            protocols,
            backends,
            redirect,
            root,
            http_to_https,
            registration_email,
        } = settings;

        if domains.is_empty() {
            return Err(VhostError::NoDomains);
        }
        if protocols.is_empty() {
            return Err(VhostError::NoProtocols);
        }
        for (i, protocol) in protocols.iter().enumerate() {
            if protocols[..i].contains(protocol) {
                return Err(VhostError::DuplicateProtocol(*protocol));
            }
        }

        let target = match (backends, redirect, root) {
            (Some(backends), None, None) if backends.is_empty() => {
                return Err(VhostError::NoBackends);
            }
            (Some(backends), None, None) => Target::Backends(backends),
            (None, Some(redirect), None) => Target::Redirect(redirect),
            (None, None, Some(root)) => Target::Root(root),
            (backends, redirect, root) => {
                let given = [backends.is_some(), redirect.is_some(), root.is_some()];
                return Err(VhostError::Target(given.iter().filter(|set| **set).count()));
            }
        };

        let registration_email = registration_email.filter(|email| !email.is_empty());
        if protocols.contains(&Protocol::Https) && registration_email.is_none() {
            return Err(VhostError::MissingEmail);
        }

        Ok(Self {
            id: ids.next_id(),
            domains,
            protocols,
            target,
            http_to_https,
            registration_email,
            layout,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    pub fn serves(&self, protocol: Protocol) -> bool {
        self.protocols.contains(&protocol)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn http_to_https(&self) -> bool {
        self.http_to_https
    }

    pub fn registration_email(&self) -> Option<&str> {
        self.registration_email.as_deref()
    }

    /// Name of the upstream group for this host's backends
    pub fn upstream_name(&self) -> String {
        format!("frontends{}", self.id)
    }

    /// First domain with a certificate on disk, else the first domain
    pub fn master_domain(&self) -> &str {
        self.layout.master_domain(&self.domains).unwrap_or_default()
    }

    /// Directory certbot writes challenge files to
    pub fn webroot(&self) -> PathBuf {
        self.layout.webroot(self.master_domain())
    }

    /// A certificate bundle for this host exists right now
    pub fn has_certificate(&self) -> bool {
        self.layout.has_certificate(self.master_domain())
    }

    /// certbot request for this host, if it serves https
    pub fn certbot_request(&self, program: &str) -> Option<CertbotRequest> {
        if !self.serves(Protocol::Https) {
            return None;
        }
        let email = self.registration_email.as_deref()?;
        Some(CertbotRequest::new(
            program,
            email,
            self.webroot().display().to_string(),
            self.domains.clone(),
        ))
    }

    /// `upstream frontends<id> { server <addr>; ... }` when proxying.
    ///
    /// A backend may carry server parameters after its address
    /// (`127.0.0.1:8000 weight=3`); they become separate arguments.
    pub fn upstream_block(&self) -> Option<Node> {
        let Target::Backends(backends) = &self.target else {
            return None;
        };
        let block = Block::new("upstream")
            .arg(self.upstream_name())
            .with_children(backends.iter().map(|backend| {
                Directive::new("server")
                    .with_args(backend.split_whitespace())
                    .into()
            }));
        Some(block.into())
    }

    /// Body of the root location on both listeners
    pub fn location_content(&self) -> Vec<Node> {
        match &self.target {
            Target::Backends(_) => vec![
                Directive::new("proxy_pass_header").arg("Server").into(),
                Directive::new("proxy_set_header")
                    .with_args(["Host", "$http_host"])
                    .into(),
                Directive::new("proxy_redirect").arg("off").into(),
                Directive::new("proxy_set_header")
                    .with_args(["X-Real-IP", "$remote_addr"])
                    .into(),
                Directive::new("proxy_set_header")
                    .with_args(["X-Scheme", "$scheme"])
                    .into(),
                Directive::new("proxy_pass")
                    .arg(format!("http://{}", self.upstream_name()))
                    .into(),
            ],
            Target::Redirect(url) => vec![
                Directive::new("return")
                    .arg("301")
                    .arg(format!("{}$request_uri", url))
                    .into(),
            ],
            Target::Root(path) => vec![Directive::new("root").arg(path.as_str()).into()],
        }
    }

    fn server_name(&self) -> Directive {
        Directive::new("server_name").with_args(self.domains.iter().map(String::as_str))
    }

    /// 🌐 The port 80 server block.
    ///
    /// Always present: it serves the ACME challenge path for https hosts
    /// and answers 404 when plain http is not enabled.
    pub fn plain_server_block(&self) -> Node {
        let mut server = Block::new("server")
            .child(Directive::new("listen").arg("80"))
            .child(self.server_name());

        if self.serves(Protocol::Https) {
            server.push(
                Block::new("location")
                    .arg("/.well-known/")
                    .child(
                        Directive::new("alias")
                            .arg(self.layout.well_known_alias(self.master_domain())),
                    )
                    .child(Directive::new("autoindex").arg("off")),
            );
        }

        let root = Block::new("location").arg("/");
        let root = if !self.serves(Protocol::Http) {
            root.child(Directive::new("return").arg("404"))
        } else if self.http_to_https {
            root.child(
                Directive::new("return")
                    .arg("301")
                    .arg("https://$host$request_uri"),
            )
        } else {
            root.with_children(self.location_content())
        };
        server.push(root);

        server.into()
    }

    /// 🔒 The port 443 server block, only once a certificate exists on disk
    pub fn encrypted_server_block(&self) -> Option<Node> {
        if !self.serves(Protocol::Https) {
            return None;
        }

        let master = self.master_domain();
        if !self.layout.has_certificate(master) {
            tracing::debug!("⏳ No certificate yet for {}, skipping https block", master);
            return None;
        }
        tracing::debug!("🔒 Certificate present for {}, emitting https block", master);

        let paths = self.layout.paths(master);
        let server = Block::new("server")
            .child(Directive::new("listen").with_args(["443", "ssl"]))
            .child(self.server_name())
            .child(Directive::new("ssl_certificate").arg(paths.fullchain.display().to_string()))
            .child(Directive::new("ssl_certificate_key").arg(paths.privkey.display().to_string()))
            .child(Directive::new("ssl_session_cache").arg("shared:SSL:1m"))
            .child(Directive::new("ssl_session_timeout").arg("5m"))
            .child(Directive::new("ssl_protocols").with_args(SSL_PROTOCOLS))
            .child(Directive::new("ssl_ciphers").arg(SSL_CIPHERS))
            .child(Directive::new("ssl_prefer_server_ciphers").arg("on"))
            .child(
                Block::new("location")
                    .arg("/")
                    .with_children(self.location_content()),
            );

        Some(server.into())
    }
}
