//! certbot invocation for HTTP-01 webroot issuance
//!
//! 🔐 Builds the non-interactive command line for one virtual host. Running
//! it is left to the caller.

/// Default certbot executable
pub const DEFAULT_CERTBOT: &str = "certbot";

/// 📜 One certificate request covering all domains of a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertbotRequest {
    /// certbot executable
    pub program: String,
    /// Account email for Let's Encrypt
    pub email: String,
    /// Directory served at `/.well-known/` for these domains
    pub webroot: String,
    /// Domains covered, first one names the certificate
    pub domains: Vec<String>,
}

impl CertbotRequest {
    pub fn new(
        program: impl Into<String>,
        email: impl Into<String>,
        webroot: impl Into<String>,
        domains: Vec<String>,
    ) -> Self {
        Self {
            program: program.into(),
            email: email.into(),
            webroot: webroot.into(),
            domains,
        }
    }

    /// Full argv, program first.
    ///
    /// `--expand` lets certbot add domains to an existing certificate
    /// without asking.
    pub fn argv(&self) -> Vec<String> {
        [
            self.program.as_str(),
            "certonly",
            "--noninteractive",
            "--agree-tos",
            "--webroot",
            "--expand",
            "-m",
            self.email.as_str(),
            "-w",
            self.webroot.as_str(),
            "-d",
        ]
        .into_iter()
        .map(String::from)
        .chain(std::iter::once(self.domains.join(",")))
        .collect()
    }
}
