//! Certificate filesystem layout
//!
//! 💾 Where the issuance tool keeps certificate bundles and where challenge
//! files are served from. Nothing here caches disk state: every lookup goes
//! back to the filesystem, so a certificate issued a moment ago is seen by
//! the very next render.

use std::path::{Path, PathBuf};

/// Default certbot live directory
pub const DEFAULT_LIVE_DIR: &str = "/etc/letsencrypt/live";

/// Default root for per-host challenge webroots
pub const DEFAULT_WEBROOT_DIR: &str = "/usr/local/www/letsencrypt";

const FULLCHAIN: &str = "fullchain.pem";
const PRIVKEY: &str = "privkey.pem";

/// 🗄️ Layout of certificate bundles and challenge webroots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertLayout {
    /// `<live>/<domain>/{fullchain,privkey}.pem`
    live_dir: PathBuf,
    /// `<webroot>/<domain>`
    webroot_dir: PathBuf,
}

/// Certificate and key paths of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub fullchain: PathBuf,
    pub privkey: PathBuf,
}

impl Default for CertLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_DIR, DEFAULT_WEBROOT_DIR)
    }
}

impl CertLayout {
    pub fn new(live_dir: impl AsRef<Path>, webroot_dir: impl AsRef<Path>) -> Self {
        Self {
            live_dir: live_dir.as_ref().to_path_buf(),
            webroot_dir: webroot_dir.as_ref().to_path_buf(),
        }
    }

    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    pub fn webroot_dir(&self) -> &Path {
        &self.webroot_dir
    }

    /// Bundle paths for a domain, whether or not they exist
    pub fn paths(&self, domain: &str) -> CertPaths {
        let dir = self.live_dir.join(domain);
        CertPaths {
            fullchain: dir.join(FULLCHAIN),
            privkey: dir.join(PRIVKEY),
        }
    }

    /// ✅ A bundle exists for this domain (the fullchain file is present)
    pub fn has_certificate(&self, domain: &str) -> bool {
        self.paths(domain).fullchain.exists()
    }

    /// First domain that already has a bundle, else the first domain.
    ///
    /// Returns `None` only for an empty domain list.
    pub fn master_domain<'a>(&self, domains: &'a [String]) -> Option<&'a str> {
        domains
            .iter()
            .find(|domain| self.has_certificate(domain))
            .or_else(|| domains.first())
            .map(String::as_str)
    }

    /// Challenge webroot for a master domain
    pub fn webroot(&self, master_domain: &str) -> PathBuf {
        self.webroot_dir.join(master_domain)
    }

    /// Directory nginx serves `/.well-known/` from for a master domain
    pub fn well_known_alias(&self, master_domain: &str) -> String {
        let webroot = self.webroot(master_domain);
        format!("{}/.well-known/", webroot.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn issue(layout: &CertLayout, domain: &str) {
        let paths = layout.paths(domain);
        std::fs::create_dir_all(paths.fullchain.parent().unwrap()).unwrap();
        std::fs::write(&paths.fullchain, "chain").unwrap();
        std::fs::write(&paths.privkey, "key").unwrap();
    }

    #[test]
    fn test_default_paths() {
        let layout = CertLayout::default();
        let paths = layout.paths("example.com");
        assert_eq!(
            paths.fullchain,
            PathBuf::from("/etc/letsencrypt/live/example.com/fullchain.pem")
        );
        assert_eq!(
            paths.privkey,
            PathBuf::from("/etc/letsencrypt/live/example.com/privkey.pem")
        );
        assert_eq!(
            layout.well_known_alias("example.com"),
            "/usr/local/www/letsencrypt/example.com/.well-known/"
        );
    }

    #[test]
    fn test_master_domain_follows_disk_state() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path().join("live"), tmp.path().join("www"));
        let names = domains(&["example.com", "www.example.com"]);

        assert_eq!(layout.master_domain(&names), Some("example.com"));
        assert!(!layout.has_certificate("www.example.com"));

        issue(&layout, "www.example.com");
        assert_eq!(layout.master_domain(&names), Some("www.example.com"));

        issue(&layout, "example.com");
        assert_eq!(layout.master_domain(&names), Some("example.com"));
    }

    #[test]
    fn test_master_domain_of_empty_list() {
        assert_eq!(CertLayout::default().master_domain(&[]), None);
    }

    #[test]
    fn test_key_alone_is_not_a_certificate() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CertLayout::new(tmp.path(), tmp.path());
        let paths = layout.paths("example.com");
        std::fs::create_dir_all(paths.privkey.parent().unwrap()).unwrap();
        std::fs::write(&paths.privkey, "key").unwrap();
        assert!(!layout.has_certificate("example.com"));
    }
}
