//! Defaults discovery for the system-wide configuration document
//!
//! The first time multicerti runs with its default document, it looks for
//! the installed nginx configuration, points the document at it and, if no
//! template exists yet, derives one from it. Values already in the document
//! are never overwritten.

use crate::config::loader::{ConfLoadError, ConfLoader};
use crate::config::Conf;
use crate::install::write_atomic;
use multicerti_config::derive_template;
use std::path::{Path, PathBuf};

/// Default configuration document
pub const DEFAULT_CONF_PATH: &str = "/usr/local/etc/multicerti/multicerti.conf";

/// Default template location
pub const DEFAULT_TEMPLATE_PATH: &str = "/usr/local/etc/multicerti/nginx.conf.tpl";

/// Installed nginx configurations, most specific first
pub const NGINX_CONF_CANDIDATES: [&str; 2] =
    ["/usr/local/etc/nginx/nginx.conf", "/etc/nginx/nginx.conf"];

/// Where defaults come from
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Document loaded or created by [`Defaults::load_or_init`]
    pub conf_path: PathBuf,
    /// Template path filled in when the document has none
    pub template_path: PathBuf,
    /// Installed nginx configurations to probe, in order
    pub nginx_conf_candidates: Vec<PathBuf>,
    /// Operating system name, as in `std::env::consts::OS`
    pub os: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            conf_path: PathBuf::from(DEFAULT_CONF_PATH),
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            nginx_conf_candidates: NGINX_CONF_CANDIDATES.iter().map(PathBuf::from).collect(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

impl Defaults {
    /// Service manager command for `action` on this OS
    pub fn service_command(&self, action: &str) -> Vec<String> {
        let argv = if self.os == "linux" {
            ["systemctl", action, "nginx"]
        } else {
            ["service", "nginx", action]
        };
        argv.map(String::from).to_vec()
    }

    fn installed_nginx_conf(&self) -> Option<&Path> {
        self.nginx_conf_candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.exists())
    }

    /// Fill unset keys of `conf`, returning how many were filled.
    ///
    /// Also derives the default template from the installed nginx
    /// configuration when it is missing; that does not count as a change.
    pub fn apply(&self, conf: &mut Conf) -> Result<usize, ConfLoadError> {
        let mut changes = 0;

        if let Some(installed) = self.installed_nginx_conf() {
            tracing::debug!("🔍 Found installed nginx configuration at {}", installed.display());

            if conf.nginx_conf_location.is_none() {
                conf.nginx_conf_location = Some(installed.display().to_string());
                changes += 1;
            }
            if conf.nginx_conf_template.is_none() {
                conf.nginx_conf_template = Some(self.template_path.display().to_string());
                changes += 1;
            }

            let uses_default_template = conf
                .nginx_conf_template
                .as_deref()
                .is_some_and(|template| Path::new(template) == self.template_path);
            if uses_default_template && !self.template_path.exists() {
                self.derive_default_template(installed)?;
            }
        }

        if conf.nginx.is_none() {
            conf.nginx = Some("nginx".to_string());
            changes += 1;
        }

        for (slot, action) in [
            (&mut conf.nginx_status, "status"),
            (&mut conf.nginx_start, "start"),
            (&mut conf.nginx_reload, "reload"),
        ] {
            if slot.is_none() {
                *slot = Some(self.service_command(action));
                changes += 1;
            }
        }

        Ok(changes)
    }

    fn derive_default_template(&self, installed: &Path) -> Result<(), ConfLoadError> {
        let source = match std::fs::read_to_string(installed) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("⚠️ Cannot read {}: {}", installed.display(), e);
                return Ok(());
            }
        };

        let template = match derive_template(&source) {
            Ok(Some(template)) => template,
            Ok(None) => {
                tracing::warn!(
                    "⚠️ {} has no http block, not deriving a template",
                    installed.display()
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("⚠️ Cannot parse {}: {}", installed.display(), e);
                return Ok(());
            }
        };

        let write_error = |source| ConfLoadError::Write {
            path: self.template_path.display().to_string(),
            source,
        };
        if let Some(dir) = self.template_path.parent() {
            std::fs::create_dir_all(dir).map_err(write_error)?;
        }
        write_atomic(&self.template_path, template.as_bytes()).map_err(write_error)?;

        tracing::info!(
            "📝 Derived template {} from {}",
            self.template_path.display(),
            installed.display()
        );
        Ok(())
    }

    /// Load the default document (or start an empty one), fill in defaults
    /// and save it back if anything changed.
    pub fn load_or_init(&self) -> Result<Conf, ConfLoadError> {
        let mut conf = if self.conf_path.exists() {
            ConfLoader::load(&self.conf_path)?
        } else {
            if let Some(dir) = self.conf_path.parent() {
                std::fs::create_dir_all(dir).map_err(|source| ConfLoadError::Write {
                    path: dir.display().to_string(),
                    source,
                })?;
            }
            Conf::default()
        };

        let changes = self.apply(&mut conf)?;
        if changes > 0 {
            tracing::info!("🔧 Filled in {} default setting(s)", changes);
            ConfLoader::save(&conf, &self.conf_path)?;
        }
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multicerti_config::load_template;

    const INSTALLED: &str = "events {\n}\nhttp {\n    sendfile on;\n    include /etc/nginx/sites-enabled/*;\n}\n";

    fn scratch(os: &str) -> (tempfile::TempDir, Defaults) {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = Defaults {
            conf_path: tmp.path().join("etc/multicerti/multicerti.conf"),
            template_path: tmp.path().join("etc/multicerti/nginx.conf.tpl"),
            nginx_conf_candidates: vec![
                tmp.path().join("usr/local/etc/nginx/nginx.conf"),
                tmp.path().join("etc/nginx/nginx.conf"),
            ],
            os: os.to_string(),
        };
        (tmp, defaults)
    }

    fn install_nginx_conf(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_service_commands_per_os() {
        let (_tmp, linux) = scratch("linux");
        assert_eq!(linux.service_command("reload"), vec!["systemctl", "reload", "nginx"]);
        let (_tmp, freebsd) = scratch("freebsd");
        assert_eq!(freebsd.service_command("reload"), vec!["service", "nginx", "reload"]);
    }

    #[test]
    fn test_apply_without_nginx_installed() {
        let (_tmp, defaults) = scratch("freebsd");
        let mut conf = Conf::default();

        assert_eq!(defaults.apply(&mut conf).unwrap(), 4);
        assert_eq!(conf.nginx_conf_location, None);
        assert_eq!(conf.nginx_conf_template, None);
        assert_eq!(conf.nginx.as_deref(), Some("nginx"));
        assert!(!defaults.template_path.exists());
    }

    #[test]
    fn test_apply_derives_template() {
        let (_tmp, defaults) = scratch("linux");
        let installed = &defaults.nginx_conf_candidates[1];
        install_nginx_conf(installed, INSTALLED);

        let mut conf = Conf::default();
        assert_eq!(defaults.apply(&mut conf).unwrap(), 6);
        assert_eq!(conf.nginx_conf_location, Some(installed.display().to_string()));
        assert_eq!(
            conf.nginx_conf_template,
            Some(defaults.template_path.display().to_string())
        );
        assert_eq!(
            conf.nginx_status,
            Some(vec!["systemctl".to_string(), "status".to_string(), "nginx".to_string()])
        );

        let template = std::fs::read_to_string(&defaults.template_path).unwrap();
        assert!(!template.contains("sites-enabled"));
        assert!(load_template(&defaults.template_path).is_ok());

        assert_eq!(defaults.apply(&mut conf).unwrap(), 0);
    }

    #[test]
    fn test_first_candidate_wins() {
        let (_tmp, defaults) = scratch("linux");
        install_nginx_conf(&defaults.nginx_conf_candidates[0], INSTALLED);
        install_nginx_conf(&defaults.nginx_conf_candidates[1], INSTALLED);

        let mut conf = Conf::default();
        defaults.apply(&mut conf).unwrap();
        assert_eq!(
            conf.nginx_conf_location,
            Some(defaults.nginx_conf_candidates[0].display().to_string())
        );
    }

    #[test]
    fn test_existing_template_is_never_regenerated() {
        let (_tmp, defaults) = scratch("linux");
        install_nginx_conf(&defaults.nginx_conf_candidates[1], INSTALLED);
        install_nginx_conf(&defaults.template_path, "operator template");

        let mut conf = Conf::default();
        defaults.apply(&mut conf).unwrap();
        assert_eq!(
            std::fs::read_to_string(&defaults.template_path).unwrap(),
            "operator template"
        );
    }

    #[test]
    fn test_no_http_block_skips_template() {
        let (_tmp, defaults) = scratch("linux");
        install_nginx_conf(&defaults.nginx_conf_candidates[1], "events {\n}\n");

        let mut conf = Conf::default();
        defaults.apply(&mut conf).unwrap();
        assert!(conf.nginx_conf_template.is_some());
        assert!(!defaults.template_path.exists());
    }

    #[test]
    fn test_custom_template_is_left_alone() {
        let (tmp, defaults) = scratch("linux");
        install_nginx_conf(&defaults.nginx_conf_candidates[1], INSTALLED);

        let mut conf = Conf {
            nginx_conf_template: Some(tmp.path().join("mine.tpl").display().to_string()),
            ..Default::default()
        };
        defaults.apply(&mut conf).unwrap();
        assert!(!defaults.template_path.exists());
    }

    #[test]
    fn test_load_or_init_saves_once() {
        let (_tmp, defaults) = scratch("linux");
        install_nginx_conf(&defaults.nginx_conf_candidates[1], INSTALLED);

        let conf = defaults.load_or_init().unwrap();
        assert!(defaults.conf_path.exists());
        let saved = std::fs::read_to_string(&defaults.conf_path).unwrap();

        let again = defaults.load_or_init().unwrap();
        assert_eq!(again, conf);
        assert_eq!(std::fs::read_to_string(&defaults.conf_path).unwrap(), saved);
    }
}
