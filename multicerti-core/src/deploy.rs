//! Safe deployment of the rendered nginx configuration
//!
//! A deployment goes through four stages:
//!
//! 1. **Rendering**: template plus virtual hosts, in memory only
//! 2. **Validating**: the text is staged next to the live file and checked
//!    with `nginx -qt -c <staged>`
//! 3. **Installing**: the staged file is renamed over the live one
//! 4. **Reloading**: reload nginx if it runs, start it otherwise
//!
//! A failure before stage 3 leaves the live configuration untouched.

use crate::command::{CommandError, CommandRunner};
use crate::config::ValidatedConf;
use crate::install::StagedFile;
use crate::render::{ConfigRenderer, RenderError};
use crate::vhost::Protocol;
use std::fmt;
use thiserror::Error;

/// Deployment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rendering,
    Validating,
    Installing,
    Reloading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Rendering => "rendering",
            Stage::Validating => "validating",
            Stage::Installing => "installing",
            Stage::Reloading => "reloading",
        };
        f.write_str(name)
    }
}

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to stage {path}: {source}")]
    Stage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("nginx rejected the rendered configuration: {0}")]
    Rejected(#[source] CommandError),

    #[error("Failed to install {path}: {source}")]
    Install {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start or reload nginx: {0}")]
    Reload(#[source] CommandError),

    #[error("Certificate issuance failed for: {}", .hosts.join(", "))]
    Issuance { hosts: Vec<String> },
}

impl DeployError {
    /// Stage the deployment stopped at, if it stopped in one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DeployError::Render(_) => Some(Stage::Rendering),
            DeployError::Stage { .. } | DeployError::Rejected(_) => Some(Stage::Validating),
            DeployError::Install { .. } => Some(Stage::Installing),
            DeployError::Reload(_) => Some(Stage::Reloading),
            DeployError::Issuance { .. } => None,
        }
    }
}

/// 🚀 Renders, checks, installs and reloads
pub struct Deployer<'a, R> {
    conf: &'a ValidatedConf,
    runner: R,
}

impl<'a, R: CommandRunner> Deployer<'a, R> {
    pub fn new(conf: &'a ValidatedConf, runner: R) -> Self {
        Self { conf, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Render without touching anything
    pub fn render(&self) -> Result<String, RenderError> {
        ConfigRenderer::from_conf(self.conf).render()
    }

    /// Render, check, install and reload once
    pub fn update_conf(&self) -> Result<(), DeployError> {
        let location = &self.conf.nginx_conf_location;

        tracing::info!("🎨 Stage {}", Stage::Rendering);
        let text = self.render()?;

        tracing::info!("🔍 Stage {}", Stage::Validating);
        let staged = StagedFile::new(location, text.as_bytes()).map_err(|source| {
            DeployError::Stage {
                path: location.display().to_string(),
                source,
            }
        })?;
        let check = vec![
            self.conf.nginx.clone(),
            "-qt".to_string(),
            "-c".to_string(),
            staged.path().display().to_string(),
        ];
        if let Err(e) = self.runner.run(&check) {
            tracing::error!(
                "❌ nginx rejected the new configuration, {} left as is",
                staged.target().display()
            );
            return Err(DeployError::Rejected(e));
        }

        tracing::info!("💾 Stage {}", Stage::Installing);
        staged.install().map_err(|source| DeployError::Install {
            path: location.display().to_string(),
            source,
        })?;

        tracing::info!("🔄 Stage {}", Stage::Reloading);
        self.reload()?;

        tracing::info!("✅ Deployed {}", location.display());
        Ok(())
    }

    /// Reload nginx if the status command succeeds, start it otherwise
    fn reload(&self) -> Result<(), DeployError> {
        let commands = &self.conf.commands;
        let next = match self.runner.run(&commands.status) {
            Ok(()) => &commands.reload,
            Err(e) => {
                tracing::warn!("⚠️ nginx does not seem to run ({}), starting it", e);
                &commands.start
            }
        };
        self.runner.run(next).map_err(DeployError::Reload)
    }

    /// Ask certbot for a certificate for every https host.
    ///
    /// Every host is attempted; the returned list names the hosts (by
    /// domain list) whose request failed.
    pub fn issue_certificates(&self) -> Vec<String> {
        let mut failed = Vec::new();

        for vhost in &self.conf.vhosts {
            if !vhost.serves(Protocol::Https) {
                continue;
            }
            let label = vhost.domains().join(",");
            let Some(request) = vhost.certbot_request(&self.conf.certbot) else {
                tracing::warn!("⚠️ No registration email for {}, skipping", label);
                failed.push(label);
                continue;
            };

            let webroot = vhost.webroot();
            if let Err(e) = std::fs::create_dir_all(&webroot) {
                tracing::warn!("⚠️ Cannot create {}: {}", webroot.display(), e);
                failed.push(label);
                continue;
            }

            tracing::info!("🔐 Requesting a certificate for {}", label);
            match self.runner.run(&request.argv()) {
                Ok(()) => tracing::info!("📜 Certificate issued for {}", label),
                Err(e) => {
                    tracing::warn!("⚠️ Issuance failed for {}: {}", label, e);
                    failed.push(label);
                }
            }
        }

        failed
    }

    /// Deploy, request certificates, deploy again.
    ///
    /// The first deployment makes the challenge paths reachable. The second
    /// one picks up whatever certificates now exist on disk, even when some
    /// requests failed; those failures are reported afterwards.
    pub fn update_certs(&self) -> Result<(), DeployError> {
        self.update_conf()?;
        let failed = self.issue_certificates();
        self.update_conf()?;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DeployError::Issuance { hosts: failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_of_errors() {
        let rejected = DeployError::Rejected(CommandError::Failed {
            command: "nginx -qt".to_string(),
            code: Some(1),
        });
        assert_eq!(rejected.stage(), Some(Stage::Validating));

        let issuance = DeployError::Issuance {
            hosts: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        };
        assert_eq!(issuance.stage(), None);
        assert_eq!(
            issuance.to_string(),
            "Certificate issuance failed for: a.example.com, b.example.com"
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Validating.to_string(), "validating");
        assert_eq!(Stage::Reloading.to_string(), "reloading");
    }
}
