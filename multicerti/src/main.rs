//! Multicerti - certificates and an nginx reverse proxy for many domains
//!
//! This is the main entry point for the multicerti CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use multicerti_config::derive_template;
use multicerti_core::config::{ConfLoader, Defaults, ValidatedConf};
use multicerti_core::render::RenderError;
use multicerti_core::{
    validate, Conf, DeployError, Deployer, Protocol, SystemRunner, Target, VirtualHost,
};
use multicerti_tls::inspect::{inspect_bundle, unix_now, CertificateInfo};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "multicerti")]
#[command(author, version, about = "Let's Encrypt certificates and nginx reverse proxy configuration for many domains", long_about = None)]
struct Cli {
    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration document (default: /usr/local/etc/multicerti/multicerti.conf)
    #[arg(short, long, global = true, value_name = "PATH")]
    conf: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render, check and install the nginx configuration, then reload nginx
    UpdateConf,

    /// Deploy, request missing certificates, then deploy again with https
    UpdateCerts,

    /// Print the rendered nginx configuration
    Render,

    /// Print a template derived from an installed nginx configuration
    Template {
        /// Installed configuration (default: the document's nginx_conf_location)
        #[arg(long, value_name = "PATH")]
        from: Option<PathBuf>,
    },

    /// Validate the configuration document
    Validate,

    /// Show virtual hosts and the state of their certificates
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Certificate state of one host, as shown by `status`
#[derive(Serialize)]
struct HostStatus {
    id: u64,
    domains: Vec<String>,
    protocols: Vec<String>,
    target: String,
    master_domain: String,
    certificate: CertState,
}

#[derive(Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum CertState {
    /// The host does not serve https
    NotRequested,
    /// No bundle on disk yet
    Missing,
    Present {
        #[serde(flatten)]
        info: CertificateInfo,
        remaining_days: i64,
        renewal_due: bool,
        /// Every configured domain is among the certificate's names
        covers_domains: bool,
    },
    Unreadable {
        error: String,
    },
}

impl CertState {
    fn of(vhost: &VirtualHost, conf: &ValidatedConf, now: i64) -> Self {
        if !vhost.serves(Protocol::Https) {
            return CertState::NotRequested;
        }
        if !vhost.has_certificate() {
            return CertState::Missing;
        }
        match inspect_bundle(&conf.layout.paths(vhost.master_domain())) {
            Ok(info) => CertState::Present {
                remaining_days: info.remaining_days(now),
                renewal_due: info.needs_renewal(now),
                covers_domains: info.covers(vhost.domains()),
                info,
            },
            Err(e) => CertState::Unreadable {
                error: e.to_string(),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            CertState::NotRequested => "not requested (http only)".to_string(),
            CertState::Missing => "⏳ not issued yet".to_string(),
            CertState::Present {
                info,
                covers_domains: false,
                ..
            } => format!(
                "⚠️ issued for {} only, run update-certs",
                info.dns_names.join(" ")
            ),
            CertState::Present {
                remaining_days,
                renewal_due: true,
                ..
            } => format!("⏰ renewal due ({} days left)", remaining_days),
            CertState::Present {
                info,
                remaining_days,
                ..
            } => format!("✅ valid ({} days left, {})", remaining_days, info.issuer),
            CertState::Unreadable { error } => format!("⚠️ unreadable: {}", error),
        }
    }
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::Backends(backends) => format!("proxy to {}", backends.join(", ")),
        Target::Redirect(url) => format!("redirect to {}", url),
        Target::Root(root) => format!("files from {}", root),
    }
}

fn host_status(vhost: &VirtualHost, conf: &ValidatedConf, now: i64) -> HostStatus {
    HostStatus {
        id: vhost.id(),
        domains: vhost.domains().to_vec(),
        protocols: vhost.protocols().iter().map(|p| p.to_string()).collect(),
        target: describe_target(vhost.target()),
        master_domain: vhost.master_domain().to_string(),
        certificate: CertState::of(vhost, conf, now),
    }
}

/// Load the document given on the command line, or the default one with
/// defaults filled in
fn load_conf(path: Option<&Path>) -> anyhow::Result<Conf> {
    match path {
        Some(path) => ConfLoader::load(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => Defaults::default()
            .load_or_init()
            .context("Failed to prepare the default configuration"),
    }
}

fn load_validated(path: Option<&Path>) -> anyhow::Result<ValidatedConf> {
    match path {
        Some(path) => Ok(multicerti_core::config::load_validated(path)?),
        None => Ok(validate(&load_conf(None)?)?),
    }
}

/// Print the source excerpt of a syntax error before failing with it
fn report_deploy_error(err: DeployError) -> anyhow::Error {
    if let DeployError::Render(render @ RenderError::Syntax { .. }) = &err {
        eprintln!("{}", render.report());
    }
    err.into()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }
    let conf_path = cli.conf.as_deref();

    match cli.command {
        Commands::UpdateConf => {
            let conf = load_validated(conf_path)?;
            Deployer::new(&conf, SystemRunner)
                .update_conf()
                .map_err(report_deploy_error)?;
            println!("✅ nginx configuration updated");
        }

        Commands::UpdateCerts => {
            let conf = load_validated(conf_path)?;
            Deployer::new(&conf, SystemRunner)
                .update_certs()
                .map_err(report_deploy_error)?;
            println!("✅ Certificates and nginx configuration updated");
        }

        Commands::Render => {
            let conf = load_validated(conf_path)?;
            let rendered = Deployer::new(&conf, SystemRunner).render().map_err(|e| {
                if matches!(e, RenderError::Syntax { .. }) {
                    eprintln!("{}", e.report());
                }
                e
            })?;
            print!("{}", rendered);
        }

        Commands::Template { from } => {
            let installed = match from {
                Some(path) => path,
                None => load_conf(conf_path)?
                    .nginx_conf_location
                    .map(PathBuf::from)
                    .context("No --from given and no nginx_conf_location in the configuration")?,
            };
            let source = std::fs::read_to_string(&installed)
                .with_context(|| format!("Failed to read {}", installed.display()))?;

            match derive_template(&source) {
                Ok(Some(template)) => print!("{}", template),
                Ok(None) => anyhow::bail!("{} has no http block", installed.display()),
                Err(e) => {
                    eprintln!("{}", e.report(&source));
                    return Err(e)
                        .with_context(|| format!("Failed to parse {}", installed.display()));
                }
            }
        }

        Commands::Validate => {
            let conf = load_validated(conf_path)?;
            println!("✅ Configuration is valid: {} virtual host(s)", conf.vhosts.len());
            for vhost in &conf.vhosts {
                println!(
                    "  #{} {} [{}] {}",
                    vhost.id(),
                    vhost.domains().join(" "),
                    vhost
                        .protocols()
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    describe_target(vhost.target())
                );
            }
        }

        Commands::Status { json } => {
            let conf = load_validated(conf_path)?;
            let now = unix_now();
            let hosts: Vec<HostStatus> = conf
                .vhosts
                .iter()
                .map(|vhost| host_status(vhost, &conf, now))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&hosts)?);
            } else {
                for host in &hosts {
                    println!("🏠 {} [{}]", host.domains.join(" "), host.protocols.join(", "));
                    println!("   {}", host.target);
                    println!("   master domain: {}", host.master_domain);
                    println!("   certificate:   {}", host.certificate.describe());
                }
            }
        }

        Commands::Version => {
            println!("multicerti v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_names() {
        let cli = Cli::try_parse_from(["multicerti", "-c", "/tmp/m.conf", "update-certs"]).unwrap();
        assert!(matches!(cli.command, Commands::UpdateCerts));
        assert_eq!(cli.conf, Some(PathBuf::from("/tmp/m.conf")));

        let cli = Cli::try_parse_from([
            "multicerti",
            "template",
            "--from",
            "/etc/nginx/nginx.conf",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Template { from: Some(_) }));
    }

    #[test]
    fn test_cert_state_json() {
        let state = CertState::Missing;
        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"state":"missing"}"#);
    }

    fn present(dns_names: &[&str], covers_domains: bool) -> CertState {
        CertState::Present {
            info: CertificateInfo {
                subject: "CN=example.com".to_string(),
                issuer: "CN=R11, O=Let's Encrypt, C=US".to_string(),
                dns_names: dns_names.iter().map(|s| s.to_string()).collect(),
                not_after: 90 * 86_400,
                chain_len: 2,
            },
            remaining_days: 90,
            renewal_due: false,
            covers_domains,
        }
    }

    #[test]
    fn test_present_certificate_reporting() {
        let state = present(&["example.com", "www.example.com"], true);
        assert_eq!(state.describe(), "✅ valid (90 days left, CN=R11, O=Let's Encrypt, C=US)");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "present");
        assert_eq!(json["issuer"], "CN=R11, O=Let's Encrypt, C=US");
        assert_eq!(json["covers_domains"], true);

        let state = present(&["example.com"], false);
        assert!(state.describe().contains("issued for example.com only"));
    }
}
