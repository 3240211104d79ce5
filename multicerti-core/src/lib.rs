//! Multicerti Core
//!
//! Virtual hosts, nginx configuration rendering and safe deployment,
//! including the two-phase certificate workflow:
//!
//! 1. Deploy with port 80 servers only, so HTTP-01 challenges can be served
//! 2. Run certbot for every https host
//! 3. Deploy again; hosts whose certificate now exists get their 443 server

pub mod command;
pub mod config;
pub mod deploy;
pub mod error;
pub mod install;
pub mod render;
pub mod vhost;

pub use command::{CommandError, CommandRunner, SystemRunner};
pub use config::{validate, Conf, ConfLoader, Defaults, ValidatedConf, ValidationErrors};
pub use deploy::{DeployError, Deployer, Stage};
pub use error::{Error, Result};
pub use render::{ConfigRenderer, RenderError};
pub use vhost::{HostIds, HostSettings, Protocol, Target, VhostError, VirtualHost};
