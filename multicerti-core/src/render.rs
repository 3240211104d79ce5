//! Rendering the nginx configuration from the template and the virtual hosts

use crate::config::ValidatedConf;
use crate::vhost::VirtualHost;
use multicerti_config::writer::write_node;
use multicerti_config::{load_template, parse, LoadError, ParseError, SlotValues};
use std::path::Path;
use thiserror::Error;

/// Rendering failures; nothing on disk has been touched when one occurs
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] LoadError),

    #[error("Rendered configuration does not parse: {source}")]
    Syntax {
        #[source]
        source: ParseError,
        /// The text that failed to parse
        text: String,
    },
}

impl RenderError {
    /// Human readable report, with a source excerpt for syntax errors
    pub fn report(&self) -> String {
        match self {
            RenderError::Syntax { source, text } => source.report(text),
            other => other.to_string(),
        }
    }
}

/// Fills the template with the blocks of every virtual host
#[derive(Debug, Clone, Copy)]
pub struct ConfigRenderer<'a> {
    template: &'a Path,
    vhosts: &'a [VirtualHost],
}

impl<'a> ConfigRenderer<'a> {
    pub fn new(template: &'a Path, vhosts: &'a [VirtualHost]) -> Self {
        Self { template, vhosts }
    }

    pub fn from_conf(conf: &'a ValidatedConf) -> Self {
        Self::new(&conf.nginx_conf_template, &conf.vhosts)
    }

    /// Upstream blocks, then every port 80 server, then every port 443 server.
    ///
    /// Certificate presence is checked again on every call.
    pub fn slot_values(&self) -> SlotValues {
        let mut values = SlotValues::default();

        for vhost in self.vhosts {
            if let Some(upstream) = vhost.upstream_block() {
                values.upstreams.push_str(&write_node(&upstream, 1));
            }
        }
        for vhost in self.vhosts {
            values.servers.push_str(&write_node(&vhost.plain_server_block(), 1));
        }
        for vhost in self.vhosts {
            if let Some(server) = vhost.encrypted_server_block() {
                values.servers.push_str(&write_node(&server, 1));
            }
        }

        values
    }

    /// 🎨 Render the complete configuration.
    ///
    /// The template is read from disk each time. The filled text is parsed
    /// and written back out, so the result is normalized and a slot value
    /// that breaks the block structure fails here instead of in nginx.
    pub fn render(&self) -> Result<String, RenderError> {
        let template = load_template(self.template)?;
        let text = template.fill(&self.slot_values());

        let tree = match parse(&text) {
            Ok(tree) => tree,
            Err(source) => {
                tracing::error!("❌ Rendered configuration does not parse: {}", source);
                return Err(RenderError::Syntax { source, text });
            }
        };

        tracing::debug!(
            "🎨 Rendered {} virtual host(s) from {}",
            self.vhosts.len(),
            self.template.display()
        );
        Ok(tree.to_string())
    }
}
