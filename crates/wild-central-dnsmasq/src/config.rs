//! dnsmasq config rendering
//!
//! The template is fixed; every value comes straight from the cluster
//! configuration. Empty fields are rendered as empty strings, there is no
//! partial-config guard at this level.

use crate::error::{DnsmasqError, Result};
use crate::service::RestartCommand;
use minijinja::Environment;
use serde::Serialize;
use std::path::Path;
use tracing::info;
use wild_central_common::Config;

/// DHCP lease duration handed out for the configured range
pub const LEASE_DURATION: &str = "12h";

/// Upstream resolvers for everything outside the local domains
pub const UPSTREAM_RESOLVERS: &[&str] = &["1.1.1.1", "8.8.8.8"];

/// Directory dnsmasq's built-in TFTP server serves loaders from
pub const TFTP_ROOT: &str = "/var/ftpd";

const DNSMASQ_TEMPLATE: &str = r#"# Configuration file for dnsmasq.

# Basic Settings
interface={{ interface }}
listen-address={{ dns_ip }}
domain-needed
bogus-priv
no-resolv

# DNS Local Resolution - Central server handles these domains authoritatively
local=/{{ domain }}/
address=/{{ domain }}/{{ endpoint_ip }}
local=/{{ internal_domain }}/
address=/{{ internal_domain }}/{{ endpoint_ip }}
{% for resolver in upstream_resolvers %}server={{ resolver }}
{% endfor %}
# --- DHCP Settings ---
dhcp-range={{ dhcp_range }},{{ lease_duration }}
dhcp-option=3,{{ router_ip }}
dhcp-option=6,{{ dns_ip }}

# --- PXE Booting ---
enable-tftp
tftp-root={{ tftp_root }}

dhcp-match=set:efi-x86_64,option:client-arch,7
dhcp-boot=tag:efi-x86_64,ipxe.efi
dhcp-boot=tag:!efi-x86_64,undionly.kpxe

dhcp-match=set:efi-arm64,option:client-arch,11
dhcp-boot=tag:efi-arm64,ipxe-arm64.efi

dhcp-userclass=set:ipxe,iPXE
dhcp-boot=tag:ipxe,http://{{ dns_ip }}/boot.ipxe

log-queries
log-dhcp
"#;

/// Named values interpolated into the template
#[derive(Debug, Serialize)]
struct TemplateContext<'a> {
    interface: &'a str,
    dns_ip: &'a str,
    domain: &'a str,
    internal_domain: &'a str,
    endpoint_ip: &'a str,
    dhcp_range: &'a str,
    router_ip: &'a str,
    lease_duration: &'static str,
    upstream_resolvers: &'static [&'static str],
    tftp_root: &'static str,
}

impl<'a> TemplateContext<'a> {
    fn from_config(config: &'a Config) -> Self {
        Self {
            interface: &config.cloud.dnsmasq.interface,
            dns_ip: &config.cloud.dns.ip,
            domain: &config.cloud.domain,
            internal_domain: &config.cloud.internal_domain,
            endpoint_ip: &config.cluster.endpoint_ip,
            dhcp_range: &config.cloud.dhcp_range,
            router_ip: &config.cloud.router.ip,
            lease_duration: LEASE_DURATION,
            upstream_resolvers: UPSTREAM_RESOLVERS,
            tftp_root: TFTP_ROOT,
        }
    }
}

/// Renders, writes and applies the dnsmasq configuration
#[derive(Debug, Clone, Default)]
pub struct DnsmasqGenerator {
    pub(crate) restart: RestartCommand,
}

impl DnsmasqGenerator {
    /// Generator using the default systemd restart command
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different command to restart the service
    pub fn with_restart_command(mut self, restart: RestartCommand) -> Self {
        self.restart = restart;
        self
    }

    /// Render the dnsmasq configuration for `config`
    pub fn generate(&self, config: &Config) -> Result<String> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        let rendered = env.render_str(DNSMASQ_TEMPLATE, TemplateContext::from_config(config))?;
        Ok(rendered)
    }

    /// Render and overwrite the file at `path`
    pub async fn write_config(&self, config: &Config, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.generate(config)?;

        info!(path = %path.display(), "Writing dnsmasq config");
        tokio::fs::write(path, content)
            .await
            .map_err(|source| DnsmasqError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}
