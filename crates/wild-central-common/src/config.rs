//! The configuration document
//!
//! Field names follow the on-disk YAML (camelCase). Every field is optional in
//! the document: a missing value decodes as empty and is only meaningful once
//! something tries to render or provision from it.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Listener host used when the document leaves `server.host` empty
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Listener port used when the document leaves `server.port` unset
pub const DEFAULT_PORT: u16 = 5055;

/// Setup phase of the cluster, as tracked by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Infrastructure,
    Cluster,
    Apps,
}

impl Phase {
    const NAMES: &'static [&'static str] = &["setup", "infrastructure", "cluster", "apps"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Infrastructure => "infrastructure",
            Phase::Cluster => "cluster",
            Phase::Apps => "apps",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "setup" => Some(Phase::Setup),
            "infrastructure" => Some(Phase::Infrastructure),
            "cluster" => Some(Phase::Cluster),
            "apps" => Some(Phase::Apps),
            _ => None,
        }
    }
}

// Blank or null means no phase. Anything else must name a known phase.
fn parse_phase<E: de::Error>(raw: Option<String>) -> Result<Option<Phase>, E> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => Phase::from_name(name)
            .map(Some)
            .ok_or_else(|| E::unknown_variant(name, Phase::NAMES)),
    }
}

fn optional_phase<'de, D>(deserializer: D) -> Result<Option<Phase>, D::Error>
where
    D: Deserializer<'de>,
{
    parse_phase(Option::<String>::deserialize(deserializer)?)
}

fn phase_list<'de, D>(deserializer: D) -> Result<Vec<Phase>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    let mut phases = Vec::with_capacity(raw.len());
    for entry in raw {
        if let Some(phase) = parse_phase(entry)? {
            phases.push(phase);
        }
    }
    Ok(phases)
}

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wildcloud: WildcloudConfig,
    pub server: ServerConfig,
    pub cloud: CloudConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WildcloudConfig {
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "optional_phase")]
    pub current_phase: Option<Phase>,
    #[serde(deserialize_with = "phase_list")]
    pub completed_phases: Vec<Phase>,
}

/// Where the daemon's own HTTP listener binds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudConfig {
    pub domain: String,
    pub internal_domain: String,
    pub dns: HostAddress,
    pub router: HostAddress,
    pub dhcp_range: String,
    pub dnsmasq: DnsmasqSettings,
}

/// A single address nested under its own key (`dns: {ip: ...}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostAddress {
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsmasqSettings {
    pub interface: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterConfig {
    pub endpoint_ip: String,
    pub nodes: NodesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    pub talos: TalosConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalosConfig {
    pub version: String,
}

impl Config {
    /// A configuration is usable once domain, DNS address and Talos version
    /// are all set. Everything else may still be empty.
    pub fn is_usable(&self) -> bool {
        !self.cloud.domain.is_empty()
            && !self.cloud.dns.ip.is_empty()
            && !self.cluster.nodes.talos.version.is_empty()
    }

    /// Fill in the listener defaults if the document left them unset
    pub fn apply_defaults(&mut self) {
        if self.server.port == 0 {
            self.server.port = DEFAULT_PORT;
        }
        if self.server.host.is_empty() {
            self.server.host = DEFAULT_HOST.to_string();
        }
    }

    /// `host:port` for the HTTP listener
    pub fn listen_addr(&self) -> String {
        let host = if self.server.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.server.host
        };
        let port = if self.server.port == 0 {
            DEFAULT_PORT
        } else {
            self.server.port
        };
        format!("{}:{}", host, port)
    }

    pub fn domain(&self) -> &str {
        &self.cloud.domain
    }

    pub fn dns_ip(&self) -> &str {
        &self.cloud.dns.ip
    }

    pub fn talos_version(&self) -> &str {
        &self.cluster.nodes.talos.version
    }
}

/// Usability of a configuration that may not exist at all
pub fn is_usable(config: Option<&Config>) -> bool {
    config.map(Config::is_usable).unwrap_or(false)
}
