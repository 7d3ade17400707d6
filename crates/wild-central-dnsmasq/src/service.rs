//! Restarting the dnsmasq service

use crate::config::DnsmasqGenerator;
use crate::error::{DnsmasqError, Result};
use tokio::process::Command;
use tracing::{error, info};

/// systemd unit dnsmasq runs as
pub const DNSMASQ_SERVICE: &str = "dnsmasq.service";

/// External command that restarts dnsmasq. Success or failure is all it
/// reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for RestartCommand {
    fn default() -> Self {
        Self {
            program: "sudo".to_string(),
            args: vec![
                "/usr/bin/systemctl".to_string(),
                "restart".to_string(),
                DNSMASQ_SERVICE.to_string(),
            ],
        }
    }
}

impl RestartCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Command line as a single string, for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl DnsmasqGenerator {
    /// Restart dnsmasq. Failures are reported, never retried.
    pub async fn restart_service(&self) -> Result<()> {
        let command = self.restart.display();
        info!(command = %command, "Restarting dnsmasq");

        let output = Command::new(&self.restart.program)
            .args(&self.restart.args)
            .output()
            .await
            .map_err(|source| DnsmasqError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(command = %command, status = %output.status, stderr = %stderr.trim(), "dnsmasq restart failed");
            return Err(DnsmasqError::Restart {
                command,
                status: output.status.to_string(),
            });
        }

        info!("dnsmasq restarted");
        Ok(())
    }
}
