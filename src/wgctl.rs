use async_trait::async_trait;
use cidr::IpCidr;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WgError {
    #[error("wg io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wg exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Capability seam over the running interface, so the lifecycle logic can
/// be exercised without a tunnel present.
#[async_trait]
pub trait WgControl: Send + Sync {
    async fn apply_peer_rule(&self, public_key: &str, allowed_ip: IpCidr) -> Result<(), WgError>;
    async fn remove_peer_rule(&self, public_key: &str) -> Result<(), WgError>;
}

/// Drives the live interface through wg(8).
pub struct WgCli {
    interface: String,
}

impl WgCli {
    pub fn new(interface: String) -> Self {
        Self { interface }
    }

    async fn run(&self, args: &[&str]) -> Result<(), WgError> {
        debug!("wg {}", args.join(" "));
        let status = Command::new("wg").args(args).status().await?;
        if !status.success() {
            return Err(WgError::Failed(status));
        }
        Ok(())
    }
}

#[async_trait]
impl WgControl for WgCli {
    async fn apply_peer_rule(&self, public_key: &str, allowed_ip: IpCidr) -> Result<(), WgError> {
        // alternate form keeps the /32 suffix on host-length cidrs
        let allowed_ip = format!("{allowed_ip:#}");
        self.run(&[
            "set",
            &self.interface,
            "peer",
            public_key,
            "allowed-ips",
            &allowed_ip,
        ])
        .await
    }

    async fn remove_peer_rule(&self, public_key: &str) -> Result<(), WgError> {
        self.run(&["set", &self.interface, "peer", public_key, "remove"])
            .await
    }
}
