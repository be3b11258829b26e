use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use qrcode::{render::unicode, QrCode};

use super::ServiceError;
use crate::{config::Config, database::PeerRecord};

/// Rendered client-side config. It carries the peer's private key, so it
/// only lives for the duration of an add and its artifacts are written
/// with mode 0o400.
pub struct ClientConfig {
    lines: Vec<String>,
}

impl ClientConfig {
    pub fn generate(record: &PeerRecord, private_key: &str, config: &Config) -> Self {
        let mut lines = vec![
            "[Interface]".to_owned(),
            format!("Address = {}", record.address),
            format!("PrivateKey = {private_key}"),
        ];
        if let Some(dns) = &config.dns {
            lines.push(format!("DNS = {dns}"));
        }
        lines.extend([
            String::new(),
            "[Peer]".to_owned(),
            format!("PublicKey = {}", config.public_key),
            format!("AllowedIPs = {}", config.allowed_ips),
            format!("Endpoint = {}", config.endpoint),
            "PersistentKeepalive = 25".to_owned(),
        ]);

        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// The whole config as a scannable QR code, drawn with half-block
    /// characters.
    pub fn qr_text(&self) -> Result<String, ServiceError> {
        let code = QrCode::new(self.lines().join("\n").as_bytes())?;
        Ok(code.render::<unicode::Dense1x2>().build())
    }

    pub async fn write_restricted(&self, path: impl AsRef<Path>) -> Result<(), ServiceError> {
        write_restricted(path.as_ref(), self.render()).await
    }

    pub async fn write_qr_restricted(&self, path: impl AsRef<Path>) -> Result<(), ServiceError> {
        write_restricted(path.as_ref(), self.qr_text()?).await
    }
}

async fn write_restricted(path: &Path, data: String) -> Result<(), ServiceError> {
    tokio::fs::write(path, data).await?;
    tokio::fs::set_permissions(path, Permissions::from_mode(0o400)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(dns: Option<&str>) -> Config {
        Config {
            interface: "wg0".to_owned(),
            server_config: None,
            client_configs_path: PathBuf::from("/tmp"),
            client_config_prefix: None,
            public_key: "server-pub=".to_owned(),
            allowed_ips: "0.0.0.0/0, ::/0".to_owned(),
            endpoint: "vpn.example.com:51820".to_owned(),
            dns: dns.map(str::to_owned),
            address_template: "10.0.0.{}".to_owned(),
            start_host_id: None,
            database: "peers.db".to_owned(),
        }
    }

    fn record() -> PeerRecord {
        PeerRecord {
            host_id: 2,
            name: "alice".to_owned(),
            public_key: "alice-pub=".to_owned(),
            address: "10.0.0.2".parse().unwrap(),
        }
    }

    #[test]
    fn renders_interface_and_peer_sections() {
        let rendered = ClientConfig::generate(&record(), "alice-priv=", &config(None)).render();

        assert_eq!(
            rendered,
            "[Interface]\n\
Address = 10.0.0.2\n\
PrivateKey = alice-priv=\n\
\n\
[Peer]\n\
PublicKey = server-pub=\n\
AllowedIPs = 0.0.0.0/0, ::/0\n\
Endpoint = vpn.example.com:51820\n\
PersistentKeepalive = 25\n"
        );
    }

    #[test]
    fn dns_line_appears_only_when_configured() {
        let without = ClientConfig::generate(&record(), "k=", &config(None));
        assert!(!without.render().contains("DNS"));

        let with = ClientConfig::generate(&record(), "k=", &config(Some("10.0.0.1")));
        assert_eq!(with.lines()[3], "DNS = 10.0.0.1");
    }

    #[test]
    fn qr_code_renders() {
        let client = ClientConfig::generate(&record(), "k=", &config(None));
        let qr = client.qr_text().unwrap();
        assert!(!qr.is_empty());
    }
}
