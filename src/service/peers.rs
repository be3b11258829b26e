use std::net::IpAddr;

use cidr::IpCidr;
use tracing::instrument;

use super::{client::ClientConfig, keys::Keypair, PeerManager, ServiceError};
use crate::database::{DatabaseError, PeerRecord};

/// Identifiers advance in steps of two; only the starting point is
/// configurable.
const HOST_ID_STEP: u32 = 2;
const DEFAULT_START_HOST_ID: u32 = 2;

/// Next free host identifier, derived from the most recently inserted
/// record rather than the numeric maximum. After an out-of-order delete
/// this can re-issue an identifier an earlier record once held.
pub fn next_host_id(records: &[PeerRecord], start: u32) -> u32 {
    match records.last() {
        Some(last) => last.host_id + HOST_ID_STEP,
        None => start,
    }
}

#[derive(Debug)]
pub enum AddOutcome {
    Added(PeerRecord),
    AlreadyExists,
}

impl PeerManager {
    /// Allocates identity for a new peer and pushes it everywhere it has
    /// to exist, in order: server config, client config file, running
    /// interface, record store, QR artifact. External state is written
    /// before the store record, so a crash mid-way leaves the interface
    /// ahead of the store and wants manual reconciliation.
    #[instrument(skip(self))]
    pub async fn add(&self, name: &str) -> Result<AddOutcome, ServiceError> {
        if self.database.peer_by_name(name).await?.is_some() {
            return Ok(AddOutcome::AlreadyExists);
        }

        let keypair = Keypair::generate();

        let records = self.database.peers().await?;
        let start = self.config.start_host_id.unwrap_or(DEFAULT_START_HOST_ID);
        let host_id = next_host_id(&records, start);

        let address = self.config.client_address(host_id);
        let address: IpAddr = address
            .parse()
            .map_err(|_| ServiceError::InvalidAddress(address.clone()))?;
        let allowed = IpCidr::new_host(address);

        let record = PeerRecord {
            host_id,
            name: name.to_owned(),
            public_key: keypair.public.clone(),
            address,
        };

        {
            let mut shared = self.shared.lock().await;
            shared
                .server
                .add_peer(&record.public_key, name, &format!("{allowed:#}"));
            shared.server.commit().await?;
        }

        let client = ClientConfig::generate(&record, &keypair.private, &self.config);
        client
            .write_restricted(self.config.client_file(name, "conf"))
            .await?;

        self.shared
            .lock()
            .await
            .wg
            .apply_peer_rule(&record.public_key, allowed)
            .await?;

        // the private key stays out of the store
        match self.database.add_peer(&record).await {
            Ok(()) => {}
            Err(DatabaseError::Sqlx(s))
                if Some("2067") == s.as_database_error().and_then(|e| e.code()).as_deref() =>
            {
                return Ok(AddOutcome::AlreadyExists)
            }
            Err(e) => Err(e)?,
        }

        client
            .write_qr_restricted(self.config.client_file(name, "qrcode"))
            .await?;

        Ok(AddOutcome::Added(record))
    }

    /// Re-applies the stored allowed-address rule to the running
    /// interface, e.g. after the interface was recreated.
    #[instrument(skip(self))]
    pub async fn update(&self, name: &str) -> Result<PeerRecord, ServiceError> {
        let record = self
            .database
            .peer_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(name.to_owned()))?;

        self.shared
            .lock()
            .await
            .wg
            .apply_peer_rule(&record.public_key, IpCidr::new_host(record.address))
            .await?;

        Ok(record)
    }

    /// Removes the peer from the interface and the server config before
    /// dropping the store record, mirroring add in reverse. Client
    /// artifacts are left on disk.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        let record = self
            .database
            .peer_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(name.to_owned()))?;

        {
            let mut shared = self.shared.lock().await;
            shared.wg.remove_peer_rule(&record.public_key).await?;
            shared.server.remove_peer(&record.public_key);
            shared.server.commit().await?;
        }

        self.database.remove_peer(name).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .database
            .peers()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }
}
