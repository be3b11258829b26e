pub mod client;
pub mod keys;
mod peers;

pub use peers::*;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::{
    config::Config,
    database::{Database, DatabaseError},
    wgconf::{ServerConfig, WgConfError},
    wgctl::{WgControl, WgError},
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Wg(#[from] WgError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    ServerConfig(#[from] WgConfError),
    #[error("peer not found: {0:?}")]
    NotFound(String),
    #[error("address {0:?} from template is not an ip address")]
    InvalidAddress(String),
    #[error("client config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("qr encode error: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

struct Shared {
    server: ServerConfig,
    wg: Box<dyn WgControl>,
}

/// Context for the peer lifecycle operations. One CLI invocation builds
/// exactly one of these and runs exactly one operation against it.
pub struct PeerManager {
    config: Config,
    database: Database,

    shared: Arc<Mutex<Shared>>,
}

impl PeerManager {
    #[instrument(skip(config, database, wg))]
    pub async fn new(
        config: Config,
        database: Database,
        wg: Box<dyn WgControl>,
    ) -> Result<Self, ServiceError> {
        let server = ServerConfig::load(config.server_config_path()).await?;

        Ok(Self {
            config,
            database,
            shared: Arc::new(Mutex::new(Shared { server, wg })),
        })
    }
}
