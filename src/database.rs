use std::{fmt, net::IpAddr, str::FromStr};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("migrate error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid address data")]
    InvalidAddressData,
}

/// One row per named peer. The private key never reaches this store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub host_id: u32,
    pub name: String,
    pub public_key: String,
    pub address: IpAddr,
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.address, self.public_key)
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

type Result<T> = std::result::Result<T, DatabaseError>;

impl Database {
    pub async fn new(connstr: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str(connstr)?.create_if_missing(true))
            .await?;
        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn peer_by_name(&self, name: &str) -> Result<Option<PeerRecord>> {
        let row = sqlx::query("SELECT host_id, name, pub_key, addr FROM peers WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(record_from_row).transpose()
    }

    /// All records, oldest insertion first. Allocation depends on this order.
    pub async fn peers(&self) -> Result<Vec<PeerRecord>> {
        let rows = sqlx::query("SELECT host_id, name, pub_key, addr FROM peers ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    pub async fn add_peer(&self, record: &PeerRecord) -> Result<()> {
        let addr = record.address.to_string();
        sqlx::query("INSERT INTO peers(host_id, name, pub_key, addr) VALUES($1, $2, $3, $4)")
            .bind(record.host_id as i64)
            .bind(&record.name)
            .bind(&record.public_key)
            .bind(addr)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_peer(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM peers WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn record_from_row(row: SqliteRow) -> Result<PeerRecord> {
    let addr: String = row.try_get("addr")?;

    Ok(PeerRecord {
        host_id: row.try_get::<i64, _>("host_id")? as u32,
        name: row.try_get("name")?,
        public_key: row.try_get("pub_key")?,
        address: addr
            .parse()
            .map_err(|_| DatabaseError::InvalidAddressData)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host_id: u32, name: &str) -> PeerRecord {
        PeerRecord {
            host_id,
            name: name.to_owned(),
            public_key: format!("{name}-pub="),
            address: format!("10.0.0.{host_id}").parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn records_come_back_in_insertion_order() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.add_peer(&record(2, "alice")).await.unwrap();
        db.add_peer(&record(4, "bob")).await.unwrap();

        let peers = db.peers().await.unwrap();
        assert_eq!(peers, vec![record(2, "alice"), record(4, "bob")]);
    }

    #[tokio::test]
    async fn lookup_by_name() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.add_peer(&record(2, "alice")).await.unwrap();

        assert_eq!(
            db.peer_by_name("alice").await.unwrap(),
            Some(record(2, "alice"))
        );
        assert_eq!(db.peer_by_name("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn removed_records_stay_gone() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.add_peer(&record(2, "alice")).await.unwrap();
        db.remove_peer("alice").await.unwrap();

        assert_eq!(db.peer_by_name("alice").await.unwrap(), None);
        assert!(db.peers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.add_peer(&record(2, "alice")).await.unwrap();

        let err = db.add_peer(&record(4, "alice")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlx(_)));
    }
}
