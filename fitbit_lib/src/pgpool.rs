use deadpool_postgres::{Client, Config, Pool};
use std::{fmt, sync::Arc};
use tokio_postgres::{Config as PgConfig, NoTls};

pub use tokio_postgres::Transaction as PgTransaction;

use crate::errors::FitbitError as Error;

/// Wrapper around a deadpool postgres `Pool`, the only way to use `PgPool`
/// is through the get method, which returns a pooled `Client` object.
#[derive(Clone, Default)]
pub struct PgPool {
    pgurl: Arc<String>,
    pool: Option<Pool>,
}

impl fmt::Debug for PgPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PgPool {}", &self.pgurl)
    }
}

impl PartialEq for PgPool {
    fn eq(&self, other: &Self) -> bool {
        self.pgurl == other.pgurl
    }
}

impl PgPool {
    /// # Errors
    /// Return error if pool setup fails
    pub fn new(pgurl: &str) -> Result<Self, Error> {
        let pgconf: PgConfig = pgurl.parse()?;

        let mut config = Config::default();

        if let Some(tokio_postgres::config::Host::Tcp(s)) = pgconf.get_hosts().first() {
            config.host.replace(s.clone());
        }
        if let Some(p) = pgconf.get_ports().first() {
            config.port.replace(*p);
        }
        if let Some(u) = pgconf.get_user() {
            config.user.replace(u.to_string());
        }
        if let Some(p) = pgconf.get_password() {
            config
                .password
                .replace(String::from_utf8_lossy(p).to_string());
        }
        if let Some(db) = pgconf.get_dbname() {
            config.dbname.replace(db.to_string());
        }

        let pool = config.builder(NoTls)?.max_size(4).build()?;

        Ok(Self {
            pgurl: Arc::new(pgurl.to_string()),
            pool: Some(pool),
        })
    }

    /// # Errors
    /// Return error if pool doesn't exist or we cannot pull connection from
    /// pool
    pub async fn get(&self) -> Result<Client, Error> {
        self.pool
            .as_ref()
            .ok_or(Error::StaticCustomError("No Pool Exists"))?
            .get()
            .await
            .map_err(Into::into)
    }
}
