/// Shared tokio-postgres connection with reconnect-on-close.
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

pub struct Pool {
    database_url: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl Pool {
    pub fn new(database_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            database_url: database_url.into(),
            client: Mutex::new(None),
        })
    }

    /// Get the shared client, reconnecting if the last one was closed.
    /// A `Client` pipelines concurrent queries, so one connection is shared.
    pub async fn get(&self) -> Result<Arc<Client>, tokio_postgres::Error> {
        let mut guard = self.client.lock().await;

        if let Some(client) = guard.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            tracing::warn!("database connection closed, reconnecting");
        }

        let client = Arc::new(self.connect().await?);
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn connect(&self) -> Result<Client, tokio_postgres::Error> {
        let (client, connection) = tokio_postgres::connect(&self.database_url, NoTls).await?;

        // Drive the connection until it closes
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(client)
    }
}
