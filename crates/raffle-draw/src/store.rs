//! Postgres adapters: ticket aggregation in, winner rows out.
//!
//! Both adapters borrow anything implementing [`GenericClient`], so a draw
//! can read and write through the same [`Transaction`] and commit once at
//! the end.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use draw_engine::{Award, ParticipantId, ParticipantWeight, ResultSink, WeightSource};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, GenericClient, NoTls, Transaction};
use tracing::{debug, error, info};

use crate::config::{DatabaseConfig, StorageConfig};

/// One connection plus the task driving it.
pub struct PgStore {
    client: Client,
    connection: JoinHandle<()>,
}

impl PgStore {
    pub async fn connect(database: &DatabaseConfig) -> Result<Self> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&database.host)
            .port(database.port)
            .dbname(&database.dbname)
            .user(&database.user)
            .application_name("raffle-draw")
            .connect_timeout(Duration::from_secs(database.connect_timeout_secs));
        if !database.password.is_empty() {
            pg.password(&database.password);
        }

        let (client, connection) = pg.connect(NoTls).await.with_context(|| {
            format!(
                "Failed to connect to postgres at {}:{}/{}",
                database.host, database.port, database.dbname
            )
        })?;
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection closed with error");
            }
        });
        info!(
            host = %database.host,
            port = database.port,
            dbname = %database.dbname,
            "connected to postgres"
        );
        Ok(Self { client, connection })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.client
            .transaction()
            .await
            .context("Failed to begin transaction")
    }

    /// Drop the client and wait for the connection task to wind down.
    pub async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            error!(error = %e, "postgres connection task failed");
        }
    }
}

/// Rows already present in the winners table.
pub async fn existing_winner_count<C>(client: &C, storage: &StorageConfig) -> Result<i64>
where
    C: GenericClient + Sync,
{
    let sql = format!("SELECT COUNT(*)::BIGINT FROM {}", storage.winners());
    let row = client
        .query_one(sql.as_str(), &[])
        .await
        .with_context(|| format!("Failed to count rows in {}", storage.winners()))?;
    Ok(row.try_get(0)?)
}

fn weights_query(storage: &StorageConfig) -> String {
    format!(
        "SELECT client_id::BIGINT AS participant_id, SUM(\"option\")::BIGINT AS weight \
         FROM {} WHERE \"option\" > 0 GROUP BY client_id ORDER BY client_id",
        storage.tickets()
    )
}

fn insert_winners_sql(storage: &StorageConfig) -> String {
    let cast = storage
        .award_type_cast
        .as_ref()
        .map(|ty| format!("::{}.{}", storage.schema, ty))
        .unwrap_or_default();
    format!(
        "INSERT INTO {} (client_id, award_type) \
         SELECT w.client_id, $2::TEXT{cast} \
         FROM UNNEST($1::BIGINT[]) WITH ORDINALITY AS w(client_id, ord) \
         ORDER BY w.ord",
        storage.winners()
    )
}

/// Per-participant ticket sums from the tickets table.
pub struct TicketWeights<'a, C> {
    client: &'a C,
    storage: &'a StorageConfig,
}

impl<'a, C> TicketWeights<'a, C> {
    pub fn new(client: &'a C, storage: &'a StorageConfig) -> Self {
        Self { client, storage }
    }
}

#[async_trait]
impl<C> WeightSource for TicketWeights<'_, C>
where
    C: GenericClient + Sync,
{
    async fn fetch_weights(&mut self) -> Result<Vec<ParticipantWeight>> {
        let sql = weights_query(self.storage);
        let rows = self
            .client
            .query(sql.as_str(), &[])
            .await
            .with_context(|| {
                format!("Failed to aggregate tickets from {}", self.storage.tickets())
            })?;

        let weights = rows
            .iter()
            .map(|row| -> Result<ParticipantWeight> {
                Ok(ParticipantWeight::new(
                    row.try_get("participant_id")?,
                    row.try_get("weight")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(rows = weights.len(), "ticket weights aggregated");
        Ok(weights)
    }
}

/// Bulk-inserts each stage's winners with its configured label.
pub struct WinnerTable<'a, C> {
    client: &'a C,
    storage: &'a StorageConfig,
}

impl<'a, C> WinnerTable<'a, C> {
    pub fn new(client: &'a C, storage: &'a StorageConfig) -> Self {
        Self { client, storage }
    }
}

#[async_trait]
impl<C> ResultSink for WinnerTable<'_, C>
where
    C: GenericClient + Sync,
{
    async fn record_winners(
        &mut self,
        stage: &str,
        award: Award,
        winners: &[ParticipantId],
    ) -> Result<()> {
        if winners.is_empty() {
            debug!(stage, "no winners to insert");
            return Ok(());
        }
        let ids: Vec<i64> = winners.iter().map(|w| w.0).collect();
        let label = self.storage.award_labels.label(award);
        let sql = insert_winners_sql(self.storage);
        let inserted = self
            .client
            .execute(sql.as_str(), &[&ids, &label])
            .await
            .with_context(|| format!("Failed to insert {} winners for {award}", ids.len()))?;
        debug!(stage, award = %award, inserted, "winners inserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_query_filters_and_orders() {
        let storage = StorageConfig {
            schema: "messi25".into(),
            ..StorageConfig::default()
        };
        let sql = weights_query(&storage);
        assert!(sql.contains("FROM messi25.tickets"));
        assert!(sql.contains("WHERE \"option\" > 0"));
        assert!(sql.ends_with("GROUP BY client_id ORDER BY client_id"));
    }

    #[test]
    fn insert_is_plain_text_without_cast() {
        let sql = insert_winners_sql(&StorageConfig::default());
        assert!(sql.starts_with("INSERT INTO public.winners (client_id, award_type)"));
        assert!(sql.contains("$2::TEXT FROM"));
    }

    #[test]
    fn insert_casts_to_schema_qualified_enum() {
        let storage = StorageConfig {
            schema: "messi25".into(),
            award_type_cast: Some("enum_winners_award_type".into()),
            ..StorageConfig::default()
        };
        let sql = insert_winners_sql(&storage);
        assert!(sql.contains("$2::TEXT::messi25.enum_winners_award_type"));
        assert!(sql.contains("UNNEST($1::BIGINT[])"));
    }
}
