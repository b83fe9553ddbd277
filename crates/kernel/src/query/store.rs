//! Persistence collaborator.
//!
//! The listing pipeline only talks to [`EntityStore`]. The PostgreSQL
//! implementation renders plans with [`SqlRenderer`] and hydrates the rows;
//! tests plug in an in-memory store instead.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::debug;

use crate::graph::{RelationGraph, TypeDefinition};

use super::hydrate::hydrate;
use super::sql::{SqlRenderer, render_insert};
use super::types::QueryPlan;

/// Hydrated root entities plus the total element count.
#[derive(Debug, Clone, Default)]
pub struct PlanRows {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

/// Executes rendered plans and writes sanitized payloads.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Run `plan` and return the hydrated root entities.
    async fn execute(&self, graph: &RelationGraph, plan: &QueryPlan) -> Result<PlanRows>;

    /// Insert a sanitized payload and return the stored identifier.
    async fn save(&self, def: &TypeDefinition, row: Map<String, Value>) -> Result<Value>;

    /// Whether the backing store is reachable.
    async fn health(&self) -> bool;
}

/// PostgreSQL-backed [`EntityStore`].
pub struct PgEntityStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgEntityStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn execute(&self, graph: &RelationGraph, plan: &QueryPlan) -> Result<PlanRows> {
        let renderer = SqlRenderer::new(graph, plan);
        let count_sql = renderer
            .build_count()
            .context("failed to render count query")?;
        let main_sql = renderer.build().context("failed to render main query")?;
        debug!(sql = %main_sql, "executing query plan");

        // SET LOCAL only applies inside a transaction and resets on commit/rollback.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        sqlx::query(&format!(
            "SET LOCAL statement_timeout = '{}ms'",
            self.statement_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .context("failed to set statement timeout")?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut *tx)
            .await
            .context("failed to execute count query")?;

        let rows: Vec<Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({main_sql}) t"))
                .fetch_all(&mut *tx)
                .await
                .context("failed to execute main query")?;

        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        Ok(PlanRows {
            rows: hydrate(graph, plan, rows),
            total: Some(u64::try_from(total).unwrap_or_default()),
        })
    }

    async fn save(&self, def: &TypeDefinition, row: Map<String, Value>) -> Result<Value> {
        let sql = render_insert(def, &row)
            .with_context(|| format!("failed to render insert for {}", def.name))?;

        let id: Value = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to insert {}", def.name))?;

        debug!(entity = %def.name, id = %id, "entity saved");
        Ok(id)
    }

    async fn health(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}
