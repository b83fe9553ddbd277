//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::graph::RelationGraph;
use crate::query::{EntityStore, PgEntityStore};
use crate::service::{ListingService, ListingSettings};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Relation graph, immutable after startup.
    graph: Arc<RelationGraph>,

    /// Listing pipeline over the graph and the entity store.
    listing: ListingService,
}

impl AppState {
    /// Load the relation graph and connect to PostgreSQL.
    pub async fn new(config: &Config) -> Result<Self> {
        let graph = RelationGraph::load(&config.relation_graph_path)
            .context("failed to load relation graph")?;

        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;
        info!("database connection established");

        let store = PgEntityStore::new(pool, config.statement_timeout);
        Ok(Self::from_parts(
            Arc::new(graph),
            Arc::new(store),
            config.listing_settings(),
        ))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        graph: Arc<RelationGraph>,
        store: Arc<dyn EntityStore>,
        settings: ListingSettings,
    ) -> Self {
        let listing = ListingService::new(Arc::clone(&graph), store, settings);
        Self {
            inner: Arc::new(AppStateInner { graph, listing }),
        }
    }

    /// Get the relation graph.
    pub fn graph(&self) -> &Arc<RelationGraph> {
        &self.inner.graph
    }

    /// Get the listing service.
    pub fn listing(&self) -> &ListingService {
        &self.inner.listing
    }
}
