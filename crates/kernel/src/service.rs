//! Listing service.
//!
//! Orchestrates list, single-entity reads and creates:
//! - request binding and validation before the store is touched
//! - plan building with the automatic eager-join pass
//! - outbound projection and pagination annotations on the way back

use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::{AppError, AppResult};
use crate::graph::{RelationGraph, TypeDefinition};
use crate::pagination::{PageHeaders, parse_window, status};
use crate::projection::{OptionMatching, OptionSet, project, sanitize, validate_options};
use crate::query::{EntityStore, FilterValue, QueryPlanBuilder};
use crate::request::ListParams;

/// Paging limits and projection policy.
#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub option_matching: OptionMatching,
    /// Base URL that request paths are resolved against for links.
    pub site_url: String,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            option_matching: OptionMatching::default(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

/// One page of projected entities.
#[derive(Debug)]
pub struct ListPage {
    pub status: StatusCode,
    pub headers: PageHeaders,
    pub items: Vec<Value>,
}

/// Read and write entry point over the relation graph and an entity store.
pub struct ListingService {
    graph: Arc<RelationGraph>,
    store: Arc<dyn EntityStore>,
    settings: ListingSettings,
}

impl ListingService {
    pub fn new(
        graph: Arc<RelationGraph>,
        store: Arc<dyn EntityStore>,
        settings: ListingSettings,
    ) -> Self {
        Self {
            graph,
            store,
            settings,
        }
    }

    /// Whether the backing store answers.
    pub async fn health(&self) -> bool {
        self.store.health().await
    }

    /// List one page of `resource`.
    ///
    /// `pairs` are the raw query pairs; `path_and_query` is the request target
    /// the pagination links are derived from.
    pub async fn list<I, K, V>(
        &self,
        resource: &str,
        pairs: I,
        path_and_query: &str,
    ) -> AppResult<ListPage>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let def = self.entity(resource)?;
        let params = ListParams::bind(&self.graph, &def.name, pairs)?;
        let window = parse_window(
            params.page.as_deref(),
            params.size.as_deref(),
            self.settings.max_page_size,
            self.settings.default_page_size,
        )?;
        validate_options(&self.graph, &def.name, &params.options)?;

        let mut builder = QueryPlanBuilder::new(&self.graph, &def.name)?;
        builder.with_eager_joins(params.options.as_slice())?;
        for (path, value) in &params.filters {
            builder.with_filter(path, value)?;
        }
        builder
            .with_order_by(params.sort.iter().map(|(path, dir)| (path.as_str(), *dir)))?
            .with_offset(window.offset())
            .with_limit(window.limit());
        let plan = builder.build();

        let base_url = self.base_url(path_and_query)?;
        let result = self.store.execute(&self.graph, &plan).await?;
        let returned = result.rows.len() as u64;
        let total = result.total.unwrap_or(window.offset() + returned);

        let projected = project(
            &self.graph,
            &def.name,
            Value::Array(result.rows),
            &params.options,
            self.settings.option_matching,
        )?;
        let items = match projected {
            Value::Array(items) => items,
            other => vec![other],
        };

        debug!(resource, total, returned, "list served");
        Ok(ListPage {
            status: status(total, returned),
            headers: PageHeaders::compute(
                &RelationGraph::resource_name(def),
                self.settings.max_page_size,
                total,
                returned,
                &window,
                &base_url,
            ),
            items,
        })
    }

    /// Read one entity by identifier.
    pub async fn get(
        &self,
        resource: &str,
        raw_id: &str,
        options: &OptionSet,
    ) -> AppResult<Value> {
        let def = self.entity(resource)?;
        validate_options(&self.graph, &def.name, options)?;
        self.fetch_one(def, id_filter(&self.graph, def, raw_id)?, options)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Sanitize and store a new entity, then return it as a read would.
    pub async fn create(&self, resource: &str, body: &Value) -> AppResult<Value> {
        let def = self.entity(resource)?;
        let Value::Object(row) = sanitize(&self.graph, &def.name, body)? else {
            return Err(AppError::bad_request(
                "body.invalid",
                "request body must be a JSON object",
                None,
            ));
        };

        let id = self.store.save(def, row).await?;
        info!(resource, id = %id, "entity created");

        let raw_id = match id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let filter = id_filter(&self.graph, def, &raw_id)?;
        let stored = self
            .fetch_one(def, filter, &OptionSet::default())
            .await?
            .with_context(|| format!("created {} could not be read back", def.name))?;
        Ok(stored)
    }

    async fn fetch_one(
        &self,
        def: &TypeDefinition,
        id: FilterValue,
        options: &OptionSet,
    ) -> AppResult<Option<Value>> {
        let mut builder = QueryPlanBuilder::new(&self.graph, &def.name)?;
        builder
            .with_eager_joins(options.as_slice())?
            .with_filter(&def.id_field, &id)?;
        let plan = builder.build();

        let result = self.store.execute(&self.graph, &plan).await?;
        let Some(row) = result.rows.into_iter().next() else {
            return Ok(None);
        };
        let projected = project(
            &self.graph,
            &def.name,
            row,
            options,
            self.settings.option_matching,
        )?;
        Ok(Some(projected))
    }

    fn entity(&self, resource: &str) -> AppResult<&TypeDefinition> {
        self.graph
            .by_resource(resource)
            .filter(|def| def.is_entity())
            .ok_or(AppError::NotFound)
    }

    fn base_url(&self, path_and_query: &str) -> AppResult<Url> {
        let site = Url::parse(&self.settings.site_url).context("invalid site URL")?;
        Ok(site
            .join(path_and_query)
            .with_context(|| format!("invalid request target '{path_and_query}'"))?)
    }
}

/// Equality filter on the identifier, typed like the identifier field.
fn id_filter(graph: &RelationGraph, def: &TypeDefinition, raw: &str) -> AppResult<FilterValue> {
    let params = ListParams::bind(graph, &def.name, [(def.id_field.as_str(), raw)])?;
    match params.filters.into_iter().next() {
        // "null" is not an identifier.
        Some((_, FilterValue::Null)) => Err(AppError::NotFound),
        Some((_, value)) => Ok(value),
        None => Ok(FilterValue::equals(raw)),
    }
}
