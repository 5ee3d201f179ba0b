//! Categories service.

use std::sync::Arc;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{Category, Direction};
use crate::storage::CategoryStore;

/// Offline-first access to categories.
///
/// Categories are server-owned reference data: there is no mutation
/// path and no outbox, and a successful refresh replaces the cached
/// set wholesale.
#[derive(Debug)]
pub struct CategoriesService<C> {
    /// Remote API client.
    client: ApiClient,
    /// Local category store.
    store: Arc<C>,
}

impl<C: CategoryStore> CategoriesService<C> {
    /// Creates the service from its two collaborators.
    #[inline]
    pub const fn new(client: ApiClient, store: Arc<C>) -> Self {
        Self { client, store }
    }

    /// Returns all categories.
    ///
    /// Serves the local store unless it is empty or `refresh` is set;
    /// then fetches from the remote and replaces the cached set. When
    /// the remote is unreachable the cached set is served instead, and
    /// the call errors only if there is nothing to serve.
    ///
    /// # Errors
    ///
    /// Returns the remote failure when the local store is empty, or a
    /// storage error.
    #[tracing::instrument(skip_all, fields(refresh))]
    pub async fn get_all(&self, refresh: bool) -> Result<Vec<Category>> {
        let local = self.store.categories().await?;
        if !refresh && !local.is_empty() {
            return Ok(local);
        }
        match self.client.categories().await {
            Ok(fetched) => {
                self.store.replace_categories(&fetched).await?;
                Ok(fetched)
            }
            Err(err) if !local.is_empty() => {
                tracing::warn!(error = %err, "refresh failed, serving cached categories");
                Ok(local)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns the cached categories matching `direction`;
    /// [`Direction::All`] matches everything.
    ///
    /// # Errors
    ///
    /// Returns the remote failure when the local store is empty, or a
    /// storage error.
    #[tracing::instrument(skip_all, fields(direction = direction.as_str()))]
    pub async fn by_direction(&self, direction: Direction) -> Result<Vec<Category>> {
        let mut categories = self.get_all(false).await?;
        if direction != Direction::All {
            categories.retain(|category| category.direction == direction);
        }
        Ok(categories)
    }
}
