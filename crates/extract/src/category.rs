use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use finsight_core::{
    is_uncategorized_label, Category, CategoryDirectory, CategoryId, CategoryMatching,
    CategoryScope, Direction, DirectoryError, ResolvedCategory, UserId, DEFAULT_CATEGORIES,
};
use serde::{Deserialize, Serialize};

use crate::cache::UserCategoryCache;

/// Category names partitioned by direction, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLists {
    pub expense: Vec<String>,
    pub income: Vec<String>,
}

impl CategoryLists {
    pub fn for_direction(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Expense => &self.expense,
            Direction::Income => &self.income,
        }
    }
}

// ── In-memory directory ──────────────────────────────────────────────────────

/// `CategoryDirectory` backed by a vector; used by tests and storage-less setups.
pub struct StaticCategoryDirectory {
    scope: CategoryScope,
    categories: RwLock<Vec<Category>>,
}

impl StaticCategoryDirectory {
    pub fn global() -> Self {
        Self {
            scope: CategoryScope::Global,
            categories: RwLock::new(Vec::new()),
        }
    }

    pub fn per_user() -> Self {
        Self {
            scope: CategoryScope::PerUser,
            categories: RwLock::new(Vec::new()),
        }
    }

    /// Global directory holding the default taxonomy.
    pub fn with_defaults() -> Self {
        let dir = Self::global();
        for (name, direction) in DEFAULT_CATEGORIES {
            dir.add(None, name, *direction);
        }
        dir
    }

    /// Registers a category and returns its fresh id. `user_id` is ignored by global lookups.
    pub fn add(&self, user_id: Option<UserId>, name: &str, direction: Direction) -> CategoryId {
        let id = CategoryId::new_v4();
        let mut categories = self.categories.write().unwrap_or_else(|e| e.into_inner());
        categories.push(Category {
            id,
            user_id,
            name: name.to_string(),
            direction,
        });
        id
    }

    fn visible_to(&self, category: &Category, user_id: UserId) -> bool {
        match self.scope {
            CategoryScope::Global => category.user_id.is_none(),
            CategoryScope::PerUser => category.user_id == Some(user_id),
        }
    }
}

#[async_trait]
impl CategoryDirectory for StaticCategoryDirectory {
    fn scope(&self) -> CategoryScope {
        self.scope
    }

    async fn lookup(
        &self,
        name: &str,
        direction: Direction,
        user_id: UserId,
    ) -> Result<Option<CategoryId>, DirectoryError> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        Ok(categories
            .iter()
            .find(|c| c.direction == direction && c.name == name && self.visible_to(c, user_id))
            .map(|c| c.id))
    }

    async fn list(&self, user_id: UserId, direction: Direction) -> Result<Vec<String>, DirectoryError> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        Ok(categories
            .iter()
            .filter(|c| c.direction == direction && self.visible_to(c, user_id))
            .map(|c| c.name.clone())
            .collect())
    }
}

// ── Resolver ─────────────────────────────────────────────────────────────────

/// Maps a model-supplied category label onto a known category id.
///
/// Resolution is total: every failure path ends at the uncategorized id. A
/// label only matches names registered for the transaction's own direction.
pub struct CategoryResolver {
    directory: Arc<dyn CategoryDirectory>,
    cache: Arc<UserCategoryCache>,
    matching: CategoryMatching,
}

impl CategoryResolver {
    pub fn new(
        directory: Arc<dyn CategoryDirectory>,
        cache: Arc<UserCategoryCache>,
        matching: CategoryMatching,
    ) -> Self {
        Self { directory, cache, matching }
    }

    /// Names offered to the model for `user_id`. Per-user directories go through the cache.
    pub async fn known_categories(&self, user_id: UserId) -> CategoryLists {
        match self.directory.scope() {
            CategoryScope::PerUser => self.cache.get_or_load(user_id, self.directory.as_ref()).await,
            CategoryScope::Global => {
                let expense = self.list_or_empty(user_id, Direction::Expense).await;
                let income = self.list_or_empty(user_id, Direction::Income).await;
                CategoryLists { expense, income }
            }
        }
    }

    /// Matches `label` against `known`, the lists already fetched for this request, then looks up the id.
    pub async fn resolve(
        &self,
        label: Option<&str>,
        direction: Option<Direction>,
        user_id: UserId,
        known: &CategoryLists,
    ) -> ResolvedCategory {
        if is_uncategorized_label(label) {
            return ResolvedCategory::uncategorized();
        }
        let (Some(label), Some(direction)) = (label.map(str::trim), direction) else {
            return ResolvedCategory::uncategorized();
        };

        let Some(canonical) = known
            .for_direction(direction)
            .iter()
            .find(|name| self.matching.matches(name, label))
        else {
            tracing::debug!(label, %direction, "category not in the user's set, using uncategorized");
            return ResolvedCategory::uncategorized();
        };

        match self.directory.lookup(canonical, direction, user_id).await {
            Ok(Some(id)) => ResolvedCategory {
                id,
                name: canonical.clone(),
            },
            Ok(None) => ResolvedCategory::uncategorized(),
            Err(e) => {
                tracing::warn!(label, error = %e, "category lookup failed, using uncategorized");
                ResolvedCategory::uncategorized()
            }
        }
    }

    async fn list_or_empty(&self, user_id: UserId, direction: Direction) -> Vec<String> {
        self.directory
            .list(user_id, direction)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%direction, error = %e, "could not list categories");
                Vec::new()
            })
    }
}
