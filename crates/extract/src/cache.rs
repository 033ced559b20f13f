use std::collections::HashMap;

use finsight_core::{CategoryDirectory, Direction, UserId};
use tokio::sync::RwLock;

use crate::category::CategoryLists;

/// Process-wide map of user → category name lists.
///
/// Filled on first access per user and never refreshed or evicted: categories a
/// user adds later are invisible until the process restarts. Two concurrent
/// misses for the same user may both hit the directory; the last write wins and
/// both writes carry the same lists.
#[derive(Debug, Default)]
pub struct UserCategoryCache {
    entries: RwLock<HashMap<UserId, CategoryLists>>,
}

impl UserCategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: UserId) -> Option<CategoryLists> {
        self.entries.read().await.get(&user_id).cloned()
    }

    /// Cached lists for `user_id`, loading them from `directory` on a miss.
    ///
    /// A failed load is logged and yields empty lists without being cached, so
    /// the next request retries the directory.
    pub async fn get_or_load(
        &self,
        user_id: UserId,
        directory: &dyn CategoryDirectory,
    ) -> CategoryLists {
        if let Some(hit) = self.get(user_id).await {
            return hit;
        }

        // Lock is not held across the directory calls.
        let expense = directory.list(user_id, Direction::Expense).await;
        let income = directory.list(user_id, Direction::Income).await;
        match (expense, income) {
            (Ok(expense), Ok(income)) => {
                let lists = CategoryLists { expense, income };
                tracing::debug!(
                    %user_id,
                    expense = lists.expense.len(),
                    income = lists.income.len(),
                    "cached user categories"
                );
                self.entries.write().await.insert(user_id, lists.clone());
                lists
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(%user_id, error = %e, "could not load user categories");
                CategoryLists::default()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
