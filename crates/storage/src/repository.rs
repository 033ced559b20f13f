//! SQLite-backed implementations of the pipeline's category and transaction traits.

use async_trait::async_trait;
use finsight_core::{
    CategoryDirectory, CategoryId, CategoryScope, DirectoryError, Direction, ResolvedTransaction,
    StoreError, TransactionStore, UserId,
};

use crate::db::{self, DbPool, StorageError};

/// Category directory over the `categories` table.
#[derive(Clone)]
pub struct SqliteCategoryDirectory {
    pool: DbPool,
    scope: CategoryScope,
}

impl SqliteCategoryDirectory {
    /// Serves the rows with no owner to every user.
    pub fn global(pool: DbPool) -> Self {
        Self {
            pool,
            scope: CategoryScope::Global,
        }
    }

    /// Serves each user only the rows they own.
    pub fn per_user(pool: DbPool) -> Self {
        Self {
            pool,
            scope: CategoryScope::PerUser,
        }
    }

    fn owner(&self, user_id: UserId) -> Option<UserId> {
        match self.scope {
            CategoryScope::Global => None,
            CategoryScope::PerUser => Some(user_id),
        }
    }
}

fn directory_error(e: StorageError) -> DirectoryError {
    DirectoryError::Backend(e.to_string())
}

#[async_trait]
impl CategoryDirectory for SqliteCategoryDirectory {
    fn scope(&self) -> CategoryScope {
        self.scope
    }

    async fn lookup(
        &self,
        name: &str,
        direction: Direction,
        user_id: UserId,
    ) -> Result<Option<CategoryId>, DirectoryError> {
        db::find_category_id(&self.pool, self.owner(user_id), name, direction)
            .await
            .map_err(directory_error)
    }

    async fn list(&self, user_id: UserId, direction: Direction) -> Result<Vec<String>, DirectoryError> {
        let categories = db::get_categories(&self.pool, self.owner(user_id), direction)
            .await
            .map_err(directory_error)?;
        Ok(categories.into_iter().map(|c| c.name).collect())
    }
}

#[derive(Clone)]
pub struct SqliteTransactionStore {
    pool: DbPool,
}

impl SqliteTransactionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn insert(&self, tx: &ResolvedTransaction) -> Result<(), StoreError> {
        db::insert_transaction(&self.pool, tx)
            .await
            .map_err(|e| match e {
                StorageError::AmountOutOfRange(amount) => {
                    StoreError::AmountOutOfRange(amount.to_string())
                }
                other => StoreError::Backend(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use finsight_core::{Money, TransactionId};

    async fn seeded() -> DbPool {
        let pool = db::create_in_memory_db().await.unwrap();
        db::seed_default_categories(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn global_directory_ignores_user() {
        let pool = seeded().await;
        let dir = SqliteCategoryDirectory::global(pool);
        assert_eq!(dir.scope(), CategoryScope::Global);

        let a = dir.lookup("Food", Direction::Expense, UserId::new_v4()).await.unwrap();
        let b = dir.lookup("Food", Direction::Expense, UserId::new_v4()).await.unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);

        let income = dir.list(UserId::new_v4(), Direction::Income).await.unwrap();
        assert_eq!(income.len(), 5);
        assert!(dir
            .lookup("Food", Direction::Income, UserId::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn per_user_directory_only_sees_own_rows() {
        let pool = seeded().await;
        let alice = UserId::new_v4();
        let bob = UserId::new_v4();
        let pets = db::insert_category(&pool, Some(alice), "Pets", Direction::Expense)
            .await
            .unwrap();

        let dir = SqliteCategoryDirectory::per_user(pool);
        assert_eq!(dir.scope(), CategoryScope::PerUser);
        assert_eq!(dir.list(alice, Direction::Expense).await.unwrap(), ["Pets"]);
        assert!(dir.list(bob, Direction::Expense).await.unwrap().is_empty());
        assert_eq!(
            dir.lookup("Pets", Direction::Expense, alice).await.unwrap(),
            Some(pets)
        );
        assert!(dir.lookup("Pets", Direction::Expense, bob).await.unwrap().is_none());
        assert!(dir.lookup("Food", Direction::Expense, alice).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_persists_transaction() {
        let pool = seeded().await;
        let store = SqliteTransactionStore::new(pool.clone());
        let user = UserId::new_v4();
        let tx = ResolvedTransaction {
            transaction_id: TransactionId::new_v4(),
            user_id: user,
            category_id: CategoryId::UNCATEGORIZED,
            category_name: "Uncategorized".into(),
            description: "Lunch".into(),
            amount: Money::from_cents(5000),
            direction: Direction::Expense,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        };

        store.insert(&tx).await.unwrap();
        let stored = db::get_transactions_by_user(&pool, user).await.unwrap();
        assert_eq!(stored, vec![tx.clone()]);

        // Second insert of the same id violates the primary key.
        assert!(matches!(
            store.insert(&tx).await.unwrap_err(),
            StoreError::Backend(_)
        ));
    }
}
