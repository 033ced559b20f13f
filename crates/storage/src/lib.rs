pub mod db;
pub mod repository;

pub use db::{
    create_db, create_in_memory_db, find_category_id, get_categories, get_transactions_by_user,
    insert_category, insert_transaction, seed_default_categories, DbPool, StorageError,
};
pub use repository::{SqliteCategoryDirectory, SqliteTransactionStore};
