pub mod config;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use finsight_core::{CategoryDirectory, SystemClock, TextGenerator};
use finsight_extract::{CategoryResolver, ExtractionPipeline, PipelineOptions, UserCategoryCache};
use finsight_storage::{
    create_db, create_in_memory_db, seed_default_categories, DbPool, SqliteCategoryDirectory,
    SqliteTransactionStore, StorageError,
};

use crate::config::{CategoryMode, DatabaseSettings, Settings};

pub use config::ConfigError;
pub use routes::{router, AppState};

/// Opens (or creates) the database and seeds the global taxonomy.
pub async fn open_database(settings: &DatabaseSettings) -> Result<DbPool, StorageError> {
    let pool = if settings.is_in_memory() {
        create_in_memory_db().await?
    } else {
        create_db(&settings.path).await?
    };
    seed_default_categories(&pool).await?;
    Ok(pool)
}

/// Wires SQLite-backed collaborators and `generator` into a pipeline.
pub fn build_pipeline(
    settings: &Settings,
    db: DbPool,
    generator: Arc<dyn TextGenerator>,
) -> ExtractionPipeline {
    let directory: Arc<dyn CategoryDirectory> = match settings.categories.mode {
        CategoryMode::Global => Arc::new(SqliteCategoryDirectory::global(db.clone())),
        CategoryMode::PerUser => Arc::new(SqliteCategoryDirectory::per_user(db.clone())),
    };
    let resolver = CategoryResolver::new(
        directory,
        Arc::new(UserCategoryCache::new()),
        settings.categories.matching,
    );

    ExtractionPipeline::new(
        generator,
        resolver,
        Arc::new(SqliteTransactionStore::new(db)),
        Arc::new(SystemClock),
    )
    .with_options(PipelineOptions {
        currency: settings.categories.currency.clone(),
    })
}
