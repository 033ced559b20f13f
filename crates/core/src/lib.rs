pub mod category;
pub mod money;
pub mod traits;
pub mod transaction;

pub use category::{
    is_uncategorized_label, Category, CategoryId, CategoryMatching, Direction, ResolvedCategory,
    TransactionId, UserId, DEFAULT_CATEGORIES, UNCATEGORIZED_NAME,
};
pub use money::Money;
pub use traits::{
    CategoryDirectory, CategoryScope, Clock, DirectoryError, FixedClock, GenerationError,
    StoreError, SystemClock, TextGenerator, TransactionStore,
};
pub use transaction::{
    is_placeholder, DraftTransaction, InvalidField, ResolvedTransaction, ValidationError,
    PLACEHOLDER_DESCRIPTION,
};
