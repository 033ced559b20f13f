/// Declares a function returning a lazily compiled, process-wide regex.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod cache;
pub mod category;
pub mod dates;
pub mod generator;
pub mod openai;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod types;

pub use cache::UserCategoryCache;
pub use category::{CategoryLists, CategoryResolver, StaticCategoryDirectory};
pub use dates::DateResolver;
pub use generator::MockGenerator;
pub use openai::{ChatCompletionConfig, ChatCompletionGenerator};
pub use parser::ResponseParser;
pub use pipeline::{
    ExtractionError, ExtractionPipeline, FeedbackMessage, Outcome, PipelineOptions, RejectReason,
    Stage,
};
pub use prompt::{build_prompt, TIMESTAMP_FORMAT};
pub use types::{AmountField, ParsedTransactionFields};
