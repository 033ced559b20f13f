use std::sync::Arc;

use chrono::{DateTime, Utc};
use finsight_core::{
    Clock, DraftTransaction, GenerationError, InvalidField, ResolvedTransaction, StoreError,
    TextGenerator, TransactionStore, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::category::CategoryResolver;
use crate::dates::DateResolver;
use crate::parser::ResponseParser;
use crate::prompt::{build_prompt, TIMESTAMP_FORMAT};

pub const GENERATION_FAILURE_MESSAGE: &str =
    "❌ Sorry, there was a problem extracting data from your input. Please try rephrasing.";
pub const FUTURE_DATE_MESSAGE: &str = "❌ Cannot add transaction: date is in the future.";
pub const PERSISTENCE_FAILURE_MESSAGE: &str =
    "❌ Sorry, the transaction could not be saved. Please try again later.";

/// Pipeline states, in the order a request moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PromptBuilt,
    ModelInvoked,
    Parsed,
    DateChecked,
    CategoryResolved,
    Validated,
    Persisted,
    Rejected,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Text generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Model returned an empty or error-flagged response")]
    EmptyResponse,
    #[error("Transaction date {occurred_at} is after {now}")]
    FutureDated {
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Could not persist transaction: {0}")]
    Persistence(#[from] StoreError),
}

impl ExtractionError {
    /// The stage that was being attempted when the request was rejected.
    pub fn stage(&self) -> Stage {
        match self {
            ExtractionError::Generation(_) | ExtractionError::EmptyResponse => Stage::ModelInvoked,
            ExtractionError::FutureDated { .. } => Stage::DateChecked,
            ExtractionError::Validation(_) => Stage::Validated,
            ExtractionError::Persistence(_) => Stage::Persisted,
        }
    }

    pub fn reason(&self) -> RejectReason {
        match self {
            ExtractionError::Generation(_) | ExtractionError::EmptyResponse => {
                RejectReason::GenerationFailure
            }
            ExtractionError::FutureDated { .. } => RejectReason::FutureDated,
            ExtractionError::Validation(e) => RejectReason::Validation(e.fields.clone()),
            ExtractionError::Persistence(_) => RejectReason::PersistenceFailure,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::Generation(_) | ExtractionError::EmptyResponse => {
                GENERATION_FAILURE_MESSAGE.to_string()
            }
            ExtractionError::FutureDated { .. } => FUTURE_DATE_MESSAGE.to_string(),
            ExtractionError::Validation(e) => format!(
                "❌ Cannot add transaction: missing {}. Please provide complete details and try again.",
                e.field_list()
            ),
            ExtractionError::Persistence(_) => PERSISTENCE_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Why a request did not produce a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum RejectReason {
    GenerationFailure,
    FutureDated,
    Validation(Vec<InvalidField>),
    PersistenceFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Recorded {
        transaction: ResolvedTransaction,
        feedback: String,
    },
    Rejected {
        reason: RejectReason,
        stage: Stage,
    },
}

/// The single user-facing result of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub outcome: Outcome,
    pub text: String,
}

impl FeedbackMessage {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Recorded { .. })
    }

    pub fn transaction(&self) -> Option<&ResolvedTransaction> {
        match &self.outcome {
            Outcome::Recorded { transaction, .. } => Some(transaction),
            Outcome::Rejected { .. } => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.outcome {
            Outcome::Recorded { .. } => None,
            Outcome::Rejected { reason, .. } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Appended to amounts in success messages, e.g. `EGP`.
    pub currency: Option<String>,
}

/// Orchestrates: prompt → model → parse → date check → category → validate → persist.
///
/// Every request ends in exactly one [`FeedbackMessage`]. Nothing is retried,
/// and the store is called at most once, only after validation passed.
pub struct ExtractionPipeline {
    generator: Arc<dyn TextGenerator>,
    categories: CategoryResolver,
    store: Arc<dyn TransactionStore>,
    clock: Arc<dyn Clock>,
    options: PipelineOptions,
}

impl ExtractionPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        categories: CategoryResolver,
        store: Arc<dyn TransactionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            generator,
            categories,
            store,
            clock,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn extract_and_record(&self, input_text: &str, user_id: UserId) -> FeedbackMessage {
        match self.run(input_text, user_id).await {
            Ok((transaction, feedback)) => {
                let text = self.success_message(&transaction, &feedback);
                FeedbackMessage {
                    outcome: Outcome::Recorded {
                        transaction,
                        feedback,
                    },
                    text,
                }
            }
            Err(e) => {
                let stage = e.stage();
                warn!(%user_id, ?stage, error = %e, "transaction rejected");
                FeedbackMessage {
                    text: e.user_message(),
                    outcome: Outcome::Rejected {
                        reason: e.reason(),
                        stage,
                    },
                }
            }
        }
    }

    async fn run(
        &self,
        input_text: &str,
        user_id: UserId,
    ) -> Result<(ResolvedTransaction, String), ExtractionError> {
        let now = self.clock.now();

        let known = self.categories.known_categories(user_id).await;
        let prompt = build_prompt(input_text, now, &known);
        debug!(stage = ?Stage::PromptBuilt, %user_id, len = prompt.len());

        let raw = self.generator.generate(&prompt).await?;
        debug!(stage = ?Stage::ModelInvoked, model = self.generator.model_name(), len = raw.len());
        if is_error_flagged(&raw) {
            return Err(ExtractionError::EmptyResponse);
        }

        let fields = ResponseParser::parse(&raw, now);
        debug!(stage = ?Stage::Parsed, ?fields);

        if DateResolver::is_future(fields.occurred_at, now) {
            return Err(ExtractionError::FutureDated {
                occurred_at: fields.occurred_at,
                now,
            });
        }
        debug!(stage = ?Stage::DateChecked, occurred_at = %fields.occurred_at);

        let (amount, direction) = fields.resolve_amount();
        let category = self
            .categories
            .resolve(fields.category_label.as_deref(), direction, user_id, &known)
            .await;
        debug!(stage = ?Stage::CategoryResolved, category_id = %category.id, name = %category.name);

        let transaction = ResolvedTransaction::validate(DraftTransaction {
            user_id,
            category,
            description: fields.description,
            amount,
            direction,
            occurred_at: fields.occurred_at,
        })?;
        debug!(stage = ?Stage::Validated, transaction_id = %transaction.transaction_id);

        self.store.insert(&transaction).await?;
        info!(
            transaction_id = %transaction.transaction_id,
            %user_id,
            amount = %transaction.amount,
            direction = %transaction.direction,
            "transaction recorded"
        );

        Ok((transaction, fields.feedback_text))
    }

    fn success_message(&self, tx: &ResolvedTransaction, feedback: &str) -> String {
        let amount = match &self.options.currency {
            Some(currency) => format!("{} {currency}", tx.amount),
            None => tx.amount.to_string(),
        };
        let mut text = format!(
            "✅ Added {} transaction: {}, {amount}, date: {}, category: {}.",
            tx.direction.as_str_lower(),
            tx.description,
            tx.occurred_at.format(TIMESTAMP_FORMAT),
            tx.category_name,
        );
        if !feedback.is_empty() {
            text.push_str("\n💬 ");
            text.push_str(feedback);
        }
        text
    }
}

/// Empty output, or output whose first line opens with `error`.
fn is_error_flagged(raw: &str) -> bool {
    match raw.lines().map(str::trim).find(|l| !l.is_empty()) {
        None => true,
        Some(first) => first.to_ascii_lowercase().starts_with("error"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::UserCategoryCache;
    use crate::category::StaticCategoryDirectory;
    use crate::generator::MockGenerator;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use finsight_core::{
        CategoryDirectory, CategoryId, CategoryMatching, CategoryScope, Direction, DirectoryError,
        FixedClock, Money,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Tuesday, 2024-01-30 12:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 30, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct RecordingStore {
        inserted: Mutex<Vec<ResolvedTransaction>>,
        attempts: AtomicUsize,
        fail: bool,
    }

    impl RecordingStore {
        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionStore for RecordingStore {
        async fn insert(&self, tx: &ResolvedTransaction) -> Result<(), StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inserted.lock().await.push(tx.clone());
            Ok(())
        }
    }

    struct CountingDirectory {
        inner: StaticCategoryDirectory,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl CategoryDirectory for CountingDirectory {
        fn scope(&self) -> CategoryScope {
            self.inner.scope()
        }

        async fn lookup(
            &self,
            name: &str,
            direction: Direction,
            user_id: UserId,
        ) -> Result<Option<CategoryId>, DirectoryError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(name, direction, user_id).await
        }

        async fn list(&self, user_id: UserId, direction: Direction) -> Result<Vec<String>, DirectoryError> {
            self.inner.list(user_id, direction).await
        }
    }

    struct Harness {
        pipeline: ExtractionPipeline,
        generator: Arc<MockGenerator>,
        store: Arc<RecordingStore>,
        directory: Arc<CountingDirectory>,
        user: UserId,
        food: CategoryId,
    }

    /// Per-user directory: expense {Food, Transportation}, income {Salary}.
    fn harness(reply: MockGenerator, store: RecordingStore) -> Harness {
        let user = UserId::new_v4();
        let inner = StaticCategoryDirectory::per_user();
        let food = inner.add(Some(user), "Food", Direction::Expense);
        inner.add(Some(user), "Transportation", Direction::Expense);
        inner.add(Some(user), "Salary", Direction::Income);
        let directory = Arc::new(CountingDirectory {
            inner,
            lookups: AtomicUsize::new(0),
        });
        let generator = Arc::new(reply);
        let store = Arc::new(store);
        let resolver = CategoryResolver::new(
            directory.clone(),
            Arc::new(UserCategoryCache::new()),
            CategoryMatching::default(),
        );
        let pipeline = ExtractionPipeline::new(
            generator.clone(),
            resolver,
            store.clone(),
            Arc::new(FixedClock(now())),
        );
        Harness {
            pipeline,
            generator,
            store,
            directory,
            user,
            food,
        }
    }

    fn reply(text: &str) -> MockGenerator {
        MockGenerator::new(text)
    }

    #[tokio::test]
    async fn lunch_yesterday_is_recorded() {
        let h = harness(
            reply(
                "CREATED_AT: 2024-01-29T00:00:00Z\nAMOUNT: 50\nTYPE: Expense\nCATEGORY: Food\n\
                 DESCRIPTION: lunch\nFEEDBACK: That's a reasonable amount for lunch!",
            ),
            RecordingStore::default(),
        );

        let msg = h.pipeline.extract_and_record("Bought lunch for 50 yesterday", h.user).await;

        assert!(msg.is_success(), "{}", msg.text);
        let tx = msg.transaction().unwrap();
        assert_eq!(tx.category_id, h.food);
        assert_eq!(tx.amount, Money::from_cents(5000));
        assert_eq!(tx.direction, Direction::Expense);
        assert_eq!(tx.user_id, h.user);
        assert_eq!(
            msg.text,
            "✅ Added expense transaction: lunch, 50.00, date: 2024-01-29 00:00:00+00, category: Food.\n\
             💬 That's a reasonable amount for lunch!"
        );
        assert_eq!(h.store.inserted.lock().await.as_slice(), [tx.clone()]);
        assert_eq!(h.store.attempts(), 1);
    }

    #[tokio::test]
    async fn prompt_lists_the_users_categories() {
        let h = harness(reply("AMOUNT: 5\nTYPE: Expense\nDESCRIPTION: tea"), RecordingStore::default());
        h.pipeline.extract_and_record("tea for 5", h.user).await;

        let prompt = h.generator.last_prompt().await.unwrap();
        assert!(prompt.contains("Text: tea for 5"));
        assert!(prompt.contains("Food, Transportation"));
        assert!(prompt.contains("Current date: 2024-01-30 12:00:00+00"));
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let h = harness(
            reply("CREATED_AT: 2024-01-29T00:00:00Z\nAMOUNT: 0\nTYPE: Expense\nDESCRIPTION: lunch"),
            RecordingStore::default(),
        );

        let msg = h.pipeline.extract_and_record("lunch", h.user).await;

        assert!(!msg.is_success());
        assert_eq!(
            msg.reject_reason(),
            Some(&RejectReason::Validation(vec![InvalidField::Amount]))
        );
        assert!(msg.text.contains("amount"));
        assert_eq!(h.store.attempts(), 0);
    }

    #[tokio::test]
    async fn future_date_short_circuits_validation() {
        let h = harness(
            reply("CREATED_AT: 2024-02-01T12:00:00Z\nAMOUNT: 50\nTYPE: Expense\nCATEGORY: Food\nDESCRIPTION: lunch"),
            RecordingStore::default(),
        );

        let msg = h.pipeline.extract_and_record("lunch in two days", h.user).await;

        assert_eq!(msg.text, FUTURE_DATE_MESSAGE);
        assert_eq!(
            msg.outcome,
            Outcome::Rejected {
                reason: RejectReason::FutureDated,
                stage: Stage::DateChecked,
            }
        );
        assert_eq!(h.directory.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.attempts(), 0);
    }

    #[tokio::test]
    async fn future_date_wins_over_missing_fields() {
        let h = harness(reply("CREATED_AT: tomorrow\nAMOUNT: 0"), RecordingStore::default());
        let msg = h.pipeline.extract_and_record("?", h.user).await;
        assert_eq!(msg.reject_reason(), Some(&RejectReason::FutureDated));
        assert_eq!(h.store.attempts(), 0);
    }

    #[tokio::test]
    async fn unknown_category_is_recorded_as_uncategorized() {
        let h = harness(
            reply("AMOUNT: 3\nTYPE: Expense\nCATEGORY: Bubblegum\nDESCRIPTION: gum"),
            RecordingStore::default(),
        );

        let msg = h.pipeline.extract_and_record("gum for 3", h.user).await;

        assert!(msg.is_success());
        let tx = msg.transaction().unwrap();
        assert!(tx.category_id.is_uncategorized());
        assert_eq!(tx.category_name, "Uncategorized");
        assert!(msg.text.contains("category: Uncategorized."));
    }

    #[tokio::test]
    async fn income_category_on_an_expense_falls_back() {
        let h = harness(
            reply("AMOUNT: 3\nTYPE: Expense\nCATEGORY: Salary\nDESCRIPTION: gum"),
            RecordingStore::default(),
        );
        let msg = h.pipeline.extract_and_record("gum for 3", h.user).await;
        assert!(msg.transaction().unwrap().category_id.is_uncategorized());
    }

    #[tokio::test]
    async fn generation_failure_never_touches_the_store() {
        let h = harness(MockGenerator::failing("timeout"), RecordingStore::default());

        let msg = h.pipeline.extract_and_record("lunch 50", h.user).await;

        assert_eq!(msg.text, GENERATION_FAILURE_MESSAGE);
        assert_eq!(
            msg.outcome,
            Outcome::Rejected {
                reason: RejectReason::GenerationFailure,
                stage: Stage::ModelInvoked,
            }
        );
        assert_eq!(h.generator.calls(), 1);
        assert_eq!(h.store.attempts(), 0);
    }

    #[tokio::test]
    async fn error_flagged_and_empty_replies_are_generation_failures() {
        for text in ["", "   \n ", "Error: rate limited", "ERROR"] {
            let h = harness(reply(text), RecordingStore::default());
            let msg = h.pipeline.extract_and_record("lunch 50", h.user).await;
            assert_eq!(msg.reject_reason(), Some(&RejectReason::GenerationFailure), "{text:?}");
            assert_eq!(h.store.attempts(), 0);
        }
    }

    #[tokio::test]
    async fn every_missing_field_is_reported() {
        let h = harness(reply("AMOUNT: 0\nTYPE: Transfer\nDESCRIPTION: "), RecordingStore::default());

        let msg = h.pipeline.extract_and_record("?", h.user).await;

        assert_eq!(
            msg.text,
            "❌ Cannot add transaction: missing description, amount, transaction type ('Income' or 'Expense'). \
             Please provide complete details and try again."
        );
        assert_eq!(msg.outcome, Outcome::Rejected {
            reason: RejectReason::Validation(vec![
                InvalidField::Description,
                InvalidField::Amount,
                InvalidField::Direction,
            ]),
            stage: Stage::Validated,
        });
        assert_eq!(h.store.attempts(), 0);
    }

    #[tokio::test]
    async fn missing_date_uses_the_clock() {
        let h = harness(
            reply("AMOUNT: 8000\nTYPE: Income\nCATEGORY: Salary\nDESCRIPTION: salary"),
            RecordingStore::default(),
        );
        let msg = h.pipeline.extract_and_record("Received salary 8000 today", h.user).await;
        assert_eq!(msg.transaction().unwrap().occurred_at, now());
        assert!(msg.text.starts_with("✅ Added income transaction: salary, 8000.00,"));
        assert!(!msg.text.contains('💬'));
    }

    #[tokio::test]
    async fn persistence_failure_is_reported() {
        let h = harness(
            reply("AMOUNT: 5\nTYPE: Expense\nDESCRIPTION: tea"),
            RecordingStore {
                fail: true,
                ..RecordingStore::default()
            },
        );

        let msg = h.pipeline.extract_and_record("tea 5", h.user).await;

        assert_eq!(msg.text, PERSISTENCE_FAILURE_MESSAGE);
        assert_eq!(
            msg.outcome,
            Outcome::Rejected {
                reason: RejectReason::PersistenceFailure,
                stage: Stage::Persisted,
            }
        );
        assert_eq!(h.store.attempts(), 1);
        assert!(h.store.inserted.lock().await.is_empty());
    }

    #[tokio::test]
    async fn split_amount_reply_is_recorded_as_income() {
        let h = harness(
            reply("DATE: today\nEXPENSE: \nINCOME: 8000\nCATEGORY: Salary\nDESCRIPTION: salary"),
            RecordingStore::default(),
        );
        let msg = h.pipeline.extract_and_record("Received salary 8000 today", h.user).await;
        let tx = msg.transaction().unwrap();
        assert_eq!(tx.direction, Direction::Income);
        assert_eq!(tx.category_name, "Salary");
    }

    #[tokio::test]
    async fn currency_label_is_appended() {
        let h = harness(reply("AMOUNT: 150\nTYPE: Expense\nDESCRIPTION: dinner"), RecordingStore::default());
        let pipeline = h.pipeline.with_options(PipelineOptions {
            currency: Some("EGP".into()),
        });
        let msg = pipeline.extract_and_record("Had dinner for 150", h.user).await;
        assert!(msg.text.contains("dinner, 150.00 EGP, date:"), "{}", msg.text);
    }

    #[test]
    fn error_flag_detection() {
        assert!(is_error_flagged(""));
        assert!(is_error_flagged("\n  error occurred"));
        assert!(!is_error_flagged("AMOUNT: 5\nFEEDBACK: no errors here"));
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let msg = FeedbackMessage {
            outcome: Outcome::Rejected {
                reason: RejectReason::Validation(vec![InvalidField::Amount]),
                stage: Stage::Validated,
            },
            text: "x".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["outcome"]["status"], "rejected");
        assert_eq!(json["outcome"]["reason"]["kind"], "validation");
        assert_eq!(json["outcome"]["reason"]["fields"][0], "amount");
        assert_eq!(json["outcome"]["stage"], "validated");
    }
}
