use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::category::{CategoryId, Direction, ResolvedCategory, TransactionId, UserId};
use super::money::Money;

/// Placeholder the model emits when it could not find a description.
pub const PLACEHOLDER_DESCRIPTION: &str = "No Description";

/// True for values that count as absent: empty, whitespace, or the placeholder.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(PLACEHOLDER_DESCRIPTION)
}

/// A field that failed validation. Display strings are user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidField {
    Description,
    Amount,
    Direction,
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidField::Description => write!(f, "description"),
            InvalidField::Amount => write!(f, "amount"),
            InvalidField::Direction => write!(f, "transaction type ('Income' or 'Expense')"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {}", join_fields(.fields))]
pub struct ValidationError {
    /// Every failing check, in description/amount/direction order.
    pub fields: Vec<InvalidField>,
}

impl ValidationError {
    pub fn field_list(&self) -> String {
        join_fields(&self.fields)
    }
}

fn join_fields(fields: &[InvalidField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parsed, category-resolved fields awaiting business-rule checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftTransaction {
    pub user_id: UserId,
    pub category: ResolvedCategory,
    pub description: Option<String>,
    pub amount: Money,
    pub direction: Option<Direction>,
    pub occurred_at: DateTime<Utc>,
}

/// A validated transaction, ready to hand to a store. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTransaction {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub category_name: String,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
}

impl ResolvedTransaction {
    /// Runs every check without short-circuiting and assigns a fresh id on success.
    pub fn validate(draft: DraftTransaction) -> Result<ResolvedTransaction, ValidationError> {
        let mut fields = Vec::new();

        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !is_placeholder(d));
        if description.is_none() {
            fields.push(InvalidField::Description);
        }
        if !draft.amount.is_positive() {
            fields.push(InvalidField::Amount);
        }
        if draft.direction.is_none() {
            fields.push(InvalidField::Direction);
        }

        match (description, draft.direction) {
            (Some(description), Some(direction)) if fields.is_empty() => Ok(ResolvedTransaction {
                transaction_id: TransactionId::new_v4(),
                user_id: draft.user_id,
                category_id: draft.category.id,
                category_name: draft.category.name,
                description,
                amount: draft.amount,
                direction,
                occurred_at: draft.occurred_at,
            }),
            _ => Err(ValidationError { fields }),
        }
    }
}
