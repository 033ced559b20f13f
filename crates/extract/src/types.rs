use chrono::{DateTime, Utc};
use finsight_core::{Direction, Money};
use serde::{Deserialize, Serialize};

/// How the model reported the amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmountField {
    /// `AMOUNT:` plus an optional `TYPE:` line.
    Single {
        amount: Money,
        direction: Option<Direction>,
    },
    /// `EXPENSE:` / `INCOME:` lines; direction is implied by which one is positive.
    /// `combined` is set when the value came from an `EXPENSE/INCOME:` line.
    Split {
        expense: Money,
        income: Money,
        combined: bool,
    },
}

impl Default for AmountField {
    fn default() -> Self {
        AmountField::Single {
            amount: Money::zero(),
            direction: None,
        }
    }
}

/// Structured fields pulled from one model response. Ephemeral: built per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransactionFields {
    /// Never empty: unparseable or missing dates fall back to the reference instant.
    pub occurred_at: DateTime<Utc>,
    pub amount: AmountField,
    /// Raw label, `None` when missing or a placeholder.
    pub category_label: Option<String>,
    /// `None` when missing or a placeholder.
    pub description: Option<String>,
    /// Advisory text for the user; empty when absent.
    pub feedback_text: String,
}

impl ParsedTransactionFields {
    /// Collapses either amount shape into `(amount, direction)`.
    ///
    /// For split amounts the expense side wins when positive, then income. When
    /// neither is positive the direction defaults to expense, so validation only
    /// reports the amount.
    pub fn resolve_amount(&self) -> (Money, Option<Direction>) {
        match &self.amount {
            AmountField::Single { amount, direction } => (*amount, *direction),
            AmountField::Split {
                expense,
                income,
                combined,
            } => {
                if expense.is_positive() {
                    if *combined {
                        tracing::warn!(
                            amount = %expense,
                            "ambiguous EXPENSE/INCOME label, recording as expense"
                        );
                    }
                    (*expense, Some(Direction::Expense))
                } else if income.is_positive() {
                    (*income, Some(Direction::Income))
                } else {
                    (Money::zero(), Some(Direction::Expense))
                }
            }
        }
    }
}
