use chrono::{DateTime, Utc};
use finsight_core::{is_placeholder, Direction, Money};
use regex::Regex;

use crate::dates::DateResolver;
use crate::types::{AmountField, ParsedTransactionFields};

// One regex per label: case-insensitive, anchored at a line start, first match wins.
re!(re_created_at, r"(?im)^[ \t]*created_at:(.*)$");
re!(re_date, r"(?im)^[ \t]*date:(.*)$");
re!(re_amount, r"(?im)^[ \t]*amount:(.*)$");
re!(re_type, r"(?im)^[ \t]*type:(.*)$");
re!(re_expense, r"(?im)^[ \t]*expense:(.*)$");
re!(re_income, r"(?im)^[ \t]*income:(.*)$");
re!(re_expense_income, r"(?im)^[ \t]*expense/income:(.*)$");
re!(re_category, r"(?im)^[ \t]*category:(.*)$");
re!(re_description, r"(?im)^[ \t]*description:(.*)$");
re!(re_feedback, r"(?im)^[ \t]*feedback:(.*)$");

// Optional currency symbol or code, then the number. A leading sign means "not an amount".
re!(re_number, r"^(?:[$€£¥]|[A-Za-z]{3})?\s*(\d[\d,]*(?:\.\d+)?|\.\d+)");

// ── Public parsing API ───────────────────────────────────────────────────────

/// Best-effort scanner for labelled-line model output.
///
/// Each field is extracted independently; a missing or malformed line yields
/// that field's default and never an error. Relabelled output is not recovered.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses `text`, resolving dates against `now`. Pure: same input, same output.
    pub fn parse(text: &str, now: DateTime<Utc>) -> ParsedTransactionFields {
        let date_raw = label(re_created_at(), text).or_else(|| label(re_date(), text));
        let occurred_at = DateResolver::resolve(date_raw, now);

        ParsedTransactionFields {
            occurred_at,
            amount: Self::extract_amount(text),
            category_label: label(re_category(), text).and_then(present),
            description: label(re_description(), text).and_then(present),
            feedback_text: label(re_feedback(), text).unwrap_or_default().to_string(),
        }
    }

    fn extract_amount(text: &str) -> AmountField {
        let amount = label(re_amount(), text);
        let kind = label(re_type(), text);
        if amount.is_some() || kind.is_some() {
            return AmountField::Single {
                amount: amount.map(parse_amount).unwrap_or_else(Money::zero),
                direction: kind.and_then(Direction::parse),
            };
        }

        let expense = label(re_expense(), text);
        let income = label(re_income(), text);
        let combined = label(re_expense_income(), text);
        if expense.is_none() && income.is_none() && combined.is_none() {
            return AmountField::default();
        }

        let expense = expense.map(parse_amount).unwrap_or_else(Money::zero);
        let income = income.map(parse_amount).unwrap_or_else(Money::zero);
        match combined.map(parse_amount) {
            Some(value) if !expense.is_positive() && !income.is_positive() => AmountField::Split {
                expense: value,
                income: Money::zero(),
                combined: true,
            },
            _ => AmountField::Split {
                expense,
                income,
                combined: false,
            },
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Remainder of the first line carrying this label, trimmed.
fn label<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Strips decoration and trailing punctuation; placeholders become `None`.
fn present(raw: &str) -> Option<String> {
    let value = raw
        .trim_matches(['"', '\'', '[', ']', '*'])
        .trim()
        .trim_end_matches([',', '.', ';'])
        .trim();
    if is_placeholder(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Non-numeric, negative or missing values parse as zero.
fn parse_amount(raw: &str) -> Money {
    re_number()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(',', ""))
        .and_then(|digits| match digits.strip_prefix('.') {
            Some(fraction) => Money::parse(&format!("0.{fraction}")),
            None => Money::parse(&digits),
        })
        .unwrap_or_else(Money::zero)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 30, 12, 0, 0).unwrap()
    }

    const LUNCH: &str = "CREATED_AT: 2024-01-29T00:00:00Z\n\
                         AMOUNT: 50\n\
                         TYPE: Expense\n\
                         CATEGORY: Food\n\
                         DESCRIPTION: lunch\n\
                         FEEDBACK: That's a reasonable amount for lunch!";

    #[test]
    fn parses_complete_response() {
        let f = ResponseParser::parse(LUNCH, now());
        assert_eq!(f.occurred_at, Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap());
        assert_eq!(
            f.amount,
            AmountField::Single {
                amount: Money::from_cents(5000),
                direction: Some(Direction::Expense),
            }
        );
        assert_eq!(f.category_label.as_deref(), Some("Food"));
        assert_eq!(f.description.as_deref(), Some("lunch"));
        assert_eq!(f.feedback_text, "That's a reasonable amount for lunch!");
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(ResponseParser::parse(LUNCH, now()), ResponseParser::parse(LUNCH, now()));
    }

    #[test]
    fn labels_are_case_insensitive_and_may_be_indented() {
        let text = "    created_at: 2024-01-29\n  Amount: 12.5\n  type: income\n  Description: refund";
        let f = ResponseParser::parse(text, now());
        assert_eq!(
            f.amount,
            AmountField::Single {
                amount: Money::from_cents(1250),
                direction: Some(Direction::Income),
            }
        );
        assert_eq!(f.description.as_deref(), Some("refund"));
    }

    #[test]
    fn first_matching_line_wins() {
        let text = "AMOUNT: 10\nAMOUNT: 99\nTYPE: Expense";
        let (amount, _) = ResponseParser::parse(text, now()).resolve_amount();
        assert_eq!(amount, Money::from_cents(1000));
    }

    #[test]
    fn trailing_commas_from_the_template_are_stripped() {
        let text = "CREATED_AT: 2024-01-29T00:00:00Z,\nAMOUNT: 2,000,\nTYPE: Income,\nCATEGORY: Freelance,\nDESCRIPTION: upwork.";
        let f = ResponseParser::parse(text, now());
        assert_eq!(f.occurred_at, Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap());
        assert_eq!(f.resolve_amount(), (Money::from_cents(200_000), Some(Direction::Income)));
        assert_eq!(f.category_label.as_deref(), Some("Freelance"));
        assert_eq!(f.description.as_deref(), Some("upwork"));
    }

    #[test]
    fn empty_input_yields_defaults() {
        let f = ResponseParser::parse("", now());
        assert_eq!(f.occurred_at, now());
        assert_eq!(f.amount, AmountField::default());
        assert!(f.category_label.is_none());
        assert!(f.description.is_none());
        assert!(f.feedback_text.is_empty());
    }

    #[test]
    fn missing_date_defaults_to_now() {
        let f = ResponseParser::parse("AMOUNT: 5\nTYPE: Expense", now());
        assert_eq!(f.occurred_at, now());
    }

    #[test]
    fn date_label_is_accepted_when_created_at_is_absent() {
        let f = ResponseParser::parse("DATE: 2024-01-20\nEXPENSE: 5", now());
        assert_eq!(f.occurred_at, Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn placeholders_are_absent() {
        let text = "AMOUNT: 5\nTYPE: Expense\nCATEGORY: \nDESCRIPTION: No Description";
        let f = ResponseParser::parse(text, now());
        assert!(f.category_label.is_none());
        assert!(f.description.is_none());
    }

    #[test]
    fn non_numeric_and_negative_amounts_are_zero() {
        assert_eq!(parse_amount("fifty"), Money::zero());
        assert_eq!(parse_amount("-50"), Money::zero());
        assert_eq!(parse_amount(""), Money::zero());
    }

    #[test]
    fn amount_tolerates_currency_markers() {
        assert_eq!(parse_amount("$49.99"), Money::from_cents(4999));
        assert_eq!(parse_amount("EGP 150"), Money::from_cents(15000));
        assert_eq!(parse_amount("150 EGP"), Money::from_cents(15000));
        assert_eq!(parse_amount("1,234.56"), Money::from_cents(123456));
        assert_eq!(parse_amount("EGP150"), Money::from_cents(15000));
        assert_eq!(parse_amount("usd 7.25"), Money::from_cents(725));
    }

    #[test]
    fn fraction_without_leading_digit() {
        assert_eq!(parse_amount(".5"), Money::from_cents(50));
        assert_eq!(parse_amount("$.99"), Money::from_cents(99));
        assert_eq!(parse_amount("."), Money::zero());
    }

    #[test]
    fn unrecognised_type_is_not_guessed() {
        let f = ResponseParser::parse("AMOUNT: 5\nTYPE: Transfer", now());
        assert_eq!(f.resolve_amount().1, None);
    }

    #[test]
    fn split_amount_lines() {
        let text = "DATE: today\nEXPENSE: \nINCOME: 8000\nCATEGORY: Salary\nDESCRIPTION: salary";
        let f = ResponseParser::parse(text, now());
        assert_eq!(
            f.amount,
            AmountField::Split {
                expense: Money::zero(),
                income: Money::from_cents(800_000),
                combined: false,
            }
        );
    }

    #[test]
    fn combined_label_is_not_confused_with_expense_or_income() {
        let text = "EXPENSE/INCOME: 300\nDESCRIPTION: diapers";
        let f = ResponseParser::parse(text, now());
        assert_eq!(
            f.amount,
            AmountField::Split {
                expense: Money::from_cents(30000),
                income: Money::zero(),
                combined: true,
            }
        );
    }

    #[test]
    fn future_dates_are_returned_unchanged() {
        let f = ResponseParser::parse("CREATED_AT: 2024-02-01T12:00:00Z", now());
        assert!(DateResolver::is_future(f.occurred_at, now()));
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = ResponseParser::parse("!@#$%^&*()\n\0\x01\x02\nAMOUNT:\nTYPE:", now());
    }
}
