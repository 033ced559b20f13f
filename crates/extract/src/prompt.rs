use chrono::{DateTime, Utc};
use finsight_core::UNCATEGORIZED_NAME;

use crate::category::CategoryLists;

/// Timestamp layout used in prompts and user-facing messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S+00";

const PROMPT: &str = r#"
Extract transaction details from the following text and classify the amount as either income or expense (TYPE).
Extract date (handle relative dates like 'yesterday'), a description, and the category.
If a specific date is not mentioned, assume today's date. If you can't classify the amount as either income or expense,
assume it is expense and keep it uncategorized. Provide a natural response about the spending.

Text: {INPUT_TEXT}

Current date: {CURRENT_DATE}

Format your response as follows:
CREATED_AT: [Extract the date, handle relative dates like 'this morning', 'yesterday', 'last week', etc. ISO8601 date, e.g., 2025-06-16T15:30:00Z]
AMOUNT: [numeric amount]
TYPE: [Income or Expense]
CATEGORY: [Classify into one of if expense: {EXPENSE_CATEGORIES}
           Classify into one of if income: {INCOME_CATEGORIES}]
DESCRIPTION: [one or two word description of the transaction]
FEEDBACK: [Provide a natural, conversational response about the spending. Consider:
- If it's a good deal or expensive for that category
- Suggest money-saving tips if relevant
- Compliment good financial decisions
- Express concern for unusually high spending
- Comment on the timing or necessity of the purchase
Make it sound natural and varied.]

Example:
Input: "I got today 2,000 from upwork"
CREATED_AT: 2024-01-30T00:00:00Z
AMOUNT: 2000
TYPE: Income
CATEGORY: Freelance
DESCRIPTION: upwork
FEEDBACK: That's wonderful, congrats on your Freelance job!

Input: "Bought lunch for 50 yesterday"
CREATED_AT: 2024-01-29T00:00:00Z
AMOUNT: 50
TYPE: Expense
CATEGORY: Food
DESCRIPTION: lunch
FEEDBACK: That's a reasonable amount for lunch! If you're looking to save more, you might consider bringing lunch from home occasionally.
"#;

/// Renders the extraction prompt for one input sentence.
pub fn build_prompt(input_text: &str, now: DateTime<Utc>, categories: &CategoryLists) -> String {
    // Input goes in last so braces in user text are never treated as placeholders.
    PROMPT
        .replace("{CURRENT_DATE}", &now.format(TIMESTAMP_FORMAT).to_string())
        .replace("{EXPENSE_CATEGORIES}", &render_list(&categories.expense))
        .replace("{INCOME_CATEGORIES}", &render_list(&categories.income))
        .replace("{INPUT_TEXT}", input_text.trim())
}

fn render_list(names: &[String]) -> String {
    if names.is_empty() {
        UNCATEGORIZED_NAME.to_string()
    } else {
        names.join(", ")
    }
}
