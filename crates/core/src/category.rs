use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map($name)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(CategoryId);
uuid_id!(TransactionId);

pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

impl CategoryId {
    /// Well-known id every unresolved, absent or "uncategorized" label collapses to.
    pub const UNCATEGORIZED: CategoryId =
        CategoryId(Uuid::from_u128(0xb179e1a0_9215_4914_b5b1_7851452bc1be));

    pub fn is_uncategorized(self) -> bool {
        self == CategoryId::UNCATEGORIZED
    }
}

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    /// Accepts exactly `income` / `expense`, ignoring case, surrounding
    /// whitespace and trailing `,` / `.`.
    pub fn parse(raw: &str) -> Option<Direction> {
        let cleaned = raw.trim().trim_end_matches([',', '.', ' ']);
        if cleaned.eq_ignore_ascii_case("income") {
            Some(Direction::Income)
        } else if cleaned.eq_ignore_ascii_case("expense") {
            Some(Direction::Expense)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Income => "Income",
            Direction::Expense => "Expense",
        }
    }

    pub fn as_str_lower(self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::parse(s).ok_or_else(|| format!("Unknown transaction type: '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    /// `None` for the global taxonomy.
    pub user_id: Option<UserId>,
    pub name: String,
    pub direction: Direction,
}

/// The outcome of category resolution: always an id, plus the name shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedCategory {
    pub id: CategoryId,
    pub name: String,
}

impl ResolvedCategory {
    pub fn uncategorized() -> Self {
        ResolvedCategory {
            id: CategoryId::UNCATEGORIZED,
            name: UNCATEGORIZED_NAME.to_string(),
        }
    }
}

/// How a category label is compared against known names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatching {
    Exact,
    #[default]
    CaseInsensitive,
}

impl CategoryMatching {
    pub fn matches(self, known: &str, label: &str) -> bool {
        match self {
            CategoryMatching::Exact => known == label,
            CategoryMatching::CaseInsensitive => known.eq_ignore_ascii_case(label),
        }
    }
}

/// True for labels that must resolve to uncategorized without any lookup.
pub fn is_uncategorized_label(label: Option<&str>) -> bool {
    match label.map(str::trim) {
        None => true,
        Some(l) => l.is_empty() || l.eq_ignore_ascii_case(UNCATEGORIZED_NAME),
    }
}

/// The fixed global taxonomy.
pub const DEFAULT_CATEGORIES: &[(&str, Direction)] = &[
    ("Food", Direction::Expense),
    ("Health", Direction::Expense),
    ("Transportation", Direction::Expense),
    ("Entertainment", Direction::Expense),
    ("Fashion", Direction::Expense),
    ("Lifestyle", Direction::Expense),
    ("Education", Direction::Expense),
    ("Salary", Direction::Income),
    ("Freelance", Direction::Income),
    ("Investments", Direction::Income),
    ("Bonus", Direction::Income),
    ("Refunds", Direction::Income),
];
