use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc, Weekday};

const NUMBER: &str = r"(\d{1,4}|a|an|one|two|three|four|five|six|seven|eight|nine|ten)";

re!(re_ago,
    &format!(r"^{NUMBER}\s+(minute|hour|day|week|month|year)s?\s+ago$"));
re!(re_ahead,
    &format!(r"^(?:in|after)\s+{NUMBER}\s+(minute|hour|day|week|month|year)s?$"));
re!(re_last_weekday,
    r"^(?:last|past|this past)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$");
re!(re_month_day,
    r"^(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?$");

/// Formats that carry an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S %#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// Formats without an offset; interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only formats; resolved to midnight UTC. Slash dates are read as US month/day.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%A, %B %d, %Y",
];

/// Turns free-text date expressions into absolute UTC instants.
pub struct DateResolver;

impl DateResolver {
    /// Resolves `expr` relative to `now`.
    ///
    /// Absent, empty, `unknown…` and unparseable expressions all resolve to
    /// `now`; parse failures are deliberately not reported. Future instants are
    /// returned as-is: rejecting them is the caller's decision (see
    /// [`DateResolver::is_future`]).
    pub fn resolve(expr: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
        let Some(cleaned) = expr.map(clean) else {
            return now;
        };
        if cleaned.is_empty() || cleaned.to_lowercase().starts_with("unknown") {
            return now;
        }
        Self::parse(&cleaned, now).unwrap_or(now)
    }

    /// Strict variant of [`DateResolver::resolve`]: `None` when nothing matched.
    pub fn parse(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let expr = clean(expr);
        parse_absolute(&expr).or_else(|| parse_relative(&expr.to_lowercase(), now))
    }

    pub fn is_future(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        at > now
    }
}

fn clean(expr: &str) -> String {
    expr.trim()
        .trim_matches(['[', ']', '"', '\'', '`'])
        .trim_end_matches([',', '.'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Absolute forms ────────────────────────────────────────────────────────────

fn parse_absolute(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(midnight_utc)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

// ── Relative forms ────────────────────────────────────────────────────────────

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match s {
        "now" | "just now" | "today" | "earlier today" | "this morning" | "this afternoon"
        | "this evening" | "tonight" => return Some(now),
        "yesterday" | "last night" | "yesterday morning" | "yesterday afternoon"
        | "yesterday evening" => return shift(now, -1, "day"),
        "day before yesterday" | "the day before yesterday" => return shift(now, -2, "day"),
        "tomorrow" => return shift(now, 1, "day"),
        "day after tomorrow" | "the day after tomorrow" => return shift(now, 2, "day"),
        "last week" | "a week ago" => return shift(now, -1, "week"),
        "next week" => return shift(now, 1, "week"),
        "last month" => return shift(now, -1, "month"),
        "next month" => return shift(now, 1, "month"),
        "last year" => return shift(now, -1, "year"),
        _ => {}
    }

    if let Some(c) = re_ago().captures(s) {
        let n = number_word(c.get(1)?.as_str())?;
        return shift(now, -n, c.get(2)?.as_str());
    }
    if let Some(c) = re_ahead().captures(s) {
        let n = number_word(c.get(1)?.as_str())?;
        return shift(now, n, c.get(2)?.as_str());
    }
    if let Some(c) = re_last_weekday().captures(s) {
        let target = weekday(c.get(1)?.as_str())?;
        let today = now.weekday().num_days_from_monday() as i64;
        let wanted = target.num_days_from_monday() as i64;
        let back = match (today - wanted).rem_euclid(7) {
            0 => 7,
            d => d,
        };
        return shift(now, -back, "day");
    }
    if let Some(c) = re_month_day().captures(s) {
        let month = month_to_num(c.get(1)?.as_str())?;
        let day: u32 = c.get(2)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(now.year(), month, day).and_then(midnight_utc);
    }
    None
}

fn shift(now: DateTime<Utc>, n: i64, unit: &str) -> Option<DateTime<Utc>> {
    let delta = match unit {
        "minute" => TimeDelta::try_minutes(n)?,
        "hour" => TimeDelta::try_hours(n)?,
        "day" => TimeDelta::try_days(n)?,
        "week" => TimeDelta::try_weeks(n)?,
        "month" | "year" => {
            let months = if unit == "year" { n.checked_mul(12)? } else { n };
            let m = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            return if months < 0 {
                now.checked_sub_months(m)
            } else {
                now.checked_add_months(m)
            };
        }
        _ => return None,
    };
    now.checked_add_signed(delta)
}

fn number_word(s: &str) -> Option<i64> {
    match s {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        digits => digits.parse().ok(),
    }
}

fn weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_to_num(name: &str) -> Option<u32> {
    match name.get(..3)? {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}
