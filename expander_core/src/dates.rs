use std::sync::LazyLock;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use chrono::Timelike;
use regex::Regex;

/// Display form of an instant that failed to parse.
pub const INVALID_DATE: &str = "Invalid Date";

/// Format tokens ordered longest first so `MM` is never consumed as `M`
/// followed by a literal `M`.
const FORMAT_TOKENS: [&str; 16] = [
	"YYYY", "YY", "MM", "DD", "HH", "hh", "mm", "ss", "M", "D", "H", "h", "m", "s", "A", "a",
];

static DASHED_DATE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid dashed date regex"));
static SLASHED_DATE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(\d{4})/(\d{2})/(\d{2})").expect("valid slashed date regex"));
static COMPACT_DATE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").expect("valid compact date regex"));

const STANDARD_DATETIME_FORMATS: [&str; 5] = [
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%dT%H:%M",
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%d %H:%M",
	"%Y-%m-%d",
];

// `%B` also accepts abbreviated month names when parsing.
const HUMAN_DATE_FORMATS: [&str; 6] = [
	"%B %d, %Y",
	"%B %d %Y",
	"%d %B %Y",
	"%A, %B %d, %Y",
	"%m/%d/%Y",
	"%d.%m.%Y",
];

/// The current local wall-clock instant.
pub fn now() -> NaiveDateTime {
	Local::now().naive_local()
}

/// Midnight at the start of the current local day.
pub fn today() -> NaiveDateTime {
	start_of_day(now())
}

pub fn start_of_day(instant: NaiveDateTime) -> NaiveDateTime {
	instant.date().and_time(NaiveTime::MIN)
}

/// Parse free-form text into an instant.
///
/// Attempts are made in a fixed order: an embedded `YYYY-MM-DD`, an embedded
/// `YYYY/MM/DD`, a leading `YYYYMMDD`, a standards parse of the trimmed text
/// (RFC 3339, ISO date-time, RFC 2822) and finally a handful of
/// human-written formats such as `June 20, 2024`. Blank input never parses.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
	let trimmed = text.trim();
	if trimmed.is_empty() {
		return None;
	}

	for pattern in [&*DASHED_DATE, &*SLASHED_DATE] {
		if let Some(date) = pattern.captures(trimmed).and_then(|caps| ymd_from_captures(&caps)) {
			return Some(date.and_time(NaiveTime::MIN));
		}
	}

	if let Some(date) = COMPACT_DATE
		.captures(trimmed)
		.and_then(|caps| ymd_from_captures(&caps))
	{
		return Some(date.and_time(NaiveTime::MIN));
	}

	parse_standard(trimmed).or_else(|| parse_human(trimmed))
}

fn ymd_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
	let year = caps.get(1)?.as_str().parse().ok()?;
	let month = caps.get(2)?.as_str().parse().ok()?;
	let day = caps.get(3)?.as_str().parse().ok()?;
	NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_standard(text: &str) -> Option<NaiveDateTime> {
	if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
		return Some(instant.with_timezone(&Local).naive_local());
	}

	for format in STANDARD_DATETIME_FORMATS {
		if let Ok(instant) = NaiveDateTime::parse_from_str(text, format) {
			return Some(instant);
		}
		if let Ok(date) = NaiveDate::parse_from_str(text, format) {
			return Some(date.and_time(NaiveTime::MIN));
		}
	}

	DateTime::parse_from_rfc2822(text)
		.ok()
		.map(|instant| instant.with_timezone(&Local).naive_local())
}

fn parse_human(text: &str) -> Option<NaiveDateTime> {
	HUMAN_DATE_FORMATS.iter().find_map(|format| {
		NaiveDate::parse_from_str(text, format)
			.ok()
			.map(|date| date.and_time(NaiveTime::MIN))
	})
}

/// The ISO-8601 form used when a date is coerced to a string.
pub fn to_iso_string(instant: Option<NaiveDateTime>) -> String {
	match instant {
		Some(instant) => instant.format("%Y-%m-%dT%H:%M:%S").to_string(),
		None => INVALID_DATE.to_string(),
	}
}

/// Substitute format tokens in `pattern`. Characters that don't start a
/// token are copied through unchanged.
pub fn format_date(instant: NaiveDateTime, pattern: &str) -> String {
	let mut output = String::with_capacity(pattern.len() + 8);
	let mut rest = pattern;

	'outer: while let Some(ch) = rest.chars().next() {
		for token in FORMAT_TOKENS {
			if rest.starts_with(token) {
				output.push_str(&render_token(instant, token));
				rest = &rest[token.len()..];
				continue 'outer;
			}
		}

		output.push(ch);
		rest = &rest[ch.len_utf8()..];
	}

	output
}

fn render_token(instant: NaiveDateTime, token: &str) -> String {
	let hour12 = match instant.hour() % 12 {
		0 => 12,
		hour => hour,
	};
	let is_pm = instant.hour() >= 12;

	match token {
		"YYYY" => format!("{:04}", instant.year()),
		"YY" => format!("{:02}", instant.year().rem_euclid(100)),
		"MM" => format!("{:02}", instant.month()),
		"M" => instant.month().to_string(),
		"DD" => format!("{:02}", instant.day()),
		"D" => instant.day().to_string(),
		"HH" => format!("{:02}", instant.hour()),
		"H" => instant.hour().to_string(),
		"hh" => format!("{hour12:02}"),
		"h" => hour12.to_string(),
		"mm" => format!("{:02}", instant.minute()),
		"m" => instant.minute().to_string(),
		"ss" => format!("{:02}", instant.second()),
		"s" => instant.second().to_string(),
		"A" => (if is_pm { "PM" } else { "AM" }).to_string(),
		"a" => (if is_pm { "pm" } else { "am" }).to_string(),
		_ => token.to_string(),
	}
}

/// Describe `instant` relative to `reference`, e.g. `3 days ago` or
/// `in 2 hours`.
pub fn relative_to(instant: NaiveDateTime, reference: NaiveDateTime) -> String {
	const MINUTE: i64 = 60;
	const HOUR: i64 = 60 * MINUTE;
	const DAY: i64 = 24 * HOUR;
	const MONTH: i64 = 30 * DAY;
	const YEAR: i64 = 365 * DAY;

	let seconds = (reference - instant).num_seconds();
	let distance = seconds.abs();

	if distance < 45 {
		return "just now".to_string();
	}

	let (count, unit) = if distance < HOUR {
		((distance + MINUTE / 2) / MINUTE, "minute")
	} else if distance < DAY {
		(distance / HOUR, "hour")
	} else if distance < MONTH {
		(distance / DAY, "day")
	} else if distance < YEAR {
		(distance / MONTH, "month")
	} else {
		(distance / YEAR, "year")
	};

	let plural = if count == 1 { "" } else { "s" };
	if seconds < 0 {
		format!("in {count} {unit}{plural}")
	} else {
		format!("{count} {unit}{plural} ago")
	}
}

/// Shift `instant` by a (possibly fractional or negative) number of days.
/// Returns `None` when the offset isn't finite or overflows.
pub fn add_days(instant: NaiveDateTime, days: f64) -> Option<NaiveDateTime> {
	if !days.is_finite() {
		return None;
	}

	let seconds = (days * 86_400.0).round();
	if seconds.abs() > 1e15 {
		return None;
	}

	instant.checked_add_signed(TimeDelta::try_seconds(seconds as i64)?)
}
