use std::fmt::Display;

use chrono::Datelike;
use chrono::NaiveDateTime;
use float_cmp::approx_eq;
use regex::NoExpand;
use regex::Regex;
use serde::Serialize;

use crate::dates;

/// Upper bound on the byte length `repeat` may produce.
pub const MAX_REPEAT_BYTES: usize = 1 << 20;

/// The result of evaluating an expression or any step of a chain.
///
/// Each variant has its own method table. Calling a method that the current
/// variant doesn't define converts the value to its display string and runs
/// the method from the string table instead, so `now().upper()` upper-cases
/// the ISO form of the current instant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
	/// An instant. `None` is an invalid date, the result of a failed parse.
	Date(Option<NaiveDateTime>),
	Str(String),
	Num(f64),
	Bool(bool),
	StrList(Vec<String>),
}

impl Eq for Value {}
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Date(value), Value::Date(other_value)) => value == other_value,
			(Value::Str(value), Value::Str(other_value)) => value == other_value,
			(Value::Num(value), Value::Num(other_value)) => {
				(value.is_nan() && other_value.is_nan())
					|| approx_eq!(f64, *value, *other_value, ulps = 2)
			}
			(Value::Bool(value), Value::Bool(other_value)) => value == other_value,
			(Value::StrList(value), Value::StrList(other_value)) => value == other_value,
			_ => false,
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

impl Value {
	pub fn empty() -> Self {
		Self::Str(String::new())
	}

	/// The variant name used in trace output.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Date(_) => "date",
			Self::Str(_) => "string",
			Self::Num(_) => "number",
			Self::Bool(_) => "boolean",
			Self::StrList(_) => "list",
		}
	}

	/// Render the value the way it appears in a document.
	///
	/// Booleans become `true`/`false`, lists are joined with `", "`, numbers
	/// print without a trailing `.0` and dates use their ISO form.
	pub fn to_display_string(&self) -> String {
		match self {
			Self::Date(instant) => dates::to_iso_string(*instant),
			Self::Str(text) => text.clone(),
			Self::Num(number) => format_number(*number),
			Self::Bool(flag) => flag.to_string(),
			Self::StrList(items) => items.join(", "),
		}
	}

	/// Apply the method `name` with `args`.
	///
	/// Unknown method names leave the value unchanged.
	#[must_use]
	pub fn call_method(self, name: &str, args: &[String]) -> Value {
		let handled = match &self {
			Self::Str(text) => {
				let result = string_method(text, name, args);
				return result.unwrap_or(self);
			}
			Self::Date(instant) => date_method(*instant, name, args),
			Self::Num(number) => number_method(*number, name, args),
			Self::StrList(items) => list_method(items, name, args),
			Self::Bool(_) => None,
		};

		if let Some(value) = handled {
			return value;
		}

		string_method(&self.to_display_string(), name, args).unwrap_or(self)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.to_display_string())
	}
}

/// Format a number the way JavaScript prints it: integers without a
/// fraction, `NaN`, `Infinity` and `-Infinity`, and exponent notation such as
/// `1e+21` or `1e-7` outside `1e-6..1e21`.
pub fn format_number(number: f64) -> String {
	if number.is_nan() {
		"NaN".to_string()
	} else if number.is_infinite() {
		if number > 0.0 {
			"Infinity".to_string()
		} else {
			"-Infinity".to_string()
		}
	} else if number == 0.0 {
		// Avoid printing `-0`.
		"0".to_string()
	} else if number.abs() >= 1e21 || number.abs() < 1e-6 {
		let exponent = format!("{number:e}");
		match exponent.split_once('e') {
			Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
			_ => exponent,
		}
	} else {
		number.to_string()
	}
}

/// Parse an argument as a number. Blank or non-numeric text yields `NaN`.
///
/// The only spelled-out value accepted is `Infinity`, optionally signed;
/// `inf`, `infinity` and `nan` are not numbers.
pub fn parse_number(text: &str) -> f64 {
	let trimmed = text.trim();
	let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
	if unsigned.is_empty() {
		return f64::NAN;
	}

	if unsigned.starts_with(|ch: char| ch.is_ascii_alphabetic()) && unsigned != "Infinity" {
		return f64::NAN;
	}

	trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn string_arg<'a>(args: &'a [String], index: usize) -> &'a str {
	args.get(index).map_or("", String::as_str)
}

fn number_arg(args: &[String], index: usize) -> Option<f64> {
	args.get(index).map(|arg| parse_number(arg))
}

/// Convert an index argument to a char offset, counting negative values from
/// the end and clamping into `0..=len`.
fn resolve_index(raw: f64, len: usize) -> usize {
	if raw.is_nan() {
		return 0;
	}

	let raw = raw.trunc();
	if raw < 0.0 {
		len.saturating_sub((-raw).min(len as f64) as usize)
	} else {
		raw.min(len as f64) as usize
	}
}

pub(crate) fn string_method(text: &str, name: &str, args: &[String]) -> Option<Value> {
	let value = match name {
		"upper" | "toUpperCase" => Value::Str(text.to_uppercase()),
		"lower" | "toLowerCase" => Value::Str(text.to_lowercase()),
		"trim" => Value::Str(text.trim().to_string()),
		"replace" => Value::Str(replace_pattern(text, args)),
		"title" => Value::Str(title_case(text)),
		"slice" => {
			let chars: Vec<char> = text.chars().collect();
			let start = resolve_index(number_arg(args, 0).unwrap_or(0.0), chars.len());
			let end = number_arg(args, 1).map_or(chars.len(), |end| resolve_index(end, chars.len()));
			let slice: String = if start < end {
				chars[start..end].iter().collect()
			} else {
				String::new()
			};
			Value::Str(slice)
		}
		"repeat" => {
			let count = number_arg(args, 0).unwrap_or(0.0);
			let count = if count.is_nan() || count < 0.0 {
				0
			} else {
				count.floor() as usize
			};
			let limit = MAX_REPEAT_BYTES / text.len().max(1);
			Value::Str(text.repeat(count.min(limit)))
		}
		"startsWith" | "starts_with" => Value::Bool(text.starts_with(string_arg(args, 0))),
		"endsWith" | "ends_with" => Value::Bool(text.ends_with(string_arg(args, 0))),
		"contains" | "includes" => Value::Bool(text.contains(string_arg(args, 0))),
		"containsAll" | "contains_all" => {
			Value::Bool(args.iter().all(|needle| text.contains(needle.as_str())))
		}
		"containsAny" | "contains_any" => {
			Value::Bool(args.iter().any(|needle| text.contains(needle.as_str())))
		}
		"isEmpty" | "is_empty" => Value::Bool(text.trim().is_empty()),
		"reverse" => Value::Str(text.chars().rev().collect()),
		"split" => Value::StrList(split_text(text, args)),
		"length" | "len" => Value::Num(text.chars().count() as f64),
		_ => return None,
	};

	Some(value)
}

/// Global replacement of `args[0]` with `args[1]`. The pattern is used as an
/// unescaped regular expression; when it doesn't compile it is replaced as a
/// literal substring. The replacement is always literal, so `$1` or `$name`
/// are inserted as written.
fn replace_pattern(text: &str, args: &[String]) -> String {
	let Some(pattern) = args.first() else {
		return text.to_string();
	};
	let replacement = string_arg(args, 1);

	match Regex::new(pattern) {
		Ok(regex) => regex.replace_all(text, NoExpand(replacement)).into_owned(),
		Err(_) => text.replace(pattern.as_str(), replacement),
	}
}

fn title_case(text: &str) -> String {
	let mut output = String::with_capacity(text.len());
	let mut at_word_start = true;

	for ch in text.chars() {
		if ch.is_whitespace() {
			at_word_start = true;
			output.push(ch);
		} else if at_word_start {
			at_word_start = false;
			output.extend(ch.to_uppercase());
		} else {
			output.extend(ch.to_lowercase());
		}
	}

	output
}

fn split_text(text: &str, args: &[String]) -> Vec<String> {
	let mut items: Vec<String> = match args.first() {
		None => vec![text.to_string()],
		Some(separator) if separator.is_empty() => text.chars().map(String::from).collect(),
		Some(separator) => text.split(separator.as_str()).map(String::from).collect(),
	};

	if let Some(limit) = number_arg(args, 1) {
		if limit >= 0.0 {
			items.truncate(limit.floor() as usize);
		}
	}

	items
}

fn date_method(instant: Option<NaiveDateTime>, name: &str, args: &[String]) -> Option<Value> {
	let value = match name {
		"format" => {
			let pattern = args.first().map_or("YYYY-MM-DD", String::as_str);
			Value::Str(instant.map_or_else(
				|| dates::INVALID_DATE.to_string(),
				|instant| dates::format_date(instant, pattern),
			))
		}
		"date" => Value::Date(instant.map(dates::start_of_day)),
		"time" => {
			Value::Str(instant.map_or_else(
				|| dates::INVALID_DATE.to_string(),
				|instant| dates::format_date(instant, "HH:mm:ss"),
			))
		}
		"relative" => {
			Value::Str(instant.map_or_else(
				|| dates::INVALID_DATE.to_string(),
				|instant| dates::relative_to(instant, dates::now()),
			))
		}
		"isEmpty" | "is_empty" => Value::Bool(instant.is_none()),
		"year" => Value::Num(instant.map_or(f64::NAN, |instant| f64::from(instant.year()))),
		"month" => Value::Num(instant.map_or(f64::NAN, |instant| f64::from(instant.month()))),
		"day" => Value::Num(instant.map_or(f64::NAN, |instant| f64::from(instant.day()))),
		"weekday" => {
			Value::Num(instant.map_or(f64::NAN, |instant| {
				f64::from(instant.weekday().num_days_from_sunday())
			}))
		}
		"addDays" | "add_days" => {
			let days = number_arg(args, 0).unwrap_or(0.0);
			Value::Date(instant.and_then(|instant| dates::add_days(instant, days)))
		}
		_ => return None,
	};

	Some(value)
}

fn number_method(number: f64, name: &str, args: &[String]) -> Option<Value> {
	let value = match name {
		"abs" => Value::Num(number.abs()),
		"ceil" => Value::Num(number.ceil()),
		"floor" => Value::Num(number.floor()),
		"round" => {
			let digits = number_arg(args, 0)
				.filter(|digits| digits.is_finite())
				.unwrap_or(0.0)
				.trunc()
				.clamp(0.0, 15.0);
			let factor = 10f64.powi(digits as i32);
			Value::Num((number * factor + 0.5).floor() / factor)
		}
		"toFixed" | "to_fixed" => {
			let precision = number_arg(args, 0)
				.filter(|precision| precision.is_finite())
				.unwrap_or(0.0)
				.trunc()
				.clamp(0.0, 100.0) as usize;
			if number.is_finite() {
				Value::Str(format!("{number:.precision$}"))
			} else {
				Value::Str(format_number(number))
			}
		}
		"isEmpty" | "is_empty" => Value::Bool(number.is_nan()),
		_ => return None,
	};

	Some(value)
}

fn list_method(items: &[String], name: &str, args: &[String]) -> Option<Value> {
	let value = match name {
		"join" => Value::Str(items.join(args.first().map_or(", ", String::as_str))),
		"first" => Value::Str(items.first().cloned().unwrap_or_default()),
		"last" => Value::Str(items.last().cloned().unwrap_or_default()),
		"at" => {
			let raw = number_arg(args, 0).unwrap_or(0.0);
			let index = if raw.is_nan() { 0.0 } else { raw.trunc() };
			let index = if index < 0.0 {
				items.len() as f64 + index
			} else {
				index
			};
			let item = if index >= 0.0 {
				items.get(index as usize).cloned()
			} else {
				None
			};
			Value::Str(item.unwrap_or_default())
		}
		"length" | "len" => Value::Num(items.len() as f64),
		"isEmpty" | "is_empty" => Value::Bool(items.is_empty()),
		_ => return None,
	};

	Some(value)
}
