use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use serde_json::Number;

const DELIMITER: &str = "---";

/// First characters that YAML treats as indicators in a plain scalar.
const YAML_INDICATORS: &[char] = &[
	'-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Scalars YAML would read as something other than a string.
const RESERVED_SCALARS: [&str; 11] = [
	"true", "false", "yes", "no", "on", "off", "null", "~", "y", "n", ".nan",
];

/// A parsed frontmatter header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontmatter {
	/// Top-level `key: value` entries with scalar coercion applied.
	pub data: BTreeMap<String, serde_json::Value>,
	/// Byte range of the header from the opening delimiter through the end of
	/// the closing delimiter line.
	pub span: Range<usize>,
	/// Byte offset where the document body starts.
	pub body_start: usize,
}

impl Frontmatter {
	/// Whether `name` is present with a non-null, non-empty value.
	pub fn has_value(&self, name: &str) -> bool {
		match self.data.get(name) {
			None | Some(serde_json::Value::Null) => false,
			Some(serde_json::Value::String(text)) => !text.is_empty(),
			Some(_) => true,
		}
	}
}

/// A line of text with its byte range, including the line ending.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
	start: usize,
	end: usize,
	/// Content without the trailing `\n` or `\r\n`.
	content: &'a str,
}

fn lines_with_offsets(text: &str) -> impl Iterator<Item = Line<'_>> {
	text.split_inclusive('\n').scan(0usize, |offset, raw| {
		let start = *offset;
		*offset += raw.len();
		let content = raw.strip_suffix('\n').unwrap_or(raw);
		let content = content.strip_suffix('\r').unwrap_or(content);

		Some(Line {
			start,
			end: *offset,
			content,
		})
	})
}

/// Locate the header lines: the opening delimiter must be the very first line
/// and a later line must be exactly `---`. Returns every line of the header
/// including both delimiters.
fn header_lines(text: &str) -> Option<Vec<Line<'_>>> {
	let mut lines = lines_with_offsets(text);
	let first = lines.next()?;
	if first.content != DELIMITER {
		return None;
	}

	let mut header = vec![first];
	for line in lines {
		header.push(line);
		if line.content == DELIMITER {
			return Some(header);
		}
	}

	None
}

/// Read the frontmatter header at the start of `text`.
///
/// Returns `None` when there is no header or it is malformed, for example
/// when the closing delimiter is missing.
pub fn read_frontmatter(text: &str) -> Option<Frontmatter> {
	let header = header_lines(text)?;
	let closing = header.last()?;
	let mut data = BTreeMap::new();

	for line in &header[1..header.len() - 1] {
		if let Some((key, value)) = parse_entry(line.content) {
			data.insert(key.to_string(), coerce_scalar(value));
		}
	}

	Some(Frontmatter {
		data,
		span: 0..closing.start + closing.content.len(),
		body_start: closing.end,
	})
}

/// Split a top-level `key: value` line. Blank lines, comments and indented
/// continuation lines yield `None`.
fn parse_entry(line: &str) -> Option<(&str, &str)> {
	if line.trim().is_empty() || line.starts_with('#') || line.starts_with([' ', '\t']) {
		return None;
	}

	let (key, value) = line.split_once(':')?;
	let key = key.trim();
	if key.is_empty() {
		return None;
	}

	Some((key, value.trim()))
}

fn coerce_scalar(raw: &str) -> serde_json::Value {
	match raw {
		"" | "null" | "~" => return serde_json::Value::Null,
		"true" => return serde_json::Value::Bool(true),
		"false" => return serde_json::Value::Bool(false),
		_ => {}
	}

	if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
		return serde_json::Value::String(unescape_double_quoted(&raw[1..raw.len() - 1]));
	}

	if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
		return serde_json::Value::String(raw[1..raw.len() - 1].replace("''", "'"));
	}

	if let Ok(integer) = raw.parse::<i64>() {
		return serde_json::Value::Number(integer.into());
	}

	if let Some(number) = raw
		.parse::<f64>()
		.ok()
		.filter(|number| number.is_finite())
		.and_then(Number::from_f64)
	{
		return serde_json::Value::Number(number);
	}

	serde_json::Value::String(raw.to_string())
}

fn unescape_double_quoted(inner: &str) -> String {
	let mut value = String::with_capacity(inner.len());
	let mut chars = inner.chars();

	while let Some(ch) = chars.next() {
		if ch != '\\' {
			value.push(ch);
			continue;
		}

		match chars.next() {
			Some('n') => value.push('\n'),
			Some('t') => value.push('\t'),
			Some('r') => value.push('\r'),
			Some(other) => value.push(other),
			None => value.push('\\'),
		}
	}

	value
}

/// Set the top-level property `name` to `value` in the header of `text`.
///
/// Without a header a new one is prepended. An existing `name:` line is
/// replaced in place together with its indented continuation lines,
/// otherwise the property is appended just before the closing delimiter.
/// The body is never touched.
pub fn write_property(text: &str, name: &str, value: &str) -> String {
	let entry = format!("{name}: {}", format_scalar(value));

	let Some(header) = header_lines(text) else {
		return format!("{DELIMITER}\n{entry}\n{DELIMITER}\n{text}");
	};

	let inner = &header[1..header.len() - 1];
	let closing = header[header.len() - 1];
	let newline = if header[0].end - header[0].start > header[0].content.len() + 1 {
		"\r\n"
	} else {
		"\n"
	};

	let existing = inner
		.iter()
		.position(|line| parse_entry(line.content).is_some_and(|(key, _)| key == name));

	let (start, end) = match existing {
		Some(index) => {
			let continuation = inner[index + 1..]
				.iter()
				.take_while(|line| line.content.starts_with([' ', '\t']))
				.count();
			(inner[index].start, inner[index + continuation].end)
		}
		None => (closing.start, closing.start),
	};

	let mut output = String::with_capacity(text.len() + entry.len() + 2);
	output.push_str(&text[..start]);
	output.push_str(&entry);
	output.push_str(newline);
	output.push_str(&text[end..]);
	output
}

/// Render `value` as a YAML scalar, double-quoting it when a plain scalar
/// would be misread.
pub fn format_scalar(value: &str) -> String {
	if needs_quoting(value) {
		let escaped = value
			.replace('\\', "\\\\")
			.replace('"', "\\\"")
			.replace('\r', "\\r")
			.replace('\n', "\\n");
		format!("\"{escaped}\"")
	} else {
		value.to_string()
	}
}

fn needs_quoting(value: &str) -> bool {
	let Some(first) = value.chars().next() else {
		return true;
	};

	value.trim() != value
		|| value.contains([':', '#', '"', '\'', '\n', '\r'])
		|| YAML_INDICATORS.contains(&first)
		|| RESERVED_SCALARS.contains(&value.to_lowercase().as_str())
		|| value.parse::<f64>().is_ok()
}
