use std::fmt::Display;
use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

/// The closing marker shared by every update mode.
pub const CLOSE_MARKER: &str = "<!---->";

/// Keys with this prefix target a frontmatter property instead of inline
/// text.
pub const PROPERTY_PREFIX: &str = "prop.";

const OPEN_MARKER_PATTERN: &str = r"<!--\s*expand(?P<mode>-manual|-once-eject|-once)?:\s*(?P<key>prop\.[^\r\n>]*?[^\s>]|[a-z0-9]+(?:-[a-z0-9]+)*)\s*-->";

static OPEN_MARKER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(OPEN_MARKER_PATTERN).expect("valid opening marker regex"));

static KEBAB_KEY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid key regex"));

/// How and when a marker is refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
	/// Refreshed on every pass.
	#[default]
	Auto,
	/// Refreshed only when every mode is requested.
	Manual,
	/// Filled while its content is blank, then left alone.
	Once,
	/// Filled once, after which both markers are removed and only the value
	/// stays in the document.
	OnceAndEject,
}

impl UpdateMode {
	/// The word between `<!--` and the `:` of an opening marker.
	pub fn marker_prefix(self) -> &'static str {
		match self {
			Self::Auto => "expand",
			Self::Manual => "expand-manual",
			Self::Once => "expand-once",
			Self::OnceAndEject => "expand-once-eject",
		}
	}

	/// The canonical opening marker for `key` in this mode.
	pub fn open_marker(self, key: &str) -> String {
		format!("<!-- {}: {key} -->", self.marker_prefix())
	}

	/// Modes that stop refreshing once their content is filled.
	pub fn is_once(self) -> bool {
		matches!(self, Self::Once | Self::OnceAndEject)
	}

	fn from_capture(suffix: Option<&str>) -> Self {
		match suffix {
			Some("-manual") => Self::Manual,
			Some("-once") => Self::Once,
			Some("-once-eject") => Self::OnceAndEject,
			_ => Self::Auto,
		}
	}
}

impl Display for UpdateMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Auto => write!(f, "auto"),
			Self::Manual => write!(f, "manual"),
			Self::Once => write!(f, "once"),
			Self::OnceAndEject => write!(f, "once_and_eject"),
		}
	}
}

/// A complete `open … close` marker pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpanderMatch {
	pub key: String,
	/// Text between the opening and closing markers.
	pub current_inner_text: String,
	/// Byte offset of the start of the opening marker.
	pub start_offset: usize,
	/// Byte offset just past the closing marker.
	pub end_offset: usize,
	pub full_match_text: String,
	pub update_mode: UpdateMode,
	pub open_marker_text: String,
	pub close_marker_text: String,
}

impl ExpanderMatch {
	pub fn is_property(&self) -> bool {
		property_name(&self.key).is_some()
	}
}

/// An opening marker that doesn't start a complete pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteExpansion {
	pub key: String,
	pub start_offset: usize,
	/// Byte offset just past the opening marker.
	pub end_offset: usize,
	pub open_marker_text: String,
	pub update_mode: UpdateMode,
}

impl IncompleteExpansion {
	pub fn is_property(&self) -> bool {
		property_name(&self.key).is_some()
	}
}

/// Find every complete marker pair in `text`.
///
/// Each opening marker pairs with the nearest following closing marker,
/// unless another opening marker comes first. A pair never spans another
/// opening marker: in `<!-- expand: a -->x <!-- expand: b -->y<!---->` only
/// `b` is complete and `a` is reported by [`scan_incomplete`]. Inner text may
/// span lines.
pub fn scan_complete(text: &str) -> Vec<ExpanderMatch> {
	scan_markers(text).0
}

/// Find opening markers that don't start a complete pair.
pub fn scan_incomplete(text: &str) -> Vec<IncompleteExpansion> {
	scan_markers(text).1
}

fn scan_markers(text: &str) -> (Vec<ExpanderMatch>, Vec<IncompleteExpansion>) {
	let openings: Vec<Captures<'_>> = OPEN_MARKER.captures_iter(text).collect();
	let mut complete = Vec::new();
	let mut incomplete = Vec::new();

	for (index, caps) in openings.iter().enumerate() {
		let Some(open) = caps.get(0) else {
			continue;
		};
		let key = captured_key(caps);
		let update_mode = UpdateMode::from_capture(caps.name("mode").map(|m| m.as_str()));
		let next_open = openings
			.get(index + 1)
			.and_then(|next| next.get(0))
			.map_or(text.len(), |next| next.start());
		let close = text[open.end()..next_open]
			.find(CLOSE_MARKER)
			.map(|offset| open.end() + offset);

		match close {
			Some(close_start) => {
				let end_offset = close_start + CLOSE_MARKER.len();
				complete.push(ExpanderMatch {
					key,
					current_inner_text: text[open.end()..close_start].to_string(),
					start_offset: open.start(),
					end_offset,
					full_match_text: text[open.start()..end_offset].to_string(),
					update_mode,
					open_marker_text: open.as_str().to_string(),
					close_marker_text: CLOSE_MARKER.to_string(),
				});
			}
			None => {
				incomplete.push(IncompleteExpansion {
					key,
					start_offset: open.start(),
					end_offset: open.end(),
					open_marker_text: open.as_str().to_string(),
					update_mode,
				});
			}
		}
	}

	(complete, incomplete)
}

fn captured_key(caps: &Captures<'_>) -> String {
	caps.name("key")
		.map(|key| key.as_str().trim().to_string())
		.unwrap_or_default()
}

/// Whether `key` is a valid replacement key: lowercase kebab-case made of
/// letters and digits, or `prop.` followed by a non-blank property name.
pub fn is_valid_key(key: &str) -> bool {
	match key.strip_prefix(PROPERTY_PREFIX) {
		Some(property) => !property.trim().is_empty() && !property.contains(['\n', '\r', '>']),
		None => KEBAB_KEY.is_match(key),
	}
}

/// The frontmatter property targeted by a `prop.` key, trimmed with case
/// preserved. Returns `None` for ordinary keys.
pub fn property_name(key: &str) -> Option<&str> {
	key.strip_prefix(PROPERTY_PREFIX)
		.map(str::trim)
		.filter(|name| !name.is_empty())
}
