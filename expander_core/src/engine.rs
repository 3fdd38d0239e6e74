use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::PathBuf;

use serde::Serialize;

use crate::CLOSE_MARKER;
use crate::EvaluationContext;
use crate::ExpanderResult;
use crate::UpdateMode;
use crate::evaluate;
use crate::frontmatter::read_frontmatter;
use crate::frontmatter::write_property;
use crate::project::ProjectContext;
use crate::scan_complete;
use crate::scan_incomplete;
use crate::scanner::property_name;

/// Which update modes a pass processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessScope {
	/// Incidental passes, e.g. after a file changed. `manual` markers are
	/// skipped.
	#[default]
	AutoOnly,
	/// Explicitly requested passes. Every mode is processed.
	All,
}

impl ProcessScope {
	pub fn includes(self, mode: UpdateMode) -> bool {
		match self {
			Self::All => true,
			Self::AutoOnly => mode != UpdateMode::Manual,
		}
	}
}

/// Supplies the value for a marker key.
pub trait KeyResolver {
	/// The computed value for `key`, or `None` when the key is unknown.
	fn resolve(&self, key: &str, context: Option<&EvaluationContext>) -> Option<String>;
}

impl<F> KeyResolver for F
where
	F: Fn(&str, Option<&EvaluationContext>) -> Option<String>,
{
	fn resolve(&self, key: &str, context: Option<&EvaluationContext>) -> Option<String> {
		self(key, context)
	}
}

/// Maps keys to expressions, which are evaluated on every lookup.
impl<S: BuildHasher> KeyResolver for HashMap<String, String, S> {
	fn resolve(&self, key: &str, context: Option<&EvaluationContext>) -> Option<String> {
		self.get(key)
			.map(|expression| evaluate(expression, context))
	}
}

/// A frontmatter property to set after the content pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyUpdate {
	pub name: String,
	pub value: String,
}

/// The result of one [`replace`] pass over a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
	/// The rewritten text, or `None` when no content changed.
	pub new_text: Option<String>,
	/// Keys the resolver didn't know, deduplicated in discovery order.
	pub unknown_keys: Vec<String>,
	/// Markers whose content was written, completed or ejected.
	pub replacements_count: usize,
	/// Property updates in document order, pre-pass first.
	pub property_updates: Vec<PropertyUpdate>,
}

impl ReplaceOutcome {
	/// Merge the unknown keys of one phase, which were collected from the end
	/// of the document backwards.
	fn merge_unknown(&mut self, mut phase: Vec<String>) {
		phase.reverse();
		for key in phase {
			if !self.unknown_keys.contains(&key) {
				self.unknown_keys.push(key);
			}
		}
	}
}

/// Replace `text[start..end]` with `replacement`.
fn splice(text: &mut String, start: usize, end: usize, replacement: &str) {
	text.replace_range(start..end, replacement);
}

/// Run one replacement pass over `text`.
///
/// Opening markers without a closing marker are completed first, then every
/// complete pair is refreshed according to its update mode. Edits within each
/// phase are applied from the end of the document backwards so earlier
/// offsets stay valid. Property keys never change inline text; their values
/// are returned in [`ReplaceOutcome::property_updates`] for
/// [`apply_property_updates`].
pub fn replace<R: KeyResolver + ?Sized>(
	text: &str,
	scope: ProcessScope,
	resolver: &R,
	context: Option<&EvaluationContext>,
) -> ReplaceOutcome {
	let mut outcome = ReplaceOutcome::default();
	let mut result = text.to_string();
	let header = read_frontmatter(text);
	let header_has = |name: &str| header.as_ref().is_some_and(|header| header.has_value(name));

	// Incomplete openings.
	let mut pre_pass_updates = Vec::new();
	let mut pre_pass_unknown = Vec::new();
	let mut incomplete = scan_incomplete(&result);
	incomplete.sort_by(|a, b| b.start_offset.cmp(&a.start_offset));

	for marker in incomplete {
		if !scope.includes(marker.update_mode) {
			tracing::trace!(key = %marker.key, mode = %marker.update_mode, "skipping incomplete marker outside scope");
			continue;
		}

		let property = property_name(&marker.key);
		if let Some(name) = property {
			if marker.update_mode.is_once() && header_has(name) {
				tracing::trace!(key = %marker.key, "property already set, skipping once marker");
				continue;
			}
		}

		let Some(value) = resolver.resolve(&marker.key, context) else {
			tracing::trace!(key = %marker.key, "unknown key in incomplete marker");
			pre_pass_unknown.push(marker.key.clone());
			if property.is_none() {
				splice(&mut result, marker.end_offset, marker.end_offset, CLOSE_MARKER);
			}
			continue;
		};

		if let Some(name) = property {
			pre_pass_updates.push(PropertyUpdate {
				name: name.to_string(),
				value,
			});
			if marker.update_mode == UpdateMode::OnceAndEject {
				splice(&mut result, marker.start_offset, marker.end_offset, "");
				outcome.replacements_count += 1;
			}
			continue;
		}

		if marker.update_mode == UpdateMode::OnceAndEject {
			tracing::trace!(key = %marker.key, "ejecting incomplete marker");
			splice(&mut result, marker.start_offset, marker.end_offset, &value);
		} else if result[marker.end_offset..].starts_with(value.as_str()) {
			let close_at = marker.end_offset + value.len();
			splice(&mut result, close_at, close_at, CLOSE_MARKER);
		} else {
			let inserted = format!("{value}{CLOSE_MARKER}");
			splice(&mut result, marker.end_offset, marker.end_offset, &inserted);
		}

		outcome.replacements_count += 1;
	}

	pre_pass_updates.reverse();
	outcome.property_updates.extend(pre_pass_updates);
	outcome.merge_unknown(pre_pass_unknown);

	// Complete pairs.
	let mut complete_updates = Vec::new();
	let mut complete_unknown = Vec::new();
	let mut matches = scan_complete(&result);
	matches.sort_by(|a, b| b.start_offset.cmp(&a.start_offset));

	for found in matches {
		if !scope.includes(found.update_mode) {
			tracing::trace!(key = %found.key, mode = %found.update_mode, "skipping marker outside scope");
			continue;
		}

		let property = property_name(&found.key);
		if found.update_mode.is_once() {
			let filled = match property {
				Some(name) => header_has(name),
				None => !found.current_inner_text.trim().is_empty(),
			};
			if filled {
				tracing::trace!(key = %found.key, "once marker already filled");
				continue;
			}
		}

		let Some(value) = resolver.resolve(&found.key, context) else {
			tracing::trace!(key = %found.key, "unknown key");
			complete_unknown.push(found.key.clone());
			continue;
		};

		if let Some(name) = property {
			complete_updates.push(PropertyUpdate {
				name: name.to_string(),
				value,
			});
			if found.update_mode == UpdateMode::OnceAndEject {
				splice(&mut result, found.start_offset, found.end_offset, "");
				outcome.replacements_count += 1;
			}
			continue;
		}

		if found.update_mode == UpdateMode::OnceAndEject {
			tracing::trace!(key = %found.key, "ejecting marker");
			splice(&mut result, found.start_offset, found.end_offset, &value);
			outcome.replacements_count += 1;
			continue;
		}

		if found.current_inner_text == value {
			continue;
		}

		let inner_start = found.start_offset + found.open_marker_text.len();
		let inner_end = found.end_offset - found.close_marker_text.len();
		splice(&mut result, inner_start, inner_end, &value);
		outcome.replacements_count += 1;
	}

	complete_updates.reverse();
	outcome.property_updates.extend(complete_updates);
	outcome.merge_unknown(complete_unknown);

	if result != text {
		outcome.new_text = Some(result);
	}

	outcome
}

/// Apply property updates in order through the frontmatter writer.
pub fn apply_property_updates(text: &str, updates: &[PropertyUpdate]) -> String {
	updates
		.iter()
		.fold(text.to_string(), |current, update| {
			write_property(&current, &update.name, &update.value)
		})
}

/// The combined result of a content pass and its property updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentUpdate {
	/// The document after both steps.
	pub content: String,
	/// Whether `content` differs from the input.
	pub changed: bool,
	pub unknown_keys: Vec<String>,
	pub replacements_count: usize,
	pub property_updates: Vec<PropertyUpdate>,
}

/// Run [`replace`] and then [`apply_property_updates`] over `text`.
pub fn process_document<R: KeyResolver + ?Sized>(
	text: &str,
	scope: ProcessScope,
	resolver: &R,
	context: Option<&EvaluationContext>,
) -> DocumentUpdate {
	let outcome = replace(text, scope, resolver, context);
	let replaced = outcome.new_text.as_deref().unwrap_or(text);
	let content = apply_property_updates(replaced, &outcome.property_updates);
	let changed = content != text;

	tracing::debug!(
		path = context.map_or("", |context| context.path.as_str()),
		replacements = outcome.replacements_count,
		properties = outcome.property_updates.len(),
		unknown = outcome.unknown_keys.len(),
		changed,
		"processed document"
	);

	DocumentUpdate {
		content,
		changed,
		unknown_keys: outcome.unknown_keys,
		replacements_count: outcome.replacements_count,
		property_updates: outcome.property_updates,
	}
}

/// Unknown keys found in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownKeys {
	pub file: PathBuf,
	pub keys: Vec<String>,
}

/// A document whose markers are out of date.
#[derive(Debug, Clone, Serialize)]
pub struct StaleEntry {
	pub file: PathBuf,
	/// The document as it is on disk.
	pub current_content: String,
	/// The document after a pass.
	pub expected_content: String,
	pub replacements_count: usize,
	pub property_updates: Vec<PropertyUpdate>,
}

/// Result of checking a project for stale documents.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
	pub stale: Vec<StaleEntry>,
	pub unknown_keys: Vec<UnknownKeys>,
}

impl CheckResult {
	/// Returns true if every document is up to date.
	pub fn is_ok(&self) -> bool {
		self.stale.is_empty()
	}

	/// Returns true if any marker referenced a key with no replacement.
	pub fn has_unknown_keys(&self) -> bool {
		!self.unknown_keys.is_empty()
	}
}

/// Result of updating a project.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateResult {
	/// Files that were modified and their new content.
	pub updated_files: BTreeMap<PathBuf, String>,
	/// Number of markers whose content was written.
	pub updated_count: usize,
	/// Number of frontmatter properties written.
	pub property_count: usize,
	pub unknown_keys: Vec<UnknownKeys>,
}

/// Check whether every document in the project is up to date.
pub fn check_project(ctx: &ProjectContext, scope: ProcessScope) -> ExpanderResult<CheckResult> {
	let mut stale = Vec::new();
	let mut unknown_keys = Vec::new();

	for document in &ctx.documents {
		let update = process_document(
			&document.content,
			scope,
			&ctx.replacements,
			Some(&document.context),
		);

		if !update.unknown_keys.is_empty() {
			unknown_keys.push(UnknownKeys {
				file: document.path.clone(),
				keys: update.unknown_keys,
			});
		}

		if update.changed {
			stale.push(StaleEntry {
				file: document.path.clone(),
				current_content: document.content.clone(),
				expected_content: update.content,
				replacements_count: update.replacements_count,
				property_updates: update.property_updates,
			});
		}
	}

	Ok(CheckResult {
		stale,
		unknown_keys,
	})
}

/// Compute the updated contents of every document in the project.
pub fn compute_updates(ctx: &ProjectContext, scope: ProcessScope) -> ExpanderResult<UpdateResult> {
	let mut result = UpdateResult::default();

	for document in &ctx.documents {
		let update = process_document(
			&document.content,
			scope,
			&ctx.replacements,
			Some(&document.context),
		);

		if !update.unknown_keys.is_empty() {
			result.unknown_keys.push(UnknownKeys {
				file: document.path.clone(),
				keys: update.unknown_keys,
			});
		}

		if update.changed {
			result.updated_count += update.replacements_count;
			result.property_count += update.property_updates.len();
			result
				.updated_files
				.insert(document.path.clone(), update.content);
		}
	}

	Ok(result)
}

/// Write the updated contents back to disk.
pub fn write_updates(updates: &UpdateResult) -> ExpanderResult<()> {
	for (path, content) in &updates.updated_files {
		std::fs::write(path, content)?;
	}
	Ok(())
}
