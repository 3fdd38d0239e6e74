use std::path::Path;
use std::time::SystemTime;

use chrono::DateTime;
use chrono::Local;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::ExpanderResult;
use crate::Value;

/// A snapshot of file metadata available to `file.*` references in an
/// expression.
///
/// The snapshot is taken once and never re-queried during an evaluation, so
/// every `file.*` reference in a single pass sees the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationContext {
	/// File name without its extension, e.g. `2024-06-20 Standup`.
	pub name: String,
	/// Full path of the file, using `/` separators.
	pub path: String,
	/// Parent folder path, or `/` for files at the root.
	pub folder: String,
	/// Extension without the leading dot, e.g. `md`.
	pub extension: String,
	/// Creation instant. Not every filesystem records one.
	pub created: Option<NaiveDateTime>,
	/// Last modification instant.
	pub modified: Option<NaiveDateTime>,
}

impl EvaluationContext {
	/// Build a context from a `/`-separated path without touching the
	/// filesystem. Both instants are left unset.
	pub fn from_relative_path(path: impl AsRef<str>) -> Self {
		let path = path.as_ref().replace('\\', "/");
		let (folder, file_name) = match path.rsplit_once('/') {
			Some((folder, file_name)) if !folder.is_empty() => (folder.to_string(), file_name),
			Some((_, file_name)) => ("/".to_string(), file_name),
			None => ("/".to_string(), path.as_str()),
		};
		let (name, extension) = match file_name.rsplit_once('.') {
			Some((stem, extension)) if !stem.is_empty() => (stem.to_string(), extension.to_string()),
			_ => (file_name.to_string(), String::new()),
		};

		Self {
			name,
			folder,
			extension,
			path,
			created: None,
			modified: None,
		}
	}

	/// Build a context for `file` by reading its metadata. The stored path is
	/// relative to `root` when `file` lives inside it.
	pub fn from_path(root: &Path, file: &Path) -> ExpanderResult<Self> {
		let metadata = std::fs::metadata(file)?;
		let relative = file.strip_prefix(root).unwrap_or(file);
		let context = Self::from_relative_path(relative.to_string_lossy())
			.with_created(metadata.created().ok().map(system_time_to_local))
			.with_modified(metadata.modified().ok().map(system_time_to_local));

		Ok(context)
	}

	#[must_use]
	pub fn with_created(mut self, created: Option<NaiveDateTime>) -> Self {
		self.created = created;
		self
	}

	#[must_use]
	pub fn with_modified(mut self, modified: Option<NaiveDateTime>) -> Self {
		self.modified = modified;
		self
	}

	/// Look up a `file.<field>` reference. Returns `None` for unknown fields.
	pub fn field(&self, field: &str) -> Option<Value> {
		let value = match field {
			"name" | "basename" => Value::Str(self.name.clone()),
			"path" => Value::Str(self.path.clone()),
			"folder" | "parent" => Value::Str(self.folder.clone()),
			"extension" | "ext" => Value::Str(self.extension.clone()),
			"ctime" | "created" => Value::Date(self.created),
			"mtime" | "modified" => Value::Date(self.modified),
			_ => return None,
		};

		Some(value)
	}
}

fn system_time_to_local(time: SystemTime) -> NaiveDateTime {
	DateTime::<Local>::from(time).naive_local()
}
