use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::EvaluationContext;
use crate::ExpanderError;
use crate::ExpanderResult;
use crate::ReplacementSet;
use crate::config::CONFIG_FILE_CANDIDATES;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::config::ExpanderConfig;

/// Options controlling which files a project scan visits.
///
/// Use [`ScanOptions::default()`] for sensible defaults or
/// [`ScanOptions::from_config`] to construct from an [`ExpanderConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
	/// Gitignore-style patterns to exclude from scanning.
	pub exclude_patterns: Vec<String>,
	/// Extra files to scan besides markdown documents.
	pub include_set: GlobSet,
	/// Maximum file size to scan in bytes.
	pub max_file_size: u64,
	/// Whether to disable `.gitignore` integration.
	pub disable_gitignore: bool,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			exclude_patterns: Vec::new(),
			include_set: GlobSet::empty(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
		}
	}
}

impl ScanOptions {
	/// Construct [`ScanOptions`] from an [`ExpanderConfig`].
	pub fn from_config(config: Option<&ExpanderConfig>) -> Self {
		let exclude_patterns = config
			.map(|c| c.exclude.patterns.clone())
			.unwrap_or_default();
		let include_patterns = config.map(|c| &c.include.patterns[..]).unwrap_or_default();
		let max_file_size = config.map_or(DEFAULT_MAX_FILE_SIZE, |c| c.max_file_size);
		let disable_gitignore = config.is_some_and(|c| c.disable_gitignore);

		Self {
			exclude_patterns,
			include_set: build_glob_set(include_patterns),
			max_file_size,
			disable_gitignore,
		}
	}
}

/// A document read from disk together with its metadata snapshot.
#[derive(Debug, Clone)]
pub struct Document {
	pub path: PathBuf,
	pub content: String,
	pub context: EvaluationContext,
}

/// A scanned project together with its configured replacements, ready for
/// checking or updating.
#[derive(Debug, Clone)]
pub struct ProjectContext {
	pub root: PathBuf,
	pub documents: Vec<Document>,
	pub replacements: ReplacementSet,
}

/// Scan a project with its discovered config.
pub fn scan_project_with_config(root: &Path) -> ExpanderResult<ProjectContext> {
	let config = ExpanderConfig::load(root)?;
	let options = ScanOptions::from_config(config.as_ref());
	let replacements = match &config {
		Some(config) => config.replacement_set()?,
		None => ReplacementSet::default(),
	};
	let documents = scan_documents(root, &options)?;

	Ok(ProjectContext {
		root: root.to_path_buf(),
		documents,
		replacements,
	})
}

/// Read every document under `root` that the options select.
pub fn scan_documents(root: &Path, options: &ScanOptions) -> ExpanderResult<Vec<Document>> {
	let files = collect_project_files(root, options)?;
	let mut documents = Vec::with_capacity(files.len());

	for path in files {
		let metadata = std::fs::metadata(&path)?;
		if metadata.len() > options.max_file_size {
			return Err(ExpanderError::FileTooLarge {
				path: path.display().to_string(),
				size: metadata.len(),
				limit: options.max_file_size,
			});
		}

		let content = std::fs::read_to_string(&path)?;
		let context = EvaluationContext::from_path(root, &path)?;
		documents.push(Document {
			path,
			content,
			context,
		});
	}

	tracing::debug!(root = %root.display(), documents = documents.len(), "scanned project");
	Ok(documents)
}

/// Collect the paths of markdown documents and included files, sorted.
pub fn collect_project_files(root: &Path, options: &ScanOptions) -> ExpanderResult<Vec<PathBuf>> {
	let gitignore = if options.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let walker = Walker {
		root,
		gitignore,
		custom_exclude: build_exclude_matcher(root, &options.exclude_patterns)?,
		include_set: &options.include_set,
	};
	let mut files = Vec::new();
	let mut visited_dirs = HashSet::new();

	walker.walk_dir(root, &mut files, &mut visited_dirs)?;
	files.sort();
	Ok(files)
}

/// Build a `GlobSet` from a list of glob pattern strings. Invalid patterns
/// are skipped.
fn build_glob_set(patterns: &[String]) -> GlobSet {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		match Glob::new(pattern) {
			Ok(glob) => {
				builder.add(glob);
			}
			Err(error) => tracing::warn!(%pattern, %error, "skipping invalid include pattern"),
		}
	}
	builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Build a `Gitignore` matcher from `[exclude]` patterns.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> ExpanderResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			ExpanderError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| ExpanderError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		if let Some(error) = builder.add(&gitignore_path) {
			tracing::warn!(path = %gitignore_path.display(), %error, "failed to read .gitignore");
		}
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

fn has_project_config(dir: &Path) -> bool {
	CONFIG_FILE_CANDIDATES
		.iter()
		.any(|candidate| dir.join(candidate).is_file())
}

/// The matchers shared by every directory of one project walk.
struct Walker<'a> {
	root: &'a Path,
	gitignore: Gitignore,
	custom_exclude: Gitignore,
	include_set: &'a GlobSet,
}

impl Walker<'_> {
	fn walk_dir(
		&self,
		dir: &Path,
		files: &mut Vec<PathBuf>,
		visited_dirs: &mut HashSet<PathBuf>,
	) -> ExpanderResult<()> {
		if !dir.is_dir() {
			return Ok(());
		}

		// Detect symlink cycles by tracking canonical paths.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !visited_dirs.insert(canonical) {
			return Err(ExpanderError::SymlinkCycle {
				path: dir.display().to_string(),
			});
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();

			if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
				if is_ignored_directory_name(name) {
					continue;
				}
			}

			let is_dir = path.is_dir();

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.custom_exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				// Nested projects with their own config are a separate scope.
				if has_project_config(&path) {
					continue;
				}
				self.walk_dir(&path, files, visited_dirs)?;
			} else if is_markdown_file(&path) || self.is_included(&path) {
				files.push(path);
			}
		}

		Ok(())
	}

	fn is_included(&self, path: &Path) -> bool {
		!self.include_set.is_empty()
			&& path
				.strip_prefix(self.root)
				.is_ok_and(|rel_path| self.include_set.is_match(rel_path))
	}
}

/// Check if a file is a markdown document.
pub fn is_markdown_file(path: &Path) -> bool {
	let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
		return false;
	};

	matches!(ext, "md" | "mdx" | "markdown")
}
