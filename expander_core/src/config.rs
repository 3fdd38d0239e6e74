use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::EvaluationContext;
use crate::ExpanderError;
use crate::ExpanderResult;
use crate::KeyResolver;
use crate::evaluate;
use crate::is_valid_key;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"expander.toml",
	".expander.toml",
	".config/expander.toml",
];

/// A configured key and the expression that computes its value.
///
/// ```toml
/// [[replacements]]
/// key = "updated"
/// value = "file.mtime.format('YYYY-MM-DD')"
///
/// [[replacements]]
/// key = "prop.modified"
/// value = "now().format('YYYY-MM-DD')"
/// enabled = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
	pub key: String,
	#[serde(rename = "value", alias = "expression")]
	pub value_expression: String,
	/// Disabled replacements behave as if the key were unknown.
	#[serde(default = "default_enabled")]
	pub enabled: bool,
}

impl Replacement {
	pub fn new(key: impl Into<String>, value_expression: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value_expression: value_expression.into(),
			enabled: true,
		}
	}

	#[must_use]
	pub fn disabled(mut self) -> Self {
		self.enabled = false;
		self
	}
}

fn default_enabled() -> bool {
	true
}

/// Validated replacements, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplacementSet {
	entries: Vec<Replacement>,
}

impl ReplacementSet {
	/// Validate every key and reject duplicates.
	pub fn new(entries: Vec<Replacement>) -> ExpanderResult<Self> {
		let mut seen = HashSet::new();

		for entry in &entries {
			if !is_valid_key(&entry.key) {
				return Err(ExpanderError::InvalidKey(entry.key.clone()));
			}
			if !seen.insert(entry.key.as_str()) {
				return Err(ExpanderError::DuplicateKey(entry.key.clone()));
			}
		}

		Ok(Self { entries })
	}

	/// Build a set of enabled replacements from `(key, expression)` pairs.
	pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> ExpanderResult<Self>
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self::new(
			pairs
				.into_iter()
				.map(|(key, value)| Replacement::new(key, value))
				.collect(),
		)
	}

	/// The enabled replacement for `key`.
	pub fn get(&self, key: &str) -> Option<&Replacement> {
		self.entries
			.iter()
			.find(|entry| entry.enabled && entry.key == key)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl KeyResolver for ReplacementSet {
	fn resolve(&self, key: &str, context: Option<&EvaluationContext>) -> Option<String> {
		self.get(key)
			.map(|entry| evaluate(&entry.value_expression, context))
	}
}

/// Configuration loaded from `expander.toml`.
///
/// ```toml
/// max_file_size = 10485760
/// disable_gitignore = false
///
/// [[replacements]]
/// key = "today"
/// value = "today().format('YYYY-MM-DD')"
///
/// [exclude]
/// patterns = ["drafts/"]
///
/// [include]
/// patterns = ["notes/**/*.txt"]
/// ```
#[derive(Debug, Deserialize)]
pub struct ExpanderConfig {
	#[serde(default)]
	pub replacements: Vec<Replacement>,
	/// Exclusion configuration using gitignore-style patterns.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Additional glob patterns to scan besides markdown files.
	#[serde(default)]
	pub include: IncludeConfig,
	/// Maximum file size in bytes to scan. Larger files are an error.
	/// Defaults to 10 MB.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
}

impl Default for ExpanderConfig {
	fn default() -> Self {
		Self {
			replacements: Vec::new(),
			exclude: ExcludeConfig::default(),
			include: IncludeConfig::default(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
		}
	}
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

/// Patterns follow gitignore syntax and are applied on top of any `.gitignore`
/// rules (unless `disable_gitignore` is set).
#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Examples: `"build/"`, `"*.draft.md"`, `"!keep.draft.md"`.
	#[serde(default)]
	pub patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludeConfig {
	/// Glob patterns relative to the project root.
	#[serde(default)]
	pub patterns: Vec<String>,
}

impl ExpanderConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> ExpanderResult<Option<ExpanderConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(
			path = %config_path.display(),
			replacements = config.replacements.len(),
			"loaded config"
		);

		Ok(Some(config))
	}

	/// Parse and validate config text.
	pub fn parse(content: &str) -> ExpanderResult<ExpanderConfig> {
		let config: ExpanderConfig =
			toml::from_str(content).map_err(|e| ExpanderError::ConfigParse(e.to_string()))?;
		// Surface invalid or duplicate keys at load time.
		config.replacement_set()?;

		Ok(config)
	}

	/// The configured replacements as a resolver.
	pub fn replacement_set(&self) -> ExpanderResult<ReplacementSet> {
		ReplacementSet::new(self.replacements.clone())
	}
}
