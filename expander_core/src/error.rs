use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ExpanderError {
	#[error(transparent)]
	#[diagnostic(code(expander::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(expander::config_parse),
		help("check that expander.toml is valid TOML with [[replacements]] entries")
	)]
	ConfigParse(String),

	#[error("invalid replacement key: `{0}`")]
	#[diagnostic(
		code(expander::invalid_key),
		help(
			"keys are lowercase kebab-case (`my-key-2`) or start with `prop.` to target a \
			 frontmatter property"
		)
	)]
	InvalidKey(String),

	#[error("duplicate replacement key: `{0}`")]
	#[diagnostic(
		code(expander::duplicate_key),
		help("each replacement key must be defined once in expander.toml")
	)]
	DuplicateKey(String),

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(expander::file_too_large),
		help("increase `max_file_size` in expander.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("symlink cycle detected at: `{path}`")]
	#[diagnostic(
		code(expander::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: String },
}

/// Failures inside a single expression evaluation. These never escape
/// [`evaluate`](crate::evaluate), which falls back to the raw expression
/// text instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EvalError {
	#[error("unknown function: `{0}`")]
	UnknownFunction(String),

	#[error("expression must start with a function call or a `file.` field, found `{0}`")]
	MissingInitialValue(String),
}

pub type ExpanderResult<T> = Result<T, ExpanderError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
