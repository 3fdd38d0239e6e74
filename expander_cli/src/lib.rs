use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use expander_core::ProcessScope;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Keep generated regions of markdown documents up to date.",
	long_about = "expander refreshes the text between expansion markers in markdown documents by \
	              evaluating the expression configured for each marker key.\n\nA marker looks \
	              like `<!-- expand: KEY -->value<!---->`. Keys and their expressions live in \
	              `expander.toml`.\n\nQuick start:\n  expander init    Create a sample \
	              expander.toml\n  expander update  Refresh every marker\n  expander check   \
	              Verify everything is up to date\n  expander eval    Try out an expression"
)]
pub struct ExpanderCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a sample `expander.toml` in the project root.
	///
	/// If a config file already exists, this command is a no-op and exits
	/// successfully.
	Init,
	/// Evaluate a single expression and print the result.
	///
	/// Pass `--file` to make `file.*` fields available to the expression.
	Eval {
		/// The expression to evaluate, e.g. `today().format('YYYY-MM-DD')`.
		expression: String,

		/// A file whose metadata backs `file.name`, `file.mtime` and friends.
		#[arg(long)]
		file: Option<PathBuf>,
	},
	/// Check that every marker in the project is up to date.
	///
	/// Exits with a non-zero status code if any document would change on
	/// update. Ideal for CI pipelines.
	Check {
		/// Also check `expand-manual` markers.
		#[arg(long, default_value_t = false)]
		all: bool,

		/// Show a unified diff for each stale document.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Refresh every marker in the project.
	///
	/// `expand-manual` markers are only refreshed with `--all`. Use
	/// `--dry-run` to preview which files would change.
	Update {
		/// Also refresh `expand-manual` markers.
		#[arg(long, default_value_t = false)]
		all: bool,

		/// Preview changes without writing files.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// List the markers found in each document.
	List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption. Each stale entry includes
	/// the file path, replacement count and expected content.
	Json,
}

/// The processing scope selected by an `--all` flag.
pub fn scope_for(all: bool) -> ProcessScope {
	if all {
		ProcessScope::All
	} else {
		ProcessScope::AutoOnly
	}
}
