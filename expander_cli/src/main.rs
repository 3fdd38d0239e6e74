use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use expander_cli::Commands;
use expander_cli::ExpanderCli;
use expander_cli::OutputFormat;
use expander_cli::scope_for;
use expander_core::CheckResult;
use expander_core::EvaluationContext;
use expander_core::ExpanderConfig;
use expander_core::ProcessScope;
use expander_core::UnknownKeys;
use expander_core::check_project;
use expander_core::compute_updates;
use expander_core::evaluate;
use expander_core::project::ProjectContext;
use expander_core::project::scan_project_with_config;
use expander_core::scan_complete;
use expander_core::scan_incomplete;
use expander_core::write_updates;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

const SAMPLE_CONFIG: &str = "# expander configuration\n#\n# Each replacement maps a marker key to \
                             an expression. Reference a key in any\n# markdown file and run \
                             `expander update`:\n#\n#   Updated: <!-- expand: modified \
                             --><!---->\n\n[[replacements]]\nkey = \"today\"\nvalue = \
                             \"today().format('YYYY-MM-DD')\"\n\n[[replacements]]\nkey = \
                             \"modified\"\nvalue = \"file.mtime.format('YYYY-MM-DD \
                             HH:mm')\"\n\n# Keys starting with `prop.` write a frontmatter \
                             property instead.\n# [[replacements]]\n# key = \
                             \"prop.updated\"\n# value = \"now().format('YYYY-MM-DD')\"\n\n# \
                             [exclude]\n# patterns = [\"drafts/\"]\n";

fn main() {
	let args = ExpanderCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_logging(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Eval { expression, file }) => run_eval(&args, expression, file.as_deref()),
		Some(Commands::Check { all, diff, format }) => {
			run_check(&args, scope_for(*all), *diff, *format)
		}
		Some(Commands::Update { all, dry_run }) => run_update(&args, scope_for(*all), *dry_run),
		Some(Commands::List) => run_list(&args),
		None => {
			eprintln!("No subcommand specified. Run `expander --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<expander_core::ExpanderError>() {
			Ok(expander_err) => {
				let report: miette::Report = (*expander_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr so stdout stays clean for `--format json`. `RUST_LOG` takes
/// precedence over `--verbose`.
fn init_logging(verbose: bool, use_color: bool) {
	let default_directive = if verbose {
		"expander_core=debug"
	} else {
		"warn"
	};

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
		)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.init();
}

fn resolve_root(args: &ExpanderCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn run_init(args: &ExpanderCli) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	if let Some(existing) = ExpanderConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join("expander.toml");
	std::fs::write(&config_path, SAMPLE_CONFIG)?;
	println!("Created config file: {}", config_path.display());

	println!();
	println!("Next steps:");
	println!(
		"  1. Edit {} to define your replacements",
		config_path.display()
	);
	println!("  2. Add markers to your markdown files:");
	println!("     <!-- expand: today --><!---->");
	println!("  3. Run `expander update` to fill them in");

	Ok(())
}

fn run_eval(
	args: &ExpanderCli,
	expression: &str,
	file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let context = match file {
		Some(file) => {
			let file = if file.is_absolute() {
				file.to_path_buf()
			} else {
				root.join(file)
			};
			Some(EvaluationContext::from_path(&root, &file)?)
		}
		None => None,
	};

	println!("{}", evaluate(expression, context.as_ref()));
	Ok(())
}

fn scan(args: &ExpanderCli) -> Result<ProjectContext, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let ctx = scan_project_with_config(&root)?;

	if args.verbose {
		println!(
			"Scanned project: {} document(s), {} replacement(s)",
			ctx.documents.len(),
			ctx.replacements.len()
		);
	}

	Ok(ctx)
}

fn warn_unknown_keys(unknown_keys: &[UnknownKeys], root: &Path) {
	for entry in unknown_keys {
		let rel = make_relative(&entry.file, root);
		for key in &entry.keys {
			eprintln!(
				"{} no replacement for key `{key}` in {rel}",
				colored!("warning:", yellow)
			);
		}
	}
}

fn run_check(
	args: &ExpanderCli,
	scope: ProcessScope,
	show_diff: bool,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let ctx = scan(args)?;
	let root = resolve_root(args);
	let result = check_project(&ctx, scope)?;

	if matches!(format, OutputFormat::Text) {
		warn_unknown_keys(&result.unknown_keys, &root);
	}

	match format {
		OutputFormat::Json => print_check_json(&result, &root),
		OutputFormat::Text if result.is_ok() => {
			println!("Check passed: all markers are up to date.");
		}
		OutputFormat::Text => {
			eprintln!("Check failed.");
			eprintln!();
			eprintln!("Stale documents:");
			for entry in &result.stale {
				let rel = make_relative(&entry.file, &root);
				eprintln!(
					"  {rel} ({} marker(s), {} propert(ies))",
					entry.replacements_count,
					entry.property_updates.len()
				);
				if show_diff {
					print_diff(&entry.current_content, &entry.expected_content);
				}
			}
			eprintln!();
			eprintln!("{}", check_summary(&result));
		}
	}

	if !result.is_ok() {
		process::exit(1);
	}

	Ok(())
}

fn print_check_json(result: &CheckResult, root: &Path) {
	let stale: Vec<serde_json::Value> = result
		.stale
		.iter()
		.map(|entry| {
			serde_json::json!({
				"file": make_relative(&entry.file, root),
				"replacements": entry.replacements_count,
				"properties": entry.property_updates,
				"expected": entry.expected_content,
			})
		})
		.collect();
	let unknown: Vec<serde_json::Value> = result
		.unknown_keys
		.iter()
		.map(|entry| {
			serde_json::json!({
				"file": make_relative(&entry.file, root),
				"keys": entry.keys,
			})
		})
		.collect();
	let output = serde_json::json!({
		"ok": result.is_ok(),
		"stale": stale,
		"unknown_keys": unknown,
	});

	println!("{output}");
}

fn check_summary(result: &CheckResult) -> String {
	format!(
		"{} document(s) are out of date. Run `expander update` to fix.",
		result.stale.len()
	)
}

fn run_update(
	args: &ExpanderCli,
	scope: ProcessScope,
	dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let ctx = scan(args)?;
	let root = resolve_root(args);
	let updates = compute_updates(&ctx, scope)?;

	warn_unknown_keys(&updates.unknown_keys, &root);

	if updates.updated_files.is_empty() {
		println!("All markers are already up to date.");
		return Ok(());
	}

	if dry_run {
		println!(
			"Dry run: would update {} marker(s) and {} propert(ies) in {} file(s):",
			updates.updated_count,
			updates.property_count,
			updates.updated_files.len()
		);
		for path in updates.updated_files.keys() {
			println!("  {}", make_relative(path, &root));
		}
	} else {
		write_updates(&updates)?;
		println!(
			"Updated {} marker(s) and {} propert(ies) in {} file(s).",
			updates.updated_count,
			updates.property_count,
			updates.updated_files.len()
		);

		if args.verbose {
			for path in updates.updated_files.keys() {
				println!("  {}", make_relative(path, &root));
			}
		}
	}

	Ok(())
}

fn run_list(args: &ExpanderCli) -> Result<(), Box<dyn std::error::Error>> {
	let ctx = scan(args)?;
	let root = resolve_root(args);
	let mut total = 0usize;

	for document in &ctx.documents {
		let mut markers: Vec<(usize, String, String, &str)> = scan_complete(&document.content)
			.into_iter()
			.map(|found| {
				(
					found.start_offset,
					found.key,
					found.update_mode.to_string(),
					"complete",
				)
			})
			.chain(scan_incomplete(&document.content).into_iter().map(|found| {
				(
					found.start_offset,
					found.key,
					found.update_mode.to_string(),
					"incomplete",
				)
			}))
			.collect();

		if markers.is_empty() {
			continue;
		}

		markers.sort_by_key(|(offset, ..)| *offset);
		total += markers.len();

		println!("{}", colored!(make_relative(&document.path, &root), bold));
		for (offset, key, mode, state) in markers {
			let line = line_number(&document.content, offset);
			let linked = if ctx.replacements.get(&key).is_some() {
				colored!("linked", green)
			} else {
				colored!("unknown", yellow)
			};
			println!("  {line}: {key} ({mode}, {state}) [{linked}]");
		}
	}

	if total == 0 {
		println!("No markers found.");
		return Ok(());
	}

	println!("\n{total} marker(s) in {} document(s)", ctx.documents.len());
	Ok(())
}

/// One-based line number of a byte offset.
fn line_number(content: &str, offset: usize) -> usize {
	content[..offset].matches('\n').count() + 1
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
