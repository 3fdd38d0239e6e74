mod common;

use expander_core::AnyEmptyResult;

#[test]
fn list_shows_markers_per_document() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write(tmp.path(), "expander.toml", common::GREETING_CONFIG)?;
	common::write(
		tmp.path(),
		"readme.md",
		"# Readme\n<!-- expand: greeting -->hi<!---->\n\n<!-- expand-once: other -->\n",
	)?;
	common::write(tmp.path(), "empty.md", "no markers here\n")?;

	common::expander_cmd()
		.arg("list")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("readme.md"))
		.stdout(predicates::str::contains("  2: greeting (auto, complete) [linked]"))
		.stdout(predicates::str::contains("  4: other (once, incomplete) [unknown]"))
		.stdout(predicates::str::contains("2 marker(s) in 2 document(s)"));

	Ok(())
}

#[test]
fn list_without_markers() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write(tmp.path(), "readme.md", "plain\n")?;

	common::expander_cmd()
		.arg("list")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("No markers found."));

	Ok(())
}
