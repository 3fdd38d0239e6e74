#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;

pub fn expander_cmd() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_expander"));
	cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
	cmd
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, content: &str) -> std::io::Result<()> {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, content)
}

pub const GREETING_CONFIG: &str = "[[replacements]]\nkey = \"greeting\"\nvalue = \
                                   \"text('hello world')\"\n";
