//! `expander_core` keeps generated text inside markdown documents in sync
//! with a small expression language. Authors wrap a region in an expansion
//! marker naming a configured key, and every pass recomputes the key's
//! expression and rewrites the region.
//!
//! ```markdown
//! Last reviewed: <!-- expand: reviewed -->2024-06-20<!---->
//! ```
//!
//! ## Processing Pipeline
//!
//! ```text
//! Expression text
//!   → Lexer (logos tokens, never fails)
//!   → Parser (element chain: initial function, then methods)
//!   → Interpreter (typed values, falls back to the raw text on error)
//!
//! Document text
//!   → Scanner (complete marker pairs and incomplete openings)
//!   → Engine (per-mode policy, rewrites from the end backwards)
//!   → Frontmatter writer (applies `prop.` key updates)
//! ```
//!
//! ## Markers
//!
//! | mode             | opening marker                    |
//! |------------------|-----------------------------------|
//! | `auto`           | `<!-- expand: KEY -->`            |
//! | `manual`         | `<!-- expand-manual: KEY -->`     |
//! | `once`           | `<!-- expand-once: KEY -->`       |
//! | `once_and_eject` | `<!-- expand-once-eject: KEY -->` |
//!
//! Every mode closes with `<!---->`.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `expander.toml`.
//! - [`project`]: Directory walking and document collection.
//! - [`dates`]: Date parsing, formatting and relative phrases.
//! - [`frontmatter`]: Reading and writing the frontmatter header.
//!
//! ## Quick Start
//!
//! ```rust
//! use expander_core::ProcessScope;
//! use expander_core::ReplacementSet;
//! use expander_core::evaluate;
//! use expander_core::replace;
//!
//! assert_eq!(evaluate("upper('hello').replace('L', 'X')", None), "HEXXO");
//!
//! let replacements = ReplacementSet::from_pairs([("greeting", "text('hi')")]).unwrap();
//! let outcome = replace(
//! 	"<!-- expand: greeting -->",
//! 	ProcessScope::All,
//! 	&replacements,
//! 	None,
//! );
//! assert_eq!(
//! 	outcome.new_text.as_deref(),
//! 	Some("<!-- expand: greeting -->hi<!---->")
//! );
//! ```

pub use config::*;
pub use context::*;
pub use engine::*;
pub use error::*;
pub use interpreter::*;
pub use parser::*;
pub use scanner::*;
pub use value::*;

pub mod config;
mod context;
pub mod dates;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod frontmatter;
mod interpreter;
pub(crate) mod lexer;
mod parser;
pub mod project;
mod scanner;
pub(crate) mod tokens;
mod value;

#[cfg(test)]
mod __tests;
