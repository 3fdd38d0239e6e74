use std::fmt::Display;

/// The kind of a single expression token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
	/// An identifier, e.g. `upper` or `file`.
	Identifier,
	/// `.`
	Dot,
	/// `(`
	LeftParen,
	/// `)`
	RightParen,
	/// A quoted string, e.g. `'YYYY'` or `"hello"`. The token text holds the
	/// decoded value without quotes.
	StringLiteral,
	/// A number, e.g. `2`, `-3` or `1.5`. The token text holds the literal as
	/// written.
	NumberLiteral,
	/// `,`
	Comma,
	/// Always the final token of a stream.
	EndOfInput,
	/// Any character the tokenizer doesn't understand. The parser skips these.
	Unrecognized,
}

impl Display for TokenKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Identifier => write!(f, "identifier"),
			Self::Dot => write!(f, "dot"),
			Self::LeftParen => write!(f, "left paren"),
			Self::RightParen => write!(f, "right paren"),
			Self::StringLiteral => write!(f, "string"),
			Self::NumberLiteral => write!(f, "number"),
			Self::Comma => write!(f, "comma"),
			Self::EndOfInput => write!(f, "end of input"),
			Self::Unrecognized => write!(f, "unrecognized"),
		}
	}
}

/// A token produced from a raw expression string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub kind: TokenKind,
	pub text: String,
}

impl Token {
	pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
		Self {
			kind,
			text: text.into(),
		}
	}

	pub fn end_of_input() -> Self {
		Self::new(TokenKind::EndOfInput, "")
	}

	pub fn is(&self, kind: TokenKind) -> bool {
		self.kind == kind
	}

	/// True when this is an identifier with exactly the given name.
	pub fn is_ident(&self, name: &str) -> bool {
		self.kind == TokenKind::Identifier && self.text == name
	}
}

impl Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.kind {
			TokenKind::StringLiteral => write!(f, "{:?}", self.text),
			TokenKind::EndOfInput => write!(f, "<end>"),
			_ => write!(f, "{}", self.text),
		}
	}
}
