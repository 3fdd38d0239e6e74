use logos::Logos;

use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Raw tokens produced by logos for flat tokenization of an expression.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
	#[token(".")]
	Dot,
	#[token("(")]
	LeftParen,
	#[token(")")]
	RightParen,
	#[token(",")]
	Comma,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
	Ident,
	// The closing quote is optional so an unterminated string runs to the end
	// of the input instead of falling apart into unrecognized tokens.
	#[regex(r#""([^"\\]|\\(.|\n))*"?"#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\(.|\n))*'?")]
	SingleQuotedString,
	#[regex(r"-?[0-9]+(\.[0-9]+)?")]
	Number,
}

/// Convert a raw expression into a flat token stream. The stream always ends
/// with a [`TokenKind::EndOfInput`] token and tokenization never fails:
/// characters that don't start any token become [`TokenKind::Unrecognized`].
pub fn tokenize(source: &str) -> Vec<Token> {
	let mut tokens = Vec::new();

	for (result, span) in RawToken::lexer(source).spanned() {
		let slice = &source[span];
		let token = match result {
			Ok(RawToken::Dot) => Token::new(TokenKind::Dot, slice),
			Ok(RawToken::LeftParen) => Token::new(TokenKind::LeftParen, slice),
			Ok(RawToken::RightParen) => Token::new(TokenKind::RightParen, slice),
			Ok(RawToken::Comma) => Token::new(TokenKind::Comma, slice),
			Ok(RawToken::Ident) => Token::new(TokenKind::Identifier, slice),
			Ok(RawToken::Number) => Token::new(TokenKind::NumberLiteral, slice),
			Ok(RawToken::DoubleQuotedString | RawToken::SingleQuotedString) => {
				Token::new(TokenKind::StringLiteral, decode_string(slice))
			}
			Err(()) => Token::new(TokenKind::Unrecognized, slice),
		};

		tokens.push(token);
	}

	tokens.push(Token::end_of_input());
	tokens
}

/// Strip the quotes from a string literal slice and resolve its escapes.
///
/// `\n` and `\t` become a newline and a tab, any other escaped character is
/// kept literally (so `\'` and `\"` produce the quote itself). The literal
/// ends at the first unescaped quote matching the opening one.
fn decode_string(slice: &str) -> String {
	let mut chars = slice.chars();
	let Some(quote) = chars.next() else {
		return String::new();
	};

	let mut value = String::with_capacity(slice.len());

	while let Some(ch) = chars.next() {
		match ch {
			'\\' => {
				match chars.next() {
					Some('n') => value.push('\n'),
					Some('t') => value.push('\t'),
					Some(other) => value.push(other),
					None => value.push('\\'),
				}
			}
			ch if ch == quote => break,
			ch => value.push(ch),
		}
	}

	value
}
