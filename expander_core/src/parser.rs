use std::iter::Peekable;
use std::slice::Iter;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Serialize;

use crate::EvaluationContext;
use crate::lexer::tokenize;
use crate::tokens::Token;
use crate::tokens::TokenKind;

type TokenIter<'a> = Peekable<Iter<'a, Token>>;

/// One link of a parsed expression chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExpressionElement {
	/// `name(args...)`. As the head of a chain this is an initial function,
	/// anywhere else it's a method applied to the running value.
	FunctionCall { name: String, args: Vec<String> },
	/// A bare identifier such as `upper` in `now().upper`.
	PropertyAccess { name: String },
	/// `file.<field>`.
	FileFieldAccess { field: String },
}

impl ExpressionElement {
	/// The function, method or field name of this element.
	pub fn name(&self) -> &str {
		match self {
			Self::FunctionCall { name, .. } | Self::PropertyAccess { name } => name,
			Self::FileFieldAccess { field } => field,
		}
	}
}

/// The ordered elements of one parsed expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref, DerefMut)]
pub struct ElementChain(pub Vec<ExpressionElement>);

impl ElementChain {
	pub fn into_inner(self) -> Vec<ExpressionElement> {
		self.0
	}
}

/// Tokenize and parse `source` in one step.
pub fn parse_expression(source: &str, context: Option<&EvaluationContext>) -> ElementChain {
	parse(&tokenize(source), context)
}

/// Parse a token stream into an [`ElementChain`].
///
/// Dots only separate elements. Tokens that can't start an element are
/// skipped, so parsing never fails and may produce an empty chain.
/// `file.<field>` references inside argument lists are resolved against
/// `context` immediately.
pub(crate) fn parse(tokens: &[Token], context: Option<&EvaluationContext>) -> ElementChain {
	let mut elements = Vec::new();
	let mut iter = tokens.iter().peekable();

	while let Some(token) = iter.next() {
		if token.is(TokenKind::EndOfInput) {
			break;
		}

		if !token.is(TokenKind::Identifier) {
			continue;
		}

		if token.is_ident("file") {
			if let Some(field) = parse_file_field(&mut iter) {
				elements.push(ExpressionElement::FileFieldAccess { field });
				continue;
			}
		}

		let name = token.text.clone();

		if iter.peek().is_some_and(|next| next.is(TokenKind::LeftParen)) {
			iter.next(); // consume '('
			let args = parse_args(&mut iter, context);
			elements.push(ExpressionElement::FunctionCall { name, args });
		} else {
			elements.push(ExpressionElement::PropertyAccess { name });
		}
	}

	ElementChain(elements)
}

/// Consume `.` + identifier after a `file` identifier. Nothing is consumed
/// unless both tokens are present.
fn parse_file_field(iter: &mut TokenIter<'_>) -> Option<String> {
	let mut lookahead = iter.clone();

	if !lookahead.next()?.is(TokenKind::Dot) {
		return None;
	}

	let field = lookahead.next()?;
	if !field.is(TokenKind::Identifier) {
		return None;
	}

	*iter = lookahead;
	Some(field.text.clone())
}

/// Parse arguments after an opening paren up to the matching `)` or the end
/// of input.
fn parse_args(iter: &mut TokenIter<'_>, context: Option<&EvaluationContext>) -> Vec<String> {
	let mut args = Vec::new();

	while let Some(token) = iter.next() {
		match token.kind {
			TokenKind::RightParen | TokenKind::EndOfInput => break,
			TokenKind::StringLiteral | TokenKind::NumberLiteral => args.push(token.text.clone()),
			TokenKind::Identifier if token.is_ident("file") => {
				if let Some(field) = parse_file_field(iter) {
					let value = context
						.and_then(|context| context.field(&field))
						.map(|value| value.to_display_string())
						.unwrap_or_default();
					args.push(value);
				}
			}
			// Nested calls aren't supported as arguments; skip them whole so
			// their closing paren doesn't end this argument list.
			TokenKind::LeftParen => skip_group(iter),
			_ => {}
		}
	}

	args
}

fn skip_group(iter: &mut TokenIter<'_>) {
	let mut depth = 1usize;

	for token in iter.by_ref() {
		match token.kind {
			TokenKind::LeftParen => depth += 1,
			TokenKind::RightParen => {
				depth -= 1;
				if depth == 0 {
					return;
				}
			}
			TokenKind::EndOfInput => return,
			_ => {}
		}
	}
}
