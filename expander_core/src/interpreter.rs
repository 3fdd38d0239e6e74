use crate::ElementChain;
use crate::EvalError;
use crate::EvaluationContext;
use crate::ExpressionElement;
use crate::Value;
use crate::dates;
use crate::parse_expression;
use crate::value::parse_number;
use crate::value::string_method;

/// Evaluate `expression` and render the result as text.
///
/// Never fails. When the expression can't be evaluated, for example because
/// it starts with an unknown function, the original expression text is
/// returned unchanged.
pub fn evaluate(expression: &str, context: Option<&EvaluationContext>) -> String {
	match evaluate_value(expression, context) {
		Ok(value) => value.to_display_string(),
		Err(error) => {
			tracing::debug!(%expression, %error, "expression fell back to its source text");
			expression.to_string()
		}
	}
}

/// Evaluate `expression` to a typed [`Value`].
pub fn evaluate_value(
	expression: &str,
	context: Option<&EvaluationContext>,
) -> Result<Value, EvalError> {
	let chain = parse_expression(expression, context);
	evaluate_chain(&chain, context)
}

/// Evaluate an already parsed chain.
///
/// The head element produces the initial value. Every following element is
/// applied as a method to the running value. `file.*` elements after the
/// head are ignored.
pub fn evaluate_chain(
	chain: &ElementChain,
	context: Option<&EvaluationContext>,
) -> Result<Value, EvalError> {
	let Some((head, rest)) = chain.split_first() else {
		return Ok(Value::empty());
	};

	let initial = match head {
		ExpressionElement::FunctionCall { name, args } => call_initial_function(name, args)?,
		ExpressionElement::FileFieldAccess { field } => {
			context
				.and_then(|context| context.field(field))
				.unwrap_or_else(Value::empty)
		}
		ExpressionElement::PropertyAccess { name } => {
			return Err(EvalError::MissingInitialValue(name.clone()));
		}
	};

	let value = rest.iter().fold(initial, |value, element| {
		match element {
			ExpressionElement::FunctionCall { name, args } => value.call_method(name, args),
			ExpressionElement::PropertyAccess { name } => value.call_method(name, &[]),
			ExpressionElement::FileFieldAccess { .. } => value,
		}
	});

	Ok(value)
}

/// Run a built-in function that starts a chain.
pub fn call_initial_function(name: &str, args: &[String]) -> Result<Value, EvalError> {
	let first = args.first().map_or("", String::as_str);

	let value = match name {
		"now" => Value::Date(Some(dates::now())),
		"today" => Value::Date(Some(dates::today())),
		"date" => {
			match dates::parse_date(first) {
				Some(instant) => Value::Date(Some(instant)),
				None => Value::empty(),
			}
		}
		"number" => Value::Num(parse_number(first)),
		"min" => Value::Num(fold_numbers(args, f64::INFINITY, f64::min)),
		"max" => Value::Num(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
		"if" => {
			let branch = if is_truthy(first) { args.get(1) } else { args.get(2) };
			Value::Str(branch.cloned().unwrap_or_default())
		}
		"escapeHTML" | "escapeHtml" | "escape_html" => Value::Str(escape_html(first)),
		"text" | "str" => Value::Str(first.to_string()),
		// String methods double as initial functions over their first argument:
		// `upper('hello')`.
		_ => {
			let rest = args.get(1..).unwrap_or_default();
			string_method(first, name, rest)
				.ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?
		}
	};

	Ok(value)
}

/// `min`/`max` semantics: any non-numeric argument poisons the result with
/// `NaN`, and no arguments yield the identity (`Infinity` for `min`).
fn fold_numbers(args: &[String], identity: f64, pick: fn(f64, f64) -> f64) -> f64 {
	let mut result = identity;

	for arg in args {
		let number = parse_number(arg);
		if number.is_nan() {
			return f64::NAN;
		}
		result = pick(result, number);
	}

	result
}

/// Falsy condition texts are empty, `false`, `0`, `null` and `undefined`,
/// compared case-insensitively after trimming.
pub fn is_truthy(condition: &str) -> bool {
	let normalized = condition.trim().to_lowercase();
	!matches!(
		normalized.as_str(),
		"" | "false" | "0" | "null" | "undefined"
	)
}

pub fn escape_html(text: &str) -> String {
	text.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
		.replace('\'', "&#39;")
}
