use std::collections::HashMap;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::*;
use crate::dates::format_date;
use crate::dates::relative_to;
use crate::frontmatter::format_scalar;
use crate::frontmatter::read_frontmatter;
use crate::frontmatter::write_property;
use crate::lexer::tokenize;
use crate::project::ScanOptions;
use crate::project::scan_documents;
use crate::project::scan_project_with_config;
use crate::tokens::Token;
use crate::tokens::TokenKind;

fn instant(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
	NaiveDate::from_ymd_opt(year, month, day)
		.and_then(|date| date.and_hms_opt(hour, minute, second))
		.unwrap_or_else(|| panic!("invalid test instant"))
}

fn standup_context() -> EvaluationContext {
	EvaluationContext::from_relative_path("journal/2024-06-20 Standup.md")
		.with_created(Some(instant(2024, 6, 20, 9, 30, 0)))
		.with_modified(Some(instant(2024, 6, 21, 17, 5, 9)))
}

/// A resolver that returns fixed values without evaluating them.
fn fixed(pairs: &[(&str, &str)]) -> impl Fn(&str, Option<&EvaluationContext>) -> Option<String> {
	let pairs: Vec<(String, String)> = pairs
		.iter()
		.map(|(key, value)| ((*key).to_string(), (*value).to_string()))
		.collect();

	move |key: &str, _context: Option<&EvaluationContext>| {
		pairs
			.iter()
			.find(|(candidate, _)| candidate == key)
			.map(|(_, value)| value.clone())
	}
}

fn write_file(path: &std::path::Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

// --- Tokenizer tests ---

#[test]
fn tokenize_chain_expression() {
	let kinds: Vec<TokenKind> = tokenize("date(file.name).format('YYYY')")
		.into_iter()
		.map(|token| token.kind)
		.collect();

	assert_eq!(
		kinds,
		vec![
			TokenKind::Identifier,
			TokenKind::LeftParen,
			TokenKind::Identifier,
			TokenKind::Dot,
			TokenKind::Identifier,
			TokenKind::RightParen,
			TokenKind::Dot,
			TokenKind::Identifier,
			TokenKind::LeftParen,
			TokenKind::StringLiteral,
			TokenKind::RightParen,
			TokenKind::EndOfInput,
		]
	);
}

#[rstest]
#[case::single_quoted("'hello'", "hello")]
#[case::double_quoted("\"hello\"", "hello")]
#[case::escaped_quote(r"'it\'s'", "it's")]
#[case::other_quote_inside(r#"'say "hi"'"#, r#"say "hi""#)]
#[case::newline_escape(r"'a\nb'", "a\nb")]
#[case::tab_escape(r"'a\tb'", "a\tb")]
#[case::unterminated("'runs to the end", "runs to the end")]
fn tokenize_string_literals(#[case] source: &str, #[case] expected: &str) {
	let tokens = tokenize(source);

	assert_eq!(
		tokens,
		vec![
			Token::new(TokenKind::StringLiteral, expected),
			Token::end_of_input(),
		]
	);
}

#[rstest]
#[case::integer("42", vec![Token::new(TokenKind::NumberLiteral, "42")])]
#[case::negative("-5", vec![Token::new(TokenKind::NumberLiteral, "-5")])]
#[case::decimal("1.5", vec![Token::new(TokenKind::NumberLiteral, "1.5")])]
#[case::detached_minus("- 5", vec![
	Token::new(TokenKind::Unrecognized, "-"),
	Token::new(TokenKind::NumberLiteral, "5"),
])]
#[case::unknown_character("@", vec![Token::new(TokenKind::Unrecognized, "@")])]
fn tokenize_numbers_and_unrecognized(#[case] source: &str, #[case] expected: Vec<Token>) {
	let mut expected = expected;
	expected.push(Token::end_of_input());
	assert_eq!(tokenize(source), expected);
}

#[test]
fn tokenize_empty_input_is_just_end_of_input() {
	assert_eq!(tokenize("   "), vec![Token::end_of_input()]);
}

// --- Parser tests ---

#[test]
fn parse_function_chain() {
	let chain = parse_expression("now().format('YYYY').upper", None);

	assert_eq!(
		chain.into_inner(),
		vec![
			ExpressionElement::FunctionCall {
				name: "now".into(),
				args: vec![],
			},
			ExpressionElement::FunctionCall {
				name: "format".into(),
				args: vec!["YYYY".into()],
			},
			ExpressionElement::PropertyAccess {
				name: "upper".into(),
			},
		]
	);
}

#[test]
fn parse_file_field_head() {
	let chain = parse_expression("file.name.lower()", None);

	assert_eq!(
		chain.into_inner(),
		vec![
			ExpressionElement::FileFieldAccess {
				field: "name".into(),
			},
			ExpressionElement::FunctionCall {
				name: "lower".into(),
				args: vec![],
			},
		]
	);
}

#[rstest]
#[case::with_context(Some(standup_context()), "2024-06-20 Standup")]
#[case::without_context(None, "")]
fn parse_resolves_file_fields_in_arguments(
	#[case] context: Option<EvaluationContext>,
	#[case] expected: &str,
) {
	let chain = parse_expression("date(file.name, 3)", context.as_ref());

	assert_eq!(
		chain.into_inner(),
		vec![ExpressionElement::FunctionCall {
			name: "date".into(),
			args: vec![expected.into(), "3".into()],
		}]
	);
}

#[rstest]
#[case::empty("")]
#[case::only_punctuation("). , (")]
#[case::only_literals("'text' 42")]
fn parse_never_fails(#[case] source: &str) {
	assert!(parse_expression(source, None).is_empty());
}

#[test]
fn parse_unclosed_argument_list_runs_to_end() {
	let chain = parse_expression("upper('abc'", None);

	assert_eq!(
		chain.into_inner(),
		vec![ExpressionElement::FunctionCall {
			name: "upper".into(),
			args: vec!["abc".into()],
		}]
	);
}

// --- Interpreter tests ---

#[rstest]
#[case::iso_round_trip("date(\"2024-06-20\").format(\"YYYY-MM-DD\")", "2024-06-20")]
#[case::short_tokens("date('2024-06-05').format('M/D/YY')", "6/5/24")]
#[case::double_token_not_split("date('2024-06-05').format('MM')", "06")]
#[case::twelve_hour("date('2024-06-20').format('h:mm A')", "12:00 AM")]
#[case::default_pattern("date('2024-06-20').format()", "2024-06-20")]
#[case::embedded_dash("date('Notes 2024-06-20 standup').format()", "2024-06-20")]
#[case::slashed("date('2024/06/20').format()", "2024-06-20")]
#[case::compact("date('20240620').format()", "2024-06-20")]
#[case::human("date('June 20, 2024').format()", "2024-06-20")]
#[case::day_first("date('20 June 2024').format()", "2024-06-20")]
#[case::display("date('2024-06-20')", "2024-06-20T00:00:00")]
#[case::invalid("date('not a date')", "")]
#[case::blank("date('  ')", "")]
#[case::midnight("date('2024-06-20').date().format('HH:mm:ss')", "00:00:00")]
#[case::time("date('2024-06-20').time()", "00:00:00")]
#[case::year("date('2024-06-20').year()", "2024")]
#[case::month("date('2024-06-20').month()", "6")]
#[case::weekday("date('2024-06-20').weekday()", "4")]
#[case::add_days("date('2024-06-30').addDays(3).format()", "2024-07-03")]
#[case::string_fallback("date('2024-06-20').lower()", "2024-06-20t00:00:00")]
fn evaluate_dates(#[case] expression: &str, #[case] expected: &str) {
	assert_eq!(evaluate(expression, None), expected);
}

#[rstest]
#[case::upper_then_replace("upper('hello').replace('L','X')", "HEXXO")]
#[case::title("text('hello WORLD').title()", "Hello World")]
#[case::negative_slice("text('Hello').slice(-3)", "llo")]
#[case::slice_range("text('Hello').slice(1, 3)", "el")]
#[case::repeat_floors("text('ab').repeat(2.7)", "abab")]
#[case::repeat_negative("text('ab').repeat(-1)", "")]
#[case::starts_with("text('hello').startsWith('he')", "true")]
#[case::ends_with("text('hello').endsWith('x')", "false")]
#[case::contains_all("text('hello').containsAll('h', 'o')", "true")]
#[case::contains_any("text('hello').containsAny('x', 'y')", "false")]
#[case::blank_is_empty("text('  ').isEmpty()", "true")]
#[case::reverse("text('abc').reverse()", "cba")]
#[case::trim("text('  padded  ').trim()", "padded")]
#[case::length("text('héllo').length()", "5")]
#[case::split_display("text('a,b,c').split(',')", "a, b, c")]
#[case::split_limit("text('a,b,c').split(',', 2)", "a, b")]
#[case::split_last("text('a,b,c').split(',').last()", "c")]
#[case::split_join("text('a,b,c').split(',').join('|')", "a|b|c")]
#[case::split_at("text('a,b,c').split(',').at(-2)", "b")]
#[case::split_length("text('a,b,c').split(',').length()", "3")]
#[case::regex_replace("text('a.b.c').replace('.', '-')", "-----")]
#[case::regex_class("text('a1b22c').replace('[0-9]+', '#')", "a#b#c")]
#[case::literal_fallback("text('a(b').replace('(', '[')", "a[b")]
#[case::replacement_group_is_literal("text('ab').replace('a', '$1')", "$1b")]
#[case::replacement_name_is_literal("text('a-b').replace('-', '$x')", "a$xb")]
#[case::replacement_price("text('cost: 5').replace('[0-9]+', '$5')", "cost: $5")]
#[case::method_on_bool("text('hello').contains('ell').upper()", "TRUE")]
fn evaluate_strings(#[case] expression: &str, #[case] expected: &str) {
	assert_eq!(evaluate(expression, None), expected);
}

#[rstest]
#[case::floor("number('3.7').floor()", "3")]
#[case::ceil("number('3.2').ceil()", "4")]
#[case::abs("number('-3.5').abs()", "3.5")]
#[case::round("number('2.5').round()", "3")]
#[case::round_digits("number('1.25').round(1)", "1.3")]
#[case::to_fixed("number('3.14159').toFixed(2)", "3.14")]
#[case::fraction("number('0.5')", "0.5")]
#[case::not_a_number("number('abc')", "NaN")]
#[case::nan_is_empty("number('abc').isEmpty()", "true")]
#[case::min("min('3', '1', '2')", "1")]
#[case::max("max(3, 10, -2)", "10")]
#[case::min_without_args("min()", "Infinity")]
#[case::max_without_args("max()", "-Infinity")]
#[case::max_with_text("max('1', 'x')", "NaN")]
#[case::inf_is_not_a_number("number('inf')", "NaN")]
#[case::lowercase_infinity("number('infinity')", "NaN")]
#[case::nan_spelling("number('nan').isEmpty()", "true")]
#[case::infinity("number('-Infinity')", "-Infinity")]
#[case::large_exponent("number('1e21')", "1e+21")]
#[case::below_exponent_threshold("number('1e20')", "100000000000000000000")]
#[case::small_exponent("number('0.0000001')", "1e-7")]
#[case::small_fraction("number('0.000001')", "0.000001")]
fn evaluate_numbers(#[case] expression: &str, #[case] expected: &str) {
	assert_eq!(evaluate(expression, None), expected);
}

#[rstest]
#[case::empty_is_falsy("if('', 'yes', 'no')", "no")]
#[case::text_is_truthy("if('hello', 'yes', 'no')", "yes")]
#[case::false_ignores_case("if(' FALSE ', 'yes', 'no')", "no")]
#[case::zero("if('0', 'yes', 'no')", "no")]
#[case::null("if('null', 'yes', 'no')", "no")]
#[case::undefined("if('undefined', 'yes', 'no')", "no")]
#[case::missing_else("if('0', 'yes')", "")]
#[case::nested_value("if(file.name, 'named', 'anonymous')", "anonymous")]
fn evaluate_conditionals(#[case] expression: &str, #[case] expected: &str) {
	assert_eq!(evaluate(expression, None), expected);
}

#[test]
fn evaluate_escape_html_escapes_ampersand_first() {
	assert_eq!(
		evaluate(r#"escapeHTML('<a href="x">&amp;</a>')"#, None),
		"&lt;a href=&quot;x&quot;&gt;&amp;amp;&lt;/a&gt;"
	);
	assert_eq!(evaluate("escapeHTML(\"it's\")", None), "it&#39;s");
}

#[rstest]
#[case::name("file.name", "2024-06-20 Standup")]
#[case::path("file.path", "journal/2024-06-20 Standup.md")]
#[case::folder("file.folder", "journal")]
#[case::extension("file.extension", "md")]
#[case::modified("file.mtime.format('YYYY-MM-DD HH:mm:ss')", "2024-06-21 17:05:09")]
#[case::created_relative_format("file.ctime.format('hh:mm a')", "09:30 am")]
#[case::unknown_field("file.colour", "")]
#[case::date_from_name("date(file.name).format('DD.MM.YYYY')", "20.06.2024")]
fn evaluate_file_fields(#[case] expression: &str, #[case] expected: &str) {
	let context = standup_context();
	assert_eq!(evaluate(expression, Some(&context)), expected);
}

#[test]
fn evaluate_file_fields_without_context_are_empty() {
	assert_eq!(evaluate("file.name", None), "");
	assert_eq!(evaluate("file.name.upper()", None), "");
}

#[rstest]
#[case::unknown_function("bogus('x')")]
#[case::bare_property_head("upper")]
#[case::unknown_function_in_chain_head("explode().upper()")]
fn evaluate_falls_back_to_expression_text(#[case] expression: &str) {
	assert_eq!(evaluate(expression, None), expression);
}

#[rstest]
#[case::unknown_method("text('x').bogus()", "x")]
#[case::empty_expression("", "")]
#[case::unknown_date_method("date('2024-06-20').bogus().format()", "2024-06-20")]
fn evaluate_unknown_methods_leave_value(#[case] expression: &str, #[case] expected: &str) {
	assert_eq!(evaluate(expression, None), expected);
}

#[test]
fn evaluate_value_reports_typed_results() {
	assert_eq!(evaluate_value("number('2')", None), Ok(Value::Num(2.0)));
	assert_eq!(
		evaluate_value("text('a b').split(' ')", None),
		Ok(Value::StrList(vec!["a".into(), "b".into()]))
	);
	assert_eq!(
		evaluate_value("nope()", None),
		Err(EvalError::UnknownFunction("nope".into()))
	);
	assert_eq!(
		evaluate_value("upper", None),
		Err(EvalError::MissingInitialValue("upper".into()))
	);
}

#[test]
fn today_starts_at_midnight() {
	assert_eq!(evaluate("today().time()", None), "00:00:00");
	assert_eq!(evaluate("now().relative()", None), "just now");
	assert_eq!(evaluate("now().isEmpty()", None), "false");
}

#[traced_test]
#[test]
fn evaluate_logs_fallbacks() {
	let result = evaluate("missing('value')", None);

	assert_eq!(result, "missing('value')");
	assert!(logs_contain("expression fell back to its source text"));
	assert!(logs_contain("unknown function: `missing`"));
}

// --- Date helper tests ---

#[rstest]
#[case::just_now(TimeDelta::seconds(-30), "just now")]
#[case::minutes_ago(TimeDelta::minutes(-5), "5 minutes ago")]
#[case::one_hour_ago(TimeDelta::hours(-1), "1 hour ago")]
#[case::in_days(TimeDelta::days(3), "in 3 days")]
#[case::months_ago(TimeDelta::days(-65), "2 months ago")]
#[case::one_year_ago(TimeDelta::days(-400), "1 year ago")]
fn relative_phrases(#[case] offset: TimeDelta, #[case] expected: &str) {
	let reference = instant(2024, 6, 20, 12, 0, 0);
	assert_eq!(relative_to(reference + offset, reference), expected);
}

#[test]
fn format_date_copies_unknown_characters() {
	let value = instant(2024, 1, 2, 15, 4, 5);

	insta::assert_snapshot!(format_date(value, "YYYY-MM-DD [HH:mm:ss] h A"), @"2024-01-02 [15:04:05] 3 PM");
	assert_eq!(format_date(value, "MMMM"), "0101");
}

// --- Scanner tests ---

#[test]
fn scan_complete_pair() {
	let text = "before <!-- expand: foo -->bar<!----> after";
	let matches = scan_complete(text);

	assert_eq!(
		matches,
		vec![ExpanderMatch {
			key: "foo".into(),
			current_inner_text: "bar".into(),
			start_offset: 7,
			end_offset: 37,
			full_match_text: "<!-- expand: foo -->bar<!---->".into(),
			update_mode: UpdateMode::Auto,
			open_marker_text: "<!-- expand: foo -->".into(),
			close_marker_text: CLOSE_MARKER.into(),
		}]
	);
	assert!(scan_incomplete(text).is_empty());
}

#[rstest]
#[case::auto("<!-- expand: k -->x<!---->", UpdateMode::Auto)]
#[case::manual("<!-- expand-manual: k -->x<!---->", UpdateMode::Manual)]
#[case::once("<!-- expand-once: k -->x<!---->", UpdateMode::Once)]
#[case::once_and_eject("<!-- expand-once-eject: k -->x<!---->", UpdateMode::OnceAndEject)]
#[case::tight_spacing("<!--expand-once:k-->x<!---->", UpdateMode::Once)]
fn scan_detects_update_modes(#[case] text: &str, #[case] mode: UpdateMode) {
	let matches = scan_complete(text);

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].update_mode, mode);
	assert_eq!(matches[0].key, "k");
	assert_eq!(matches[0].current_inner_text, "x");
}

#[test]
fn scan_inner_text_spans_lines() {
	let matches = scan_complete("<!-- expand: list -->\n- one\n- two\n<!---->");

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].current_inner_text, "\n- one\n- two\n");
}

#[test]
fn scan_incomplete_skips_complete_pairs() {
	let text = "<!-- expand: a -->x<!----> <!-- expand: b -->";
	let incomplete = scan_incomplete(text);

	assert_eq!(
		incomplete,
		vec![IncompleteExpansion {
			key: "b".into(),
			start_offset: 27,
			end_offset: 45,
			open_marker_text: "<!-- expand: b -->".into(),
			update_mode: UpdateMode::Auto,
		}]
	);
}

#[test]
fn scan_does_not_pair_across_another_opening() {
	let text = "<!-- expand: prop.title --> body <!-- expand: foo -->bar<!---->";

	let complete = scan_complete(text);
	let incomplete = scan_incomplete(text);

	assert_eq!(complete.len(), 1);
	assert_eq!(complete[0].key, "foo");
	assert_eq!(incomplete.len(), 1);
	assert_eq!(incomplete[0].key, "prop.title");
}

#[test]
fn scan_property_keys_allow_spaces() {
	let incomplete = scan_incomplete("<!-- expand: prop.Last Updated -->");

	assert_eq!(incomplete.len(), 1);
	assert_eq!(incomplete[0].key, "prop.Last Updated");
	assert!(incomplete[0].is_property());
	assert_eq!(property_name(&incomplete[0].key), Some("Last Updated"));
}

#[rstest]
#[case::uppercase("<!-- expand: Foo -->x<!---->")]
#[case::underscore("<!-- expand: foo_bar -->x<!---->")]
#[case::leading_hyphen("<!-- expand: -foo -->x<!---->")]
#[case::empty_property("<!-- expand: prop. -->x<!---->")]
#[case::unknown_mode("<!-- expand-always: foo -->x<!---->")]
fn scan_ignores_invalid_markers(#[case] text: &str) {
	assert!(scan_complete(text).is_empty());
	assert!(scan_incomplete(text).is_empty());
}

#[rstest]
#[case::simple("foo", true)]
#[case::kebab("my-key-2", true)]
#[case::digits("2024", true)]
#[case::property("prop.updated", true)]
#[case::property_with_spaces("prop.Last Updated", true)]
#[case::property_with_underscores("prop.last_updated.at", true)]
#[case::uppercase("Foo", false)]
#[case::underscore("foo_bar", false)]
#[case::double_hyphen("foo--bar", false)]
#[case::trailing_hyphen("foo-", false)]
#[case::empty("", false)]
#[case::blank_property("prop.  ", false)]
fn key_validation(#[case] key: &str, #[case] valid: bool) {
	assert_eq!(is_valid_key(key), valid);
}

#[test]
fn update_mode_open_markers_round_trip_through_scanner() {
	for mode in [
		UpdateMode::Auto,
		UpdateMode::Manual,
		UpdateMode::Once,
		UpdateMode::OnceAndEject,
	] {
		let text = format!("{}{CLOSE_MARKER}", mode.open_marker("key"));
		let matches = scan_complete(&text);
		assert_eq!(matches.len(), 1, "mode {mode}");
		assert_eq!(matches[0].update_mode, mode);
	}
}

// --- Engine tests ---

#[test]
fn replace_completes_bare_opening() {
	let resolver = fixed(&[("foo", "bar")]);
	let outcome = replace("<!-- expand: foo -->", ProcessScope::All, &resolver, None);

	assert_eq!(
		outcome.new_text.as_deref(),
		Some("<!-- expand: foo -->bar<!---->")
	);
	assert_eq!(outcome.replacements_count, 1);
	assert!(outcome.unknown_keys.is_empty());
}

#[test]
fn replace_closes_opening_already_followed_by_value() {
	let resolver = fixed(&[("foo", "bar")]);
	let outcome = replace("<!-- expand: foo -->bar", ProcessScope::All, &resolver, None);

	assert_eq!(
		outcome.new_text.as_deref(),
		Some("<!-- expand: foo -->bar<!---->")
	);
	assert_eq!(outcome.replacements_count, 1);
}

#[test]
fn replace_rewrites_stale_content_and_is_idempotent() {
	let resolver = fixed(&[("foo", "bar")]);
	let first = replace(
		"# Title\n<!-- expand: foo -->old<!---->\n",
		ProcessScope::AutoOnly,
		&resolver,
		None,
	);
	let Some(text) = first.new_text else {
		panic!("expected a rewrite");
	};

	assert_eq!(text, "# Title\n<!-- expand: foo -->bar<!---->\n");
	assert_eq!(first.replacements_count, 1);

	let second = replace(&text, ProcessScope::AutoOnly, &resolver, None);
	assert_eq!(second, ReplaceOutcome::default());
}

#[test]
fn replace_applies_every_marker_from_the_end() {
	let resolver = fixed(&[("a", "first value"), ("b", "2")]);
	let outcome = replace(
		"<!-- expand: a --><!----> and <!-- expand: b -->old<!----> <!-- expand: a -->",
		ProcessScope::All,
		&resolver,
		None,
	);

	assert_eq!(
		outcome.new_text.as_deref(),
		Some(
			"<!-- expand: a -->first value<!----> and <!-- expand: b -->2<!----> <!-- expand: a \
			 -->first value<!---->"
		)
	);
	assert_eq!(outcome.replacements_count, 3);
}

#[test]
fn replace_reports_unknown_keys_in_document_order() {
	let resolver = fixed(&[]);
	let outcome = replace(
		"<!-- expand: x -->a<!----> <!-- expand: y -->b<!----> <!-- expand: x --><!---->",
		ProcessScope::All,
		&resolver,
		None,
	);

	assert_eq!(outcome.new_text, None);
	assert_eq!(outcome.unknown_keys, vec!["x", "y"]);
	assert_eq!(outcome.replacements_count, 0);
}

#[test]
fn replace_closes_unknown_incomplete_marker() {
	let resolver = fixed(&[]);
	let outcome = replace("<!-- expand: nope -->", ProcessScope::All, &resolver, None);

	assert_eq!(
		outcome.new_text.as_deref(),
		Some("<!-- expand: nope --><!---->")
	);
	assert_eq!(outcome.unknown_keys, vec!["nope"]);
	assert_eq!(outcome.replacements_count, 0);
}

#[test]
fn replace_leaves_unknown_property_marker_open() {
	let resolver = fixed(&[]);
	let outcome = replace(
		"<!-- expand: prop.missing -->",
		ProcessScope::All,
		&resolver,
		None,
	);

	assert_eq!(outcome.new_text, None);
	assert_eq!(outcome.unknown_keys, vec!["prop.missing"]);
}

#[rstest]
#[case::auto_only(ProcessScope::AutoOnly, None)]
#[case::all(ProcessScope::All, Some("<!-- expand-manual: foo -->bar<!---->"))]
fn replace_manual_markers_need_all_scope(
	#[case] scope: ProcessScope,
	#[case] expected: Option<&str>,
) {
	let resolver = fixed(&[("foo", "bar")]);
	let outcome = replace(
		"<!-- expand-manual: foo -->old<!---->",
		scope,
		&resolver,
		None,
	);

	assert_eq!(outcome.new_text.as_deref(), expected);
}

#[test]
fn replace_skips_manual_incomplete_marker_outside_scope() {
	let resolver = fixed(&[("foo", "bar")]);
	let outcome = replace(
		"<!-- expand-manual: foo -->",
		ProcessScope::AutoOnly,
		&resolver,
		None,
	);

	assert_eq!(outcome, ReplaceOutcome::default());
}

#[rstest]
#[case::blank_is_filled("<!-- expand-once: foo -->  <!---->", Some("<!-- expand-once: foo -->bar<!---->"))]
#[case::filled_is_frozen("<!-- expand-once: foo -->kept<!---->", None)]
#[case::eject_blank("a <!-- expand-once-eject: foo --><!----> b", Some("a bar b"))]
#[case::eject_filled_is_frozen("a <!-- expand-once-eject: foo -->kept<!----> b", None)]
#[case::eject_incomplete("a <!-- expand-once-eject: foo --> b", Some("a bar b"))]
fn replace_once_modes(#[case] text: &str, #[case] expected: Option<&str>) {
	let resolver = fixed(&[("foo", "bar")]);
	let outcome = replace(text, ProcessScope::All, &resolver, None);

	assert_eq!(outcome.new_text.as_deref(), expected);
}

#[test]
fn replace_records_property_updates_without_touching_markers() {
	let resolver = fixed(&[("prop.updated", "2024-06-20"), ("prop.title", "New")]);
	let text = "<!-- expand: prop.updated -->\n<!-- expand: prop.title --><!---->\n";
	let outcome = replace(text, ProcessScope::All, &resolver, None);

	assert_eq!(outcome.new_text, None);
	assert_eq!(outcome.replacements_count, 0);
	assert_eq!(
		outcome.property_updates,
		vec![
			PropertyUpdate {
				name: "updated".into(),
				value: "2024-06-20".into(),
			},
			PropertyUpdate {
				name: "title".into(),
				value: "New".into(),
			},
		]
	);
}

#[test]
fn process_document_prepends_frontmatter_for_property_keys() {
	let resolver = fixed(&[("prop.updated", "2024-06-20")]);
	let text = "# Notes\n<!-- expand: prop.updated -->\nbody\n";
	let update = process_document(text, ProcessScope::All, &resolver, None);

	assert!(update.changed);
	assert_eq!(
		update.content,
		"---\nupdated: 2024-06-20\n---\n# Notes\n<!-- expand: prop.updated -->\nbody\n"
	);

	let again = process_document(&update.content, ProcessScope::All, &resolver, None);
	assert!(!again.changed);
	assert_eq!(again.content, update.content);
}

#[test]
fn process_document_once_property_keeps_existing_value() {
	let resolver = fixed(&[("prop.created", "2025-01-01")]);
	let text = "---\ncreated: 2024-01-01\n---\n<!-- expand-once: prop.created -->\n";
	let update = process_document(text, ProcessScope::All, &resolver, None);

	assert!(!update.changed);
	assert!(update.property_updates.is_empty());
}

#[test]
fn process_document_ejects_property_marker() {
	let resolver = fixed(&[("prop.created", "2024-06-20")]);
	let text = "Intro <!-- expand-once-eject: prop.created --><!---->done\n";
	let update = process_document(text, ProcessScope::All, &resolver, None);

	assert_eq!(update.content, "---\ncreated: 2024-06-20\n---\nIntro done\n");
	assert_eq!(update.replacements_count, 1);
}

#[test]
fn hash_map_resolver_evaluates_expressions() {
	let resolver: HashMap<String, String> = HashMap::from([
		("greeting".to_string(), "upper('hi')".to_string()),
		("where".to_string(), "file.folder".to_string()),
	]);
	let context = standup_context();
	let outcome = replace(
		"<!-- expand: greeting --> in <!-- expand: where -->",
		ProcessScope::All,
		&resolver,
		Some(&context),
	);

	assert_eq!(
		outcome.new_text.as_deref(),
		Some("<!-- expand: greeting -->HI<!----> in <!-- expand: where -->journal<!---->")
	);
}

#[traced_test]
#[test]
fn replace_traces_marker_decisions() {
	let resolver = fixed(&[("foo", "bar")]);
	let _ = replace(
		"<!-- expand-once: foo -->kept<!---->",
		ProcessScope::All,
		&resolver,
		None,
	);

	assert!(logs_contain("once marker already filled"));
}

// --- Frontmatter tests ---

#[test]
fn read_frontmatter_coerces_scalars() {
	let text = "---\ntitle: Hello\ncount: 3\nratio: 0.5\ndraft: false\nempty:\nnothing: ~\nquoted: \
	            \"a: b\\\"c\"\nsingle: 'it''s'\n# comment\ntags:\n  - one\n---\nbody\n";
	let Some(header) = read_frontmatter(text) else {
		panic!("expected a header");
	};

	assert_eq!(
		serde_json::to_value(&header.data).unwrap_or_else(|e| panic!("json: {e}")),
		serde_json::json!({
			"title": "Hello",
			"count": 3,
			"ratio": 0.5,
			"draft": false,
			"empty": null,
			"nothing": null,
			"quoted": "a: b\"c",
			"single": "it's",
			"tags": null,
		})
	);
	assert_eq!(&text[header.body_start..], "body\n");
	assert!(text[header.span.clone()].ends_with("\n---"));
	assert!(header.has_value("title"));
	assert!(!header.has_value("empty"));
}

#[rstest]
#[case::no_header("# Title\n")]
#[case::not_at_start("\n---\ntitle: x\n---\n")]
#[case::unclosed("---\ntitle: x\n")]
#[case::indented_closing("---\ntitle: x\n ---\n")]
fn read_frontmatter_treats_malformed_as_absent(#[case] text: &str) {
	assert_eq!(read_frontmatter(text), None);
}

#[rstest]
#[case::synthesize("body\n", "---\nupdated: 2024-06-20\n---\nbody\n")]
#[case::replace_in_place(
	"---\ntitle: x\nupdated: old\n---\nbody\n",
	"---\ntitle: x\nupdated: 2024-06-20\n---\nbody\n"
)]
#[case::append_before_closing(
	"---\ntitle: x\n---\nbody\n",
	"---\ntitle: x\nupdated: 2024-06-20\n---\nbody\n"
)]
#[case::replace_continuation_lines(
	"---\nupdated:\n  - a\n  - b\ntitle: x\n---\n",
	"---\nupdated: 2024-06-20\ntitle: x\n---\n"
)]
#[case::crlf(
	"---\r\ntitle: x\r\n---\r\nbody\r\n",
	"---\r\ntitle: x\r\nupdated: 2024-06-20\r\n---\r\nbody\r\n"
)]
fn write_property_cases(#[case] text: &str, #[case] expected: &str) {
	assert_eq!(write_property(text, "updated", "2024-06-20"), expected);
}

#[rstest]
#[case::plain("plain text", "plain text")]
#[case::date("2024-06-20", "2024-06-20")]
#[case::colon("a: b", r#""a: b""#)]
#[case::hash("C# notes", r#""C# notes""#)]
#[case::quotes(r#"say "hi""#, r#""say \"hi\"""#)]
#[case::backslash_with_quote(r#"a\"b"#, r#""a\\\"b""#)]
#[case::newline("line\nbreak", r#""line\nbreak""#)]
#[case::leading_space(" padded", r#"" padded""#)]
#[case::empty("", r#""""#)]
#[case::indicator("- item", r#""- item""#)]
#[case::boolean("true", r#""true""#)]
#[case::boolean_case("No", r#""No""#)]
#[case::null("null", r#""null""#)]
#[case::integer("42", r#""42""#)]
#[case::float("1.5", r#""1.5""#)]
fn format_scalar_quotes_when_needed(#[case] value: &str, #[case] expected: &str) {
	assert_eq!(format_scalar(value), expected);
}

#[test]
fn written_properties_read_back() {
	let text = write_property("body", "note", "a: \"b\"\nc");
	let Some(header) = read_frontmatter(&text) else {
		panic!("expected a header");
	};

	assert_eq!(
		header.data.get("note"),
		Some(&serde_json::Value::String("a: \"b\"\nc".into()))
	);
}

#[test]
fn apply_property_updates_in_order() {
	let updates = vec![
		PropertyUpdate {
			name: "a".into(),
			value: "1x".into(),
		},
		PropertyUpdate {
			name: "a".into(),
			value: "2x".into(),
		},
	];

	assert_eq!(
		apply_property_updates("text", &updates),
		"---\na: 2x\n---\ntext"
	);
}

// --- Context tests ---

#[rstest]
#[case::nested("docs/guide/intro.md", "intro", "docs/guide", "md")]
#[case::root("readme.md", "readme", "/", "md")]
#[case::leading_slash("/readme.md", "readme", "/", "md")]
#[case::dotfile(".hidden", ".hidden", "/", "")]
#[case::multiple_dots("notes/2024.06.20.md", "2024.06.20", "notes", "md")]
#[case::windows_separators("notes\\today.md", "today", "notes", "md")]
fn context_from_relative_path(
	#[case] path: &str,
	#[case] name: &str,
	#[case] folder: &str,
	#[case] extension: &str,
) {
	let context = EvaluationContext::from_relative_path(path);

	assert_eq!(context.name, name);
	assert_eq!(context.folder, folder);
	assert_eq!(context.extension, extension);
	assert_eq!(context.created, None);
}

// --- Config tests ---

#[test]
fn parse_config_with_replacements() -> ExpanderResult<()> {
	let config = ExpanderConfig::parse(
		r#"
max_file_size = 2048
disable_gitignore = true

[[replacements]]
key = "today"
value = "today().format('YYYY-MM-DD')"

[[replacements]]
key = "prop.updated"
expression = "now().format('YYYY-MM-DD')"
enabled = false

[exclude]
patterns = ["drafts/"]

[include]
patterns = ["notes/**/*.txt"]
"#,
	)?;

	assert_eq!(config.max_file_size, 2048);
	assert!(config.disable_gitignore);
	assert_eq!(
		config.replacements,
		vec![
			Replacement::new("today", "today().format('YYYY-MM-DD')"),
			Replacement::new("prop.updated", "now().format('YYYY-MM-DD')").disabled(),
		]
	);
	assert_eq!(config.exclude.patterns, vec!["drafts/"]);
	assert_eq!(config.include.patterns, vec!["notes/**/*.txt"]);

	let set = config.replacement_set()?;
	assert!(set.get("today").is_some());
	assert!(set.get("prop.updated").is_none());
	assert_eq!(set.resolve("prop.updated", None), None);

	Ok(())
}

#[test]
fn parse_config_defaults() -> ExpanderResult<()> {
	let config = ExpanderConfig::parse("")?;

	assert!(config.replacements.is_empty());
	assert_eq!(config.max_file_size, config::DEFAULT_MAX_FILE_SIZE);
	assert!(!config.disable_gitignore);

	Ok(())
}

#[test]
fn parse_config_rejects_invalid_key() {
	let result = ExpanderConfig::parse("[[replacements]]\nkey = \"Bad_Key\"\nvalue = \"now()\"\n");

	assert!(matches!(result, Err(ExpanderError::InvalidKey(key)) if key == "Bad_Key"));
}

#[test]
fn parse_config_rejects_duplicate_key() {
	let result = ExpanderConfig::parse(
		"[[replacements]]\nkey = \"a\"\nvalue = \"now()\"\n\n[[replacements]]\nkey = \"a\"\nvalue \
		 = \"today()\"\n",
	);

	assert!(matches!(result, Err(ExpanderError::DuplicateKey(key)) if key == "a"));
}

#[test]
fn parse_config_reports_toml_errors() {
	let result = ExpanderConfig::parse("[[replacements]\nkey = ");

	assert!(matches!(result, Err(ExpanderError::ConfigParse(_))));
}

#[test]
fn load_config_discovers_candidates() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	assert!(ExpanderConfig::load(tmp.path())?.is_none());

	write_file(
		&tmp.path().join(".config/expander.toml"),
		"[[replacements]]\nkey = \"hidden\"\nvalue = \"text('h')\"\n",
	);
	let config = ExpanderConfig::load(tmp.path())?;
	assert_eq!(config.map(|c| c.replacements.len()), Some(1));

	write_file(
		&tmp.path().join("expander.toml"),
		"[[replacements]]\nkey = \"a\"\nvalue = \"text('a')\"\n\n[[replacements]]\nkey = \
		 \"b\"\nvalue = \"text('b')\"\n",
	);
	let config = ExpanderConfig::load(tmp.path())?;
	assert_eq!(config.map(|c| c.replacements.len()), Some(2));

	Ok(())
}

#[test]
fn replacement_set_from_pairs_validates() {
	assert!(ReplacementSet::from_pairs([("ok-key", "now()")]).is_ok());
	assert!(matches!(
		ReplacementSet::from_pairs([("no spaces", "now()")]),
		Err(ExpanderError::InvalidKey(_))
	));
}

// --- Project tests ---

#[test]
fn compute_updates_across_project() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(
		&root.join("expander.toml"),
		"[[replacements]]\nkey = \"title\"\nvalue = \"file.name.title()\"\n\n[[replacements]]\nkey = \
		 \"where\"\nvalue = \"file.folder\"\n",
	);
	write_file(&root.join("notes/weekly plan.md"), "# <!-- expand: title -->\n");
	write_file(
		&root.join("readme.md"),
		"<!-- expand: where -->/<!----> <!-- expand: missing -->x<!---->\n",
	);

	let ctx = scan_project_with_config(root)?;
	assert_eq!(ctx.documents.len(), 2);

	let updates = compute_updates(&ctx, ProcessScope::AutoOnly)?;
	assert_eq!(updates.updated_count, 1);
	assert_eq!(updates.updated_files.len(), 1);
	assert_eq!(
		updates.updated_files.get(&root.join("notes/weekly plan.md")),
		Some(&"# <!-- expand: title -->Weekly Plan<!---->\n".to_string())
	);
	assert_eq!(
		updates.unknown_keys,
		vec![UnknownKeys {
			file: root.join("readme.md"),
			keys: vec!["missing".into()],
		}]
	);

	write_updates(&updates)?;
	let ctx = scan_project_with_config(root)?;
	let check = check_project(&ctx, ProcessScope::AutoOnly)?;
	assert!(check.is_ok());
	assert!(check.has_unknown_keys());

	Ok(())
}

#[test]
fn check_project_reports_stale_documents() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(
		&root.join("expander.toml"),
		"[[replacements]]\nkey = \"greeting\"\nvalue = \"text('hello')\"\n",
	);
	write_file(&root.join("doc.md"), "<!-- expand: greeting -->stale<!---->\n");

	let ctx = scan_project_with_config(root)?;
	let check = check_project(&ctx, ProcessScope::All)?;

	assert!(!check.is_ok());
	assert_eq!(check.stale.len(), 1);
	assert_eq!(
		check.stale[0].expected_content,
		"<!-- expand: greeting -->hello<!---->\n"
	);
	assert_eq!(check.stale[0].replacements_count, 1);

	Ok(())
}

#[test]
fn scan_documents_respects_ignores() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(&root.join(".gitignore"), "ignored.md\n");
	write_file(&root.join("kept.md"), "");
	write_file(&root.join("ignored.md"), "");
	write_file(&root.join("drafts/draft.md"), "");
	write_file(&root.join(".hidden/secret.md"), "");
	write_file(&root.join("node_modules/pkg/readme.md"), "");
	write_file(&root.join("notes.txt"), "");
	write_file(&root.join("nested/expander.toml"), "");
	write_file(&root.join("nested/inner.md"), "");

	let options = ScanOptions {
		exclude_patterns: vec!["drafts/".into()],
		..ScanOptions::default()
	};
	let names: Vec<String> = scan_documents(root, &options)?
		.into_iter()
		.map(|document| document.context.path)
		.collect();

	assert_eq!(names, vec!["kept.md"]);

	Ok(())
}

#[test]
fn scan_documents_include_patterns_add_files() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(
		&root.join("expander.toml"),
		"disable_gitignore = true\n\n[include]\npatterns = [\"*.txt\"]\n",
	);
	write_file(&root.join("a.md"), "");
	write_file(&root.join("b.txt"), "");
	write_file(&root.join("c.rs"), "");

	let ctx = scan_project_with_config(root)?;
	let names: Vec<&str> = ctx
		.documents
		.iter()
		.map(|document| document.context.path.as_str())
		.collect();

	assert_eq!(names, vec!["a.md", "b.txt"]);

	Ok(())
}

#[test]
fn scan_documents_included_files_share_ignore_rules() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(&root.join(".gitignore"), "generated.txt\n");
	write_file(
		&root.join("expander.toml"),
		"[include]\npatterns = [\"**/*.txt\", \"*.md\"]\n\n[exclude]\npatterns = [\"vendor/\"]\n",
	);
	write_file(&root.join("readme.md"), "");
	write_file(&root.join("notes.txt"), "");
	write_file(&root.join("generated.txt"), "");
	write_file(&root.join("docs/deep/todo.txt"), "");
	write_file(&root.join("vendor/lib.txt"), "");

	let ctx = scan_project_with_config(root)?;
	let names: Vec<&str> = ctx
		.documents
		.iter()
		.map(|document| document.context.path.as_str())
		.collect();

	assert_eq!(names, vec!["docs/deep/todo.txt", "notes.txt", "readme.md"]);

	Ok(())
}

#[test]
fn scan_documents_rejects_large_files() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	write_file(&tmp.path().join("big.md"), "0123456789abcdef");

	let options = ScanOptions {
		max_file_size: 8,
		..ScanOptions::default()
	};
	let result = scan_documents(tmp.path(), &options);

	assert!(matches!(
		result,
		Err(ExpanderError::FileTooLarge {
			size: 16,
			limit: 8,
			..
		})
	));

	Ok(())
}

#[test]
fn context_from_path_reads_metadata() -> ExpanderResult<()> {
	let tmp = tempfile::tempdir()?;
	let file = tmp.path().join("log/today.md");
	write_file(&file, "x");

	let context = EvaluationContext::from_path(tmp.path(), &file)?;

	assert_eq!(context.path, "log/today.md");
	assert_eq!(context.folder, "log");
	assert!(context.modified.is_some());
	assert_eq!(
		evaluate("file.mtime.isEmpty()", Some(&context)),
		"false"
	);

	Ok(())
}
