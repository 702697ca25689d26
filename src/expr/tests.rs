use std::collections::BTreeMap;

use super::*;
use crate::value::Value;

fn context() -> EvaluationContext {
    let mut overrides = BTreeMap::new();
    overrides.insert("RUN".to_string(), "7".to_string());
    EvaluationContext::new(overrides)
}

fn eval_str(source: &str, ctx: &EvaluationContext) -> Result<Value, ExprError> {
    let expr = parse_expression(source)?;
    evaluate(&expr, ctx, &Bindings::empty())
}

fn row(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn arithmetic_respects_precedence() {
    let ctx = context();
    assert_eq!(eval_str("1 + 2 * 3", &ctx), Ok(Value::Number(7.0)));
    assert_eq!(eval_str("(1 + 2) * 3", &ctx), Ok(Value::Number(9.0)));
    assert_eq!(eval_str("-2 ** 2", &ctx), Ok(Value::Number(-4.0)));
    assert_eq!(eval_str("2 ** 3 ** 2", &ctx), Ok(Value::Number(512.0)));
    assert_eq!(eval_str("10 / 4", &ctx), Ok(Value::Number(2.5)));
    assert_eq!(eval_str("1 / 0", &ctx), Ok(Value::Null));
}

#[test]
fn comparisons_and_logic() {
    let ctx = context();
    assert_eq!(eval_str("3 > 2 && 'a' < 'b'", &ctx), Ok(Value::Bool(true)));
    assert_eq!(eval_str("'10' == 10", &ctx), Ok(Value::Bool(true)));
    assert_eq!(eval_str("!(1 == 1) || false", &ctx), Ok(Value::Bool(false)));
}

#[test]
fn text_concatenates_with_plus() {
    let ctx = context();
    assert_eq!(eval_str("'run-' + 3", &ctx), Ok(Value::text("run-3")));
    assert_eq!(eval_str("'4' + 3", &ctx), Ok(Value::Number(7.0)));
}

#[test]
fn builtins_cover_math_and_strings() {
    let ctx = context();
    assert_eq!(eval_str("max(1, 9, 4)", &ctx), Ok(Value::Number(9.0)));
    assert_eq!(eval_str("round(2.346, 2)", &ctx), Ok(Value::Number(2.35)));
    assert_eq!(eval_str("log2(8)", &ctx), Ok(Value::Number(3.0)));
    assert_eq!(eval_str("upper('ior')", &ctx), Ok(Value::text("IOR")));
    assert_eq!(eval_str("if(1 > 2, 'a', 'b')", &ctx), Ok(Value::text("b")));
    assert_eq!(
        eval_str("format('%5.1f|%-3d|%s', 3.14159, 7, 'x')", &ctx),
        Ok(Value::text("  3.1|7  |x"))
    );
}

#[test]
fn format_template_handles_exponent_and_padding() {
    let rendered = format_template("%e %05d %%", &[Value::Number(1500.0), Value::Number(42.0)])
        .expect("template should format");
    assert_eq!(rendered, "1.500000e+03 00042 %");
    assert!(format_template("%d", &[]).is_err());
}

#[test]
fn environment_lookup_prefers_overrides_then_defaults() {
    let mut ctx = context();
    ctx.set_default_env("RUN", "1");
    ctx.set_default_env("HOST", "node01");
    assert_eq!(ctx.env("RUN"), Some("7"));
    assert_eq!(ctx.env("HOST"), Some("node01"));
    assert_eq!(eval_str("%RUN * 2", &ctx), Ok(Value::Number(14.0)));
    assert_eq!(eval_str("%{HOST}", &ctx), Ok(Value::text("node01")));
    assert_eq!(
        eval_str("%MISSING", &ctx),
        Err(ExprError::UnknownVariable("MISSING".to_string()))
    );
}

#[test]
fn calculated_variables_are_reevaluated_against_environment() {
    let mut ctx = EvaluationContext::new(BTreeMap::new());
    ctx.set_default_env("SIZE", "4");
    ctx.define_calculated("DOUBLE", "%SIZE * 2")
        .expect("calculated variable should parse");
    assert_eq!(eval_str("@DOUBLE + 1", &ctx), Ok(Value::Number(9.0)));

    ctx.set_default_env("SIZE", "10");
    assert_eq!(eval_str("@{DOUBLE}", &ctx), Ok(Value::Number(20.0)));
}

#[test]
fn calculated_variables_may_not_chain() {
    let mut ctx = context();
    ctx.define_calculated("A", "1").expect("plain calc should parse");
    let err = ctx
        .define_calculated("B", "@A + 1")
        .expect_err("chained calc should be rejected");
    assert!(matches!(err, ExprError::NotAllowed(_)));
    assert!(ctx.define_calculated("C", "$NODES").is_err());
}

#[test]
fn named_functions_call_each_other() {
    let mut ctx = context();
    ctx.define_function("square", vec!["x".to_string()], "x * x")
        .expect("square should parse");
    ctx.define_function(
        "norm",
        vec!["a".to_string(), "b".to_string()],
        "sqrt(&square(a) + &square(b))",
    )
    .expect("norm should parse");

    let values = row(&[("A", Value::Number(3.0)), ("B", Value::text("4"))]);
    let expr = parse_expression("&norm($A, ${b})").expect("call should parse");
    let value = evaluate(&expr, &ctx, &Bindings::for_row(&values)).expect("call should evaluate");
    assert_eq!(value, Value::Number(5.0));
}

#[test]
fn named_functions_are_rejected_outside_formulas() {
    let mut ctx = context();
    ctx.define_function("one", Vec::new(), "1")
        .expect("constant function should parse");
    let err = eval_str("&one()", &ctx).expect_err("functions need formula bindings");
    assert!(matches!(err, ExprError::NotAllowed(_)));

    let values = row(&[]);
    let expr = parse_expression("&one(2)").expect("call should parse");
    let err = evaluate(&expr, &ctx, &Bindings::for_row(&values)).expect_err("arity mismatch");
    assert!(matches!(err, ExprError::Arity { expected: 0, found: 1, .. }));

    let expr = parse_expression("&one()").expect("call should parse");
    let bindings = Bindings::for_row(&values).allow_functions(false);
    let err = evaluate(&expr, &ctx, &bindings).expect_err("calls disabled");
    assert!(matches!(err, ExprError::NotAllowed(_)));
}

#[test]
fn recursive_functions_hit_depth_limit() {
    let mut ctx = context();
    ctx.define_function("loop", vec!["n".to_string()], "&loop(n + 1)")
        .expect("recursive function should parse");
    let values = row(&[]);
    let expr = parse_expression("&loop(0)").expect("call should parse");
    let err = evaluate(&expr, &ctx, &Bindings::for_row(&values)).expect_err("should not recurse");
    assert_eq!(err, ExprError::DepthExceeded(MAX_CALL_DEPTH));
}

#[test]
fn unknown_parameter_is_rejected_at_definition() {
    let mut ctx = context();
    let err = ctx
        .define_function("bad", vec!["x".to_string()], "x + y")
        .expect_err("y is not a parameter");
    assert_eq!(err, ExprError::UnknownIdentifier("y".to_string()));
}

#[test]
fn formula_applies_template_to_trailing_values() {
    let ctx = context();
    let values = row(&[("NODES", Value::Number(4.0)), ("OPERATION", Value::text("read"))]);
    let bindings = Bindings::for_row(&values);

    let label = Formula::parse("\"%s on %d nodes\", $OPERATION, $NODES")
        .expect("label formula should parse");
    assert_eq!(label.evaluate(&ctx, &bindings), Ok(Value::text("read on 4 nodes")));
    assert_eq!(label.columns(), vec!["OPERATION".to_string(), "NODES".to_string()]);

    let single = Formula::parse("$NODES * 2").expect("single formula should parse");
    assert_eq!(single.evaluate(&ctx, &bindings), Ok(Value::Number(8.0)));

    let joined = Formula::parse("$OPERATION, $NODES").expect("joined formula should parse");
    assert_eq!(joined.evaluate(&ctx, &bindings), Ok(Value::text("read 4")));
}

#[test]
fn column_lookup_is_canonical() {
    let ctx = context();
    let values = row(&[("READ_BW", Value::Number(1.0))]);
    let expr = parse_expression("${read-bw}").expect("braced column should parse");
    assert_eq!(
        evaluate(&expr, &ctx, &Bindings::for_row(&values)),
        Ok(Value::Number(1.0))
    );
}

#[test]
fn sql_scan_leaves_quoted_literals_alone() {
    let segments = scan_sql_references("$OP LIKE '%read%' AND $N > %MIN OR $T = 'it''s $X'");
    assert_eq!(
        segments,
        vec![
            Segment::Reference { sigil: Sigil::Column, name: "OP".to_string() },
            Segment::Literal(" LIKE '%read%' AND ".to_string()),
            Segment::Reference { sigil: Sigil::Column, name: "N".to_string() },
            Segment::Literal(" > ".to_string()),
            Segment::Reference { sigil: Sigil::Env, name: "MIN".to_string() },
            Segment::Literal(" OR ".to_string()),
            Segment::Reference { sigil: Sigil::Column, name: "T".to_string() },
            Segment::Literal(" = 'it''s $X'".to_string()),
        ]
    );
}

#[test]
fn scan_references_recognizes_all_sigils() {
    let segments = scan_references("a $X %{Y} @Z &f \\$lit 50%");
    assert_eq!(
        segments,
        vec![
            Segment::Literal("a ".to_string()),
            Segment::Reference { sigil: Sigil::Column, name: "X".to_string() },
            Segment::Literal(" ".to_string()),
            Segment::Reference { sigil: Sigil::Env, name: "Y".to_string() },
            Segment::Literal(" ".to_string()),
            Segment::Reference { sigil: Sigil::Calc, name: "Z".to_string() },
            Segment::Literal(" ".to_string()),
            Segment::Reference { sigil: Sigil::Func, name: "f".to_string() },
            Segment::Literal(" $lit 50%".to_string()),
        ]
    );
}

#[test]
fn substitute_text_expands_environment_and_calculated() {
    let mut ctx = context();
    ctx.define_calculated("TWICE", "%RUN * 2").expect("calc should parse");
    assert_eq!(
        substitute_text("run %RUN (x@TWICE)", &ctx),
        Ok("run 7 (x14)".to_string())
    );
    assert!(substitute_text("value $X", &ctx).is_err());
}
