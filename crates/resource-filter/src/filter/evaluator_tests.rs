//! Tests for filter evaluation.

use super::*;
use crate::projection::ProjectionEnv;
use crate::transform::TransformError;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde_json::json;

// ==================== Test Helpers ====================

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2016-11-11T12:34:56.789-04:00")
        .unwrap()
        .with_timezone(&Utc)
}

fn env() -> ProjectionEnv {
    ProjectionEnv::builder()
        .parent(ProjectionEnv::builtin())
        .alias("i", "integer")
        .unwrap()
        .fixed_clock(now())
        .build()
}

/// Evaluates `filter` against `resource`, returning the result and any warning.
fn eval(filter: &str, resource: &serde_json::Value) -> (bool, Option<Deprecation>) {
    let compiled = Filter::compile(filter, &env())
        .unwrap_or_else(|e| panic!("{filter:?} failed to compile: {e}"));
    let mut warnings: Vec<Deprecation> = Vec::new();
    let matched = compiled
        .evaluate(&Value::from(resource.clone()), &mut warnings)
        .unwrap_or_else(|e| panic!("{filter:?} failed to evaluate: {e}"));
    assert!(warnings.len() <= 1, "{filter:?} raised {} warnings", warnings.len());
    (matched, warnings.pop())
}

fn matches(filter: &str, resource: &serde_json::Value) -> bool {
    let (matched, warning) = eval(filter, resource);
    assert!(warning.is_none(), "{filter:?} raised {warning:?}");
    matched
}

fn matches_deprecated(filter: &str, resource: &serde_json::Value) -> bool {
    let (matched, warning) = eval(filter, resource);
    assert!(warning.is_some(), "{filter:?} should raise a deprecation");
    matched
}

// ==================== Empty Filter Tests ====================

#[test]
fn test_empty_filter_matches_everything() {
    assert!(matches("", &json!({})));
    assert!(matches("  ", &json!(null)));
    assert!(matches("", &json!([1, 2])));
}

// ==================== Has Operator Tests ====================

#[test]
fn test_has_substring_is_deprecated() {
    let r = json!({"subject": "abcpdqxyz"});
    assert!(matches_deprecated("subject:pdq", &r));
    assert!(matches_deprecated("subject:*xyz", &r));
    assert!(matches_deprecated("subject:abc*xyz", &r));
}

#[test]
fn test_has_word_match() {
    let r = json!({"subject": "abc pdq xyz"});
    assert!(matches("subject:pdq", &r));
    assert!(matches("subject:PDQ", &r));
    assert!(!matches("subject:pdqx", &r));
}

#[test]
fn test_has_prefix_glob() {
    let r = json!({"subject": "abcpdqxyz"});
    assert!(matches("subject:abc*", &r));
    assert!(matches("subject:ABC*", &r));
    assert!(!matches("subject:*abc", &r));
    assert!(matches("subject:ABCPDQXYZ", &r));
}

#[test]
fn test_has_any() {
    assert!(matches("subject:*", &json!({"subject": "x"})));
    assert!(!matches("subject:*", &json!({"subject": ""})));
    assert!(!matches("subject:*", &json!({"subject": null})));
    assert!(!matches("subject:*", &json!({})));
    assert!(matches("integer:*", &json!({"integer": 0})));
}

#[test]
fn test_has_numbers() {
    let r = json!({"integer": 2, "floating": 3.14});
    assert!(matches("integer:2", &r));
    assert!(!matches("integer:3", &r));
    assert!(!matches("integer:-1", &r));
    assert!(matches("floating:3.14", &r));
    assert!(matches("i:2", &r));
}

#[test]
fn test_has_lists_and_maps() {
    let r = json!({
        "tags": ["abc", "Def"],
        "labels": {"env": "prod"},
        "dictionary": {"1": "abc", "2": "Def"},
    });
    assert!(matches("tags:def", &r));
    assert!(!matches("tags:ghi", &r));
    assert!(matches("labels:env", &r));
    assert!(matches("labels:prod", &r));
    assert!(matches("dictionary:2", &r));
    assert!(!matches("dictionary:3", &r));
}

#[test]
fn test_has_booleans() {
    let r = json!({"flag": true});
    assert!(matches("flag:true", &r));
    assert!(matches("flag:1", &r));
    assert!(!matches("flag:false", &r));
}

// ==================== Equality Tests ====================

#[test]
fn test_equal_whole_value() {
    let r = json!({"name": "compound string"});
    assert!(matches("name=\"Compound String\"", &r));
    assert!(!matches("name=str", &r));
}

#[test]
fn test_equal_word_is_deprecated() {
    let r = json!({"name": "compound string"});
    assert!(matches_deprecated("name=string", &r));
}

#[test]
fn test_equal_numbers() {
    let r = json!({"integer": 2, "floating": 3.14, "text": "3.0"});
    assert!(matches("integer=2", &r));
    assert!(matches("integer=2.0", &r));
    assert!(!matches("integer=3", &r));
    assert!(matches("text=3", &r));
    assert!(matches("floating=3.14", &r));
}

#[test]
fn test_equal_number_word_mismatch_is_deprecated() {
    let r = json!({"floating": 3.14});
    assert!(!matches_deprecated("floating=3", &r));
}

#[test]
fn test_equal_booleans_and_null() {
    let r = json!({"flag": false, "none": null});
    assert!(matches("flag=false", &r));
    assert!(matches("flag=0", &r));
    assert!(!matches("flag=true", &r));
    assert!(matches("none=null", &r));
    assert!(!matches("none=\"null\"", &r));
    assert!(!matches("none!=null", &r));
}

#[test]
fn test_not_equal() {
    let r = json!({"a": "b"});
    assert!(!matches("a!=b", &r));
    assert!(matches("a!=c", &r));
    assert!(matches("missing!=c", &r));
}

// ==================== Set Operand Tests ====================

#[test]
fn test_set_operand_any_member() {
    let r = json!({"logical": "abc or xyz"});
    assert!(matches("logical:(abc OR XYZ)", &r));
    assert!(matches("logical:(nope, xyz)", &r));
    assert!(!matches("logical:(nope other)", &r));
}

#[test]
fn test_set_operand_with_deprecated_member() {
    let r = json!({"logical": "abc or xyz"});
    assert!(!matches_deprecated("logical:(aaa OR X*)", &r));
}

#[test]
fn test_set_operand_over_list() {
    let r = json!({"tags": ["a", "b"]});
    assert!(matches("tags:(x, B)", &r));
    assert!(matches("tags=(b)", &r));
    assert!(!matches("tags!=(a, z)", &r));
}

// ==================== Ordering Tests ====================

#[test]
fn test_ordering_numbers() {
    let r = json!({"integer": 2});
    assert!(matches("integer<3", &r));
    assert!(!matches("integer<2", &r));
    assert!(matches("integer<=2", &r));
    assert!(matches("integer>=2", &r));
    assert!(matches("integer>-1", &r));
    assert!(!matches("integer>2", &r));
}

#[test]
fn test_ordering_strings() {
    let r = json!({"name": "abc", "version": "10"});
    assert!(matches("name<abd", &r));
    assert!(!matches("name>abd", &r));
    assert!(matches("version>9", &r));
}

#[test]
fn test_ordering_type_mismatch_is_false() {
    let r = json!({"name": "abc", "integer": 2, "flag": true, "map": {"a": 1}});
    assert!(!matches("name>5", &r));
    assert!(!matches("name<5", &r));
    assert!(!matches("integer<abc", &r));
    assert!(!matches("flag>0", &r));
    assert!(!matches("map>0", &r));
    assert!(!matches("missing>0", &r));
}

#[test]
fn test_ordering_timestamps() {
    let r = json!({"timestamp": "2016-08-11T12:34:56.789-04:00"});
    assert!(matches("timestamp<-p1m", &r));
    assert!(!matches("timestamp<-p1y", &r));
    assert!(matches("timestamp>-p1y", &r));
    assert!(matches("timestamp>\"January 2016\" timestamp<2016-09-01", &r));
    assert!(matches("timestamp<2016-08-11T16:35:00Z", &r));
    assert!(!matches("timestamp<2016-08-11T16:34:00Z", &r));
}

#[test]
fn test_ordering_list_any_item() {
    let r = json!({"sizes": [1, 20, 3]});
    assert!(matches("sizes>10", &r));
    assert!(!matches("sizes>50", &r));
}

// ==================== Regex Tests ====================

#[test]
fn test_regex_match() {
    let r = json!({"subject": "abcpdqxyz", "integer": 2, "labels": {"env": "prod"}});
    assert!(matches("subject~pdq", &r));
    assert!(!matches("subject~^pdq", &r));
    assert!(matches("subject~^abc.*xyz$", &r));
    assert!(matches("integer~^2$", &r));
    assert!(matches("labels~^en", &r));
    assert!(matches("labels~rod$", &r));
}

#[test]
fn test_regex_not_match() {
    let r = json!({"subject": "abcpdqxyz"});
    assert!(!matches("subject!~pdq", &r));
    assert!(matches("subject!~^pdq", &r));
    assert!(matches("missing!~x", &r));
    assert!(!matches("missing~.", &r));
}

// ==================== Negation Tests ====================

#[test]
fn test_negation_forms_agree() {
    let r = json!({"integer": 2});
    for (filter, expected) in [
        ("-integer:2", false),
        ("NOT integer:2", false),
        ("integer!=2", false),
        ("-integer:3", true),
        ("NOT integer:3", true),
        ("integer!=3", true),
    ] {
        assert_eq!(matches(filter, &r), expected, "{filter}");
    }
}

#[test]
fn test_negated_deprecated_predicate_still_warns() {
    let r = json!({"subject": "abcpdqxyz"});
    assert!(!matches_deprecated("-subject:pdq", &r));
}

// ==================== Boolean Operator Tests ====================

#[test]
fn test_or_and_adjacency() {
    let r = json!({"integer": 2, "floating": 3.14});
    assert!(matches("integer=2 OR floating=3.14", &r));
    assert!(matches("integer=2 floating=3.14", &r));
    assert!(!matches(
        "integer=2 AND floating=3",
        &json!({"integer": 2, "floating": 2.5})
    ));
    assert!(matches("integer:0 integer:0 OR integer:2", &r));
    assert!(!matches("(integer:0 OR integer:2) integer:0", &r));
}

// ==================== Global Term Tests ====================

#[test]
fn test_global_term_searches_strings() {
    let r = json!({"subject": "abcpdqxyz", "nested": {"list": ["Needle"]}, "integer": 2});
    assert!(matches("pdq", &r));
    assert!(matches("needle", &r));
    assert!(!matches("xyzzy", &r));
    assert!(!matches("2", &r));
    assert!(matches("-xyzzy", &r));
}

#[test]
fn test_global_any() {
    assert!(matches(".", &json!({})));
    assert!(matches(".", &json!(0)));
    assert!(!matches(".", &json!(null)));
}

#[test]
fn test_global_call_truthiness() {
    let r = json!({"lower": "string", "none": null, "empty": []});
    assert!(matches("len(lower)", &r));
    assert!(matches("len(junk)", &r));
    assert!(!matches("len(none)", &r));
    assert!(!matches("len(empty)", &r));
    assert!(matches("-len(empty)", &r));
}

// ==================== Transform Tests ====================

#[test]
fn test_method_and_function_forms() {
    let r = json!({"lower": "string", "networkInterfaces": [{}, {}, {}]});
    assert!(matches("lower.len()=6", &r));
    assert!(matches("len(lower)=6", &r));
    assert!(matches("len(junk)=4", &r));
    assert!(matches("networkInterfaces.len()>2", &r));
}

#[test]
fn test_date_transform() {
    let r = json!({"timestamp": "2016-08-11T12:34:56.789-04:00"});
    assert!(matches("timestamp.date(%Y-%m-%d)=2016-08-11", &r));
    assert!(matches("timestamp.date(%H:%M, UTC)=16:34", &r));
}

#[test]
fn test_transform_error_is_reported() {
    let filter = Filter::compile("integer.error()=0", &env()).unwrap();
    let err = filter
        .evaluate(&Value::from(json!({"integer": 2})), &mut IgnoreWarnings)
        .unwrap_err();
    assert_eq!(err.kind(), FilterErrorKind::Transform);
    assert!(matches!(
        err,
        FilterError::Transform { ref key, ref name, .. } if key == "integer.error()" && name == "error"
    ));
}

#[test]
fn test_transform_error_short_circuited() {
    let r = json!({"integer": 2});
    assert!(matches("integer:2 OR integer.error()=0", &r));
    assert!(!matches("integer:3 integer.error()=0", &r));
}

#[test]
fn test_custom_transform() {
    let env = ProjectionEnv::builder()
        .parent(env())
        .transform("double", |value: &Value, _args: &[Value]| {
            value
                .as_f64()
                .map(|n| Value::Float(n * 2.0))
                .ok_or_else(|| TransformError::new("not a number"))
        })
        .build();
    let filter = Filter::compile("integer.double()=4", &env).unwrap();
    assert!(filter
        .evaluate(&Value::from(json!({"integer": 2})), &mut IgnoreWarnings)
        .unwrap());
}

#[test]
fn test_unresolved_transform_from_expr() {
    let custom = ProjectionEnv::builder()
        .parent(env())
        .transform("upper", |value: &Value, _args: &[Value]| {
            Ok::<_, TransformError>(Value::from(value.to_string().to_uppercase()))
        })
        .build();
    let expr = FilterParser::parse("name.upper()=ABC", &custom)
        .unwrap()
        .unwrap();

    let filter = Filter::from_expr(expr, &env());
    let err = filter
        .evaluate(&Value::from(json!({"name": "abc"})), &mut IgnoreWarnings)
        .unwrap_err();
    assert_eq!(
        err,
        FilterError::UnresolvedTransform {
            name: "upper".to_string()
        }
    );
    assert_eq!(err.kind(), FilterErrorKind::Resolution);
}

// ==================== Warning Tests ====================

#[test]
fn test_at_most_one_warning_per_evaluation() {
    let r = json!({"subject": "abcpdqxyz"});
    let (matched, warning) = eval("subject:pdq subject:dq", &r);
    assert!(matched);
    let warning = warning.unwrap();
    assert_eq!(warning.expression, "subject:pdq");
    assert_eq!(warning.operator, Operator::Has);
}

#[test]
fn test_evaluation_is_idempotent() {
    let filter = Filter::compile("subject:pdq", &env()).unwrap();
    let resource = Value::from(json!({"subject": "abcpdqxyz"}));
    let mut warnings: Vec<Deprecation> = Vec::new();

    assert!(filter.evaluate(&resource, &mut warnings).unwrap());
    assert!(filter.evaluate(&resource, &mut warnings).unwrap());
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0], warnings[1]);
}

#[test]
fn test_filter_values() {
    let filter = Filter::compile("networkInterfaces.len() > 2", &env()).unwrap();
    let resources: Vec<Value> = vec![
        json!({"networkInterfaces": [{"name": "nic0"}, {"name": "nic1"}, {"name": "nic2"}]}).into(),
        json!({"networkInterfaces": [{"name": "nic0"}, {"name": "nic1"}]}).into(),
    ];
    let selected = filter
        .filter_values(&resources, &mut IgnoreWarnings)
        .unwrap();
    assert_eq!(selected, vec![&resources[0]]);
}

// ==================== Evaluator Tests ====================

#[test]
fn test_evaluator_direct() {
    let env = env();
    let expr = FilterParser::parse("subject:pdq OR integer:2", &env)
        .unwrap()
        .unwrap();
    let resource = Value::from(json!({"subject": "abcpdqxyz", "integer": 2}));

    let mut evaluator = FilterEvaluator::new(&env);
    assert!(evaluator.evaluate(&expr, &resource).unwrap());
    assert!(evaluator.into_deprecation().is_some());
}
