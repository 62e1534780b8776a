//! Condition evaluation for `if` and `switch` blocks.

use flowline_types::{Combinator, Condition, ConditionGroup, Operator};
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::resolver::{resolve_template_value, value_to_string};

/// Label of the fallback switch edge.
pub const DEFAULT_CASE: &str = "default";

/// Evaluate one comparison: the resolved `variable` against the literal `value`.
pub fn evaluate_condition(condition: &Condition, ctx: &RunContext) -> Result<bool> {
    let left = resolve_template_value(&condition.variable, ctx)?;
    Ok(compare(&left, condition.operator, &condition.value))
}

/// Combine a group's conditions with AND (all) or OR (any).
///
/// An empty AND group is true, an empty OR group is false.
pub fn evaluate_group(group: &ConditionGroup, ctx: &RunContext) -> Result<bool> {
    match group.combinator {
        Combinator::And => {
            for condition in &group.conditions {
                if !evaluate_condition(condition, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Combinator::Or => {
            for condition in &group.conditions {
                if evaluate_condition(condition, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Outcome of an `if` block, which must carry exactly one group.
pub fn evaluate_if(groups: &[ConditionGroup], ctx: &RunContext) -> Result<bool> {
    match groups {
        [group] => evaluate_group(group, ctx),
        _ => Err(EngineError::Definition(format!(
            "if block requires exactly one condition group, found {}",
            groups.len()
        ))),
    }
}

/// Select a switch case: the first true group in index order wins.
///
/// The label is the group's declared case, or `case{index+1}`;
/// `default` when no group matches.
pub fn select_case(groups: &[ConditionGroup], ctx: &RunContext) -> Result<String> {
    let mut ordered: Vec<&ConditionGroup> = groups.iter().collect();
    ordered.sort_by_key(|g| g.index);

    for group in ordered {
        if evaluate_group(group, ctx)? {
            return Ok(case_label(group));
        }
    }
    Ok(DEFAULT_CASE.to_string())
}

/// Edge label a switch group selects.
pub fn case_label(group: &ConditionGroup) -> String {
    match group.case.as_deref() {
        Some(case) if !case.is_empty() => case.to_string(),
        _ => format!("case{}", group.index + 1),
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn compare(left: &Value, operator: Operator, right: &Value) -> bool {
    match operator {
        Operator::Equals => equals(left, right),
        Operator::NotEquals => !equals(left, right),
        Operator::GreaterThan => numeric(left, right, |a, b| a > b),
        Operator::GreaterThanOrEqual => numeric(left, right, |a, b| a >= b),
        Operator::LessThan => numeric(left, right, |a, b| a < b),
        Operator::LessThanOrEqual => numeric(left, right, |a, b| a <= b),
        Operator::Contains => contains(left, right),
        Operator::NotContains => !contains(left, right),
        Operator::StartsWith => value_to_string(left).starts_with(&value_to_string(right)),
        Operator::EndsWith => value_to_string(left).ends_with(&value_to_string(right)),
        Operator::IsEmpty => is_empty(left),
        Operator::IsNotEmpty => !is_empty(left),
    }
}

/// Numeric coercion: numbers, and strings that parse as numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { s.parse().ok() }
        }
        _ => None,
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a == b,
        _ => value_to_string(left) == value_to_string(right),
    }
}

fn numeric(left: &Value, right: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    let needle = value_to_string(right);
    match left {
        Value::Array(items) => items.iter().any(|item| value_to_string(item) == needle),
        other => value_to_string(other).contains(&needle),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_types::Session;
    use serde_json::{Map, json};

    fn ctx() -> RunContext {
        let mut ctx = RunContext::new(
            json!({"amount": "12.5", "email": "ada@example.com", "tags": ["vip", "eu"], "blank": "  "}),
            &Session::default(),
            Map::new(),
            Map::new(),
        );
        ctx.insert_block("x", json!(5), None);
        ctx
    }

    fn cond(variable: &str, operator: Operator, value: Value) -> Condition {
        Condition {
            variable: variable.to_string(),
            operator,
            value,
        }
    }

    fn group(index: u32, combinator: Combinator, conditions: Vec<Condition>) -> ConditionGroup {
        ConditionGroup {
            index,
            combinator,
            case: None,
            conditions,
        }
    }

    #[test]
    fn test_equals_numeric_and_string() {
        let ctx = ctx();
        assert!(evaluate_condition(&cond("{{x}}", Operator::Equals, json!(5)), &ctx).unwrap());
        assert!(evaluate_condition(&cond("{{x}}", Operator::Equals, json!("5.0")), &ctx).unwrap());
        assert!(
            evaluate_condition(
                &cond("{{$params.email}}", Operator::Equals, json!("ada@example.com")),
                &ctx
            )
            .unwrap()
        );
        assert!(evaluate_condition(&cond("{{x}}", Operator::NotEquals, json!(6)), &ctx).unwrap());
    }

    #[test]
    fn test_ordering_coerces_numbers() {
        let ctx = ctx();
        let gt = cond("{{$params.amount}}", Operator::GreaterThan, json!(10));
        assert!(evaluate_condition(&gt, &ctx).unwrap());
        let lte = cond("{{$params.amount}}", Operator::LessThanOrEqual, json!("12.5"));
        assert!(evaluate_condition(&lte, &ctx).unwrap());
        let nan = cond("{{$params.email}}", Operator::GreaterThan, json!(1));
        assert!(!evaluate_condition(&nan, &ctx).unwrap());
        let nan = cond("{{$params.email}}", Operator::LessThan, json!(1));
        assert!(!evaluate_condition(&nan, &ctx).unwrap());
    }

    #[test]
    fn test_string_operators() {
        let ctx = ctx();
        let email = "{{$params.email}}";
        assert!(evaluate_condition(&cond(email, Operator::Contains, json!("@")), &ctx).unwrap());
        assert!(evaluate_condition(&cond(email, Operator::NotContains, json!("#")), &ctx).unwrap());
        assert!(evaluate_condition(&cond(email, Operator::StartsWith, json!("ada")), &ctx).unwrap());
        assert!(evaluate_condition(&cond(email, Operator::EndsWith, json!(".com")), &ctx).unwrap());
    }

    #[test]
    fn test_contains_array_membership() {
        let ctx = ctx();
        let tags = "{{$params.tags}}";
        assert!(evaluate_condition(&cond(tags, Operator::Contains, json!("vip")), &ctx).unwrap());
        assert!(!evaluate_condition(&cond(tags, Operator::Contains, json!("v")), &ctx).unwrap());
    }

    #[test]
    fn test_emptiness() {
        let ctx = ctx();
        assert!(
            evaluate_condition(&cond("{{$params.blank}}", Operator::IsEmpty, Value::Null), &ctx)
                .unwrap()
        );
        assert!(
            evaluate_condition(&cond("{{$params.tags}}", Operator::IsNotEmpty, Value::Null), &ctx)
                .unwrap()
        );
        assert!(is_empty(&json!({})));
        assert!(is_empty(&json!([])));
        assert!(!is_empty(&json!(0)));
    }

    #[test]
    fn test_unresolvable_variable_fails() {
        let ctx = ctx();
        let err = evaluate_condition(&cond("{{nope}}", Operator::IsEmpty, Value::Null), &ctx)
            .unwrap_err();
        assert!(matches!(err, EngineError::Template(_)));
    }

    #[test]
    fn test_group_combinators() {
        let ctx = ctx();
        let t = cond("{{x}}", Operator::Equals, json!(5));
        let f = cond("{{x}}", Operator::Equals, json!(6));

        assert!(!evaluate_group(&group(0, Combinator::And, vec![t.clone(), f.clone()]), &ctx).unwrap());
        assert!(evaluate_group(&group(0, Combinator::Or, vec![f.clone(), t.clone()]), &ctx).unwrap());
        assert!(evaluate_group(&group(0, Combinator::And, vec![]), &ctx).unwrap());
        assert!(!evaluate_group(&group(0, Combinator::Or, vec![]), &ctx).unwrap());
    }

    #[test]
    fn test_if_requires_one_group() {
        let ctx = ctx();
        let err = evaluate_if(&[], &ctx).unwrap_err();
        assert!(matches!(err, EngineError::Definition(_)));

        let t = cond("{{x}}", Operator::Equals, json!(5));
        assert!(evaluate_if(&[group(0, Combinator::And, vec![t])], &ctx).unwrap());
    }

    #[test]
    fn test_switch_first_true_group_wins() {
        let ctx = ctx();
        let f = cond("{{x}}", Operator::GreaterThan, json!(10));
        let t = cond("{{x}}", Operator::GreaterThan, json!(1));

        let mut labeled = group(2, Combinator::And, vec![t.clone()]);
        labeled.case = Some("big".into());
        let groups = vec![
            labeled,
            group(1, Combinator::And, vec![t.clone()]),
            group(0, Combinator::And, vec![f.clone()]),
        ];
        assert_eq!(select_case(&groups, &ctx).unwrap(), "case2");

        let none = vec![group(0, Combinator::And, vec![f])];
        assert_eq!(select_case(&none, &ctx).unwrap(), DEFAULT_CASE);
    }

    #[test]
    fn test_case_label() {
        let mut g = group(0, Combinator::And, vec![]);
        assert_eq!(case_label(&g), "case1");
        g.case = Some("vip".into());
        assert_eq!(case_label(&g), "vip");
    }
}
