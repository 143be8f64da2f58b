//! Built-in comparators registered on the bundled predicate engine.
//!
//! Each comparator receives the entity fact (never `null`, the engine filters those) and
//! the condition threshold.

use super::engine::{Comparator, ComparatorError};
use crate::methodology::domain::CriterionValue;
use crate::methodology::operators::Operator;
use serde_json::Value;
use std::sync::Arc;

/// Engine names paired with their comparator. `within` has no built-in entry; it is
/// registered per option at run time.
pub(crate) fn builtin() -> Vec<(&'static str, Comparator)> {
    vec![
        entry(Operator::Less, Arc::new(less_than_inclusive)),
        entry(Operator::More, Arc::new(greater_than_inclusive)),
        entry(Operator::Equal, Arc::new(equal)),
        entry(Operator::Between, Arc::new(between)),
        entry(Operator::Above, Arc::new(above)),
        entry(Operator::Max, Arc::new(at_most)),
    ]
}

fn entry(operator: Operator, comparator: Comparator) -> (&'static str, Comparator) {
    (operator.engine_name(), comparator)
}

/// Stand-in for a `within-<code>` operator when no benchmark comparator was supplied.
///
/// Percentile benchmarks against a reference population are not computed here, so the
/// condition fails loudly instead of reporting a result.
pub fn unconfigured_benchmark(operator: &str) -> Comparator {
    let operator = operator.to_string();
    Arc::new(move |_fact: &Value, _threshold: Option<&CriterionValue>| {
        Err(ComparatorError::Unsupported(format!(
            "no benchmark is configured for `{operator}`"
        )))
    })
}

fn less_than_inclusive(
    fact: &Value,
    threshold: Option<&CriterionValue>,
) -> Result<bool, ComparatorError> {
    Ok(numeric_fact(fact)? <= numeric_threshold(threshold)?)
}

fn greater_than_inclusive(
    fact: &Value,
    threshold: Option<&CriterionValue>,
) -> Result<bool, ComparatorError> {
    Ok(numeric_fact(fact)? >= numeric_threshold(threshold)?)
}

fn at_most(fact: &Value, threshold: Option<&CriterionValue>) -> Result<bool, ComparatorError> {
    Ok(numeric_fact(fact)? <= numeric_threshold(threshold)?)
}

/// Same cap as `max`, but an omitted threshold leaves the fact unconstrained.
fn above(fact: &Value, threshold: Option<&CriterionValue>) -> Result<bool, ComparatorError> {
    let value = numeric_fact(fact)?;
    match threshold {
        None => Ok(true),
        Some(_) => Ok(value <= numeric_threshold(threshold)?),
    }
}

fn between(fact: &Value, threshold: Option<&CriterionValue>) -> Result<bool, ComparatorError> {
    let value = numeric_fact(fact)?;
    let range = threshold
        .and_then(CriterionValue::as_range)
        .ok_or(ComparatorError::Threshold("range"))?;

    match (range.from, range.to) {
        (Some(from), Some(to)) => Ok(from <= value && value <= to),
        _ => Err(ComparatorError::Threshold("range")),
    }
}

fn equal(fact: &Value, threshold: Option<&CriterionValue>) -> Result<bool, ComparatorError> {
    let threshold = threshold.ok_or(ComparatorError::Threshold("boolean or numeric"))?;
    match (fact, threshold) {
        (Value::Bool(actual), CriterionValue::Boolean(expected)) => Ok(actual == expected),
        (Value::Number(actual), CriterionValue::Number(expected)) => {
            Ok(actual.as_f64() == Some(*expected))
        }
        (
            Value::Bool(_) | Value::Number(_),
            CriterionValue::Boolean(_) | CriterionValue::Number(_),
        ) => Ok(false),
        (Value::Bool(_) | Value::Number(_), CriterionValue::Range(_)) => {
            Err(ComparatorError::Threshold("boolean or numeric"))
        }
        (other, _) => Err(ComparatorError::FactType {
            expected: "boolean or numeric",
            found: describe(other),
        }),
    }
}

fn numeric_fact(fact: &Value) -> Result<f64, ComparatorError> {
    fact.as_f64().ok_or_else(|| ComparatorError::FactType {
        expected: "numeric",
        found: describe(fact),
    })
}

fn numeric_threshold(threshold: Option<&CriterionValue>) -> Result<f64, ComparatorError> {
    threshold
        .and_then(CriterionValue::as_number)
        .ok_or(ComparatorError::Threshold("numeric"))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => format!("boolean {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("text {text:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methodology::domain::ThresholdRange;
    use serde_json::json;

    fn number(value: f64) -> Option<CriterionValue> {
        Some(CriterionValue::Number(value))
    }

    #[test]
    fn inclusive_bounds() {
        assert_eq!(less_than_inclusive(&json!(60), number(60.0).as_ref()), Ok(true));
        assert_eq!(less_than_inclusive(&json!(60.5), number(60.0).as_ref()), Ok(false));
        assert_eq!(greater_than_inclusive(&json!(60), number(60.0).as_ref()), Ok(true));
        assert_eq!(at_most(&json!(12), number(10.0).as_ref()), Ok(false));
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let range = Some(CriterionValue::Range(ThresholdRange::new(10.0, 20.0)));
        for (fact, expected) in [(json!(10), true), (json!(20), true), (json!(20.01), false)] {
            assert_eq!(between(&fact, range.as_ref()), Ok(expected));
        }
        assert!(between(&json!(15), number(15.0).as_ref()).is_err());
    }

    #[test]
    fn above_without_threshold_is_unconstrained() {
        assert_eq!(above(&json!(99), None), Ok(true));
        assert_eq!(above(&json!(99), number(50.0).as_ref()), Ok(false));
    }

    #[test]
    fn equal_compares_like_typed_values() {
        let no = Some(CriterionValue::Boolean(false));
        assert_eq!(equal(&json!(false), no.as_ref()), Ok(true));
        assert_eq!(equal(&json!(true), no.as_ref()), Ok(false));
        assert_eq!(equal(&json!(0), no.as_ref()), Ok(false));
        assert_eq!(equal(&json!(3), number(3.0).as_ref()), Ok(true));
    }

    #[test]
    fn malformed_facts_are_errors() {
        let err = less_than_inclusive(&json!("n/a"), number(1.0).as_ref()).expect_err("text fact");
        assert_eq!(
            err,
            ComparatorError::FactType {
                expected: "numeric",
                found: "text \"n/a\"".to_string()
            }
        );
        assert!(equal(&json!("no"), Some(&CriterionValue::Boolean(false))).is_err());
    }

    #[test]
    fn benchmark_placeholder_reports_the_gap() {
        let comparator = unconfigured_benchmark("within-scope_1_emissions");
        let err = comparator(&json!(1), number(10.0).as_ref()).expect_err("gap is explicit");
        assert!(err.to_string().contains("within-scope_1_emissions"));
    }
}
