use super::domain::{CriterionValue, RuleEdit, RuleKey, ThresholdRange};
use super::operators::{translate, Operator};
use super::schema::{OptionDefinition, RootMethodology, RuleDefinition, RuleType};
use serde::Serialize;

/// Programmatic classification of a rejected edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleErrorKind {
    RuleNotFound,
    InvalidOption,
    InvalidOperator,
    InvalidValue,
}

/// Reason a proposed edit was rejected. Fatal to that edit only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule {0} does not exist in the root methodology")]
    RuleNotFound(RuleKey),
    #[error("option {code} is not available for rule {rule_code}")]
    InvalidOption { rule_code: String, code: String },
    #[error("operator '{operator}' is not a valid operator for option {code}")]
    InvalidOperator { code: String, operator: String },
    #[error("value is not valid for option {code}: {reason}")]
    InvalidValue { code: String, reason: String },
}

impl RuleValidationError {
    pub fn kind(&self) -> RuleErrorKind {
        match self {
            Self::RuleNotFound(_) => RuleErrorKind::RuleNotFound,
            Self::InvalidOption { .. } => RuleErrorKind::InvalidOption,
            Self::InvalidOperator { .. } => RuleErrorKind::InvalidOperator,
            Self::InvalidValue { .. } => RuleErrorKind::InvalidValue,
        }
    }
}

/// Schema nodes an accepted edit resolved to.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedEdit<'a> {
    pub rule: &'a RuleDefinition,
    pub option: &'a OptionDefinition,
    pub operator: Operator,
}

/// Check a proposed edit against the root methodology.
///
/// Checks run in a fixed order and stop at the first violation: rule existence, option
/// existence, operator validity, then value shape. Nothing is mutated.
pub fn validate_rule<'a>(
    edit: &RuleEdit,
    root: &'a RootMethodology,
) -> Result<ValidatedEdit<'a>, RuleValidationError> {
    let rule = root
        .find_rule(&edit.rule)
        .ok_or_else(|| RuleValidationError::RuleNotFound(edit.rule.clone()))?;

    let proposed = &edit.value;
    let option = rule
        .option(&proposed.code)
        .ok_or_else(|| RuleValidationError::InvalidOption {
            rule_code: rule.code.clone(),
            code: proposed.code.clone(),
        })?;

    let operator = resolve_operator(option, &proposed.operator)?;

    check_value_shape(rule.rule_type, operator, proposed.value.as_ref()).map_err(|reason| {
        RuleValidationError::InvalidValue {
            code: proposed.code.clone(),
            reason,
        }
    })?;

    Ok(ValidatedEdit {
        rule,
        option,
        operator,
    })
}

fn resolve_operator(
    option: &OptionDefinition,
    token: &str,
) -> Result<Operator, RuleValidationError> {
    let invalid = || RuleValidationError::InvalidOperator {
        code: option.code.clone(),
        operator: token.to_string(),
    };

    let translated = translate(token).ok_or_else(invalid)?;
    if !option.allows(token) && !option.allows(translated) {
        return Err(invalid());
    }

    Operator::resolve(token).ok_or_else(invalid)
}

pub(crate) fn check_value_shape(
    rule_type: RuleType,
    operator: Operator,
    value: Option<&CriterionValue>,
) -> Result<(), String> {
    if rule_type == RuleType::Select {
        return Ok(());
    }

    match (operator, value) {
        (Operator::Between, Some(CriterionValue::Range(range))) => check_range(range),
        (Operator::Between, _) => Err("`between` requires a {from, to} range".to_string()),
        (operator, None) if operator.value_optional() => Ok(()),
        (operator, None) => Err(format!("`{operator}` requires a threshold")),
        (_, Some(CriterionValue::Number(threshold))) => check_percentage(*threshold),
        (operator, Some(_)) => Err(format!("`{operator}` threshold must be a number")),
    }
}

fn check_range(range: &ThresholdRange) -> Result<(), String> {
    match (range.from, range.to) {
        (Some(from), Some(to)) if is_positive(from) && is_positive(to) => Ok(()),
        (Some(_), Some(_)) => Err("range bounds must be positive numbers".to_string()),
        _ => Err("range requires both `from` and `to`".to_string()),
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Percentages are bounded to [0, 100] with at most two decimal digits.
fn check_percentage(threshold: f64) -> Result<(), String> {
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(format!("{threshold} is outside 0-100"));
    }

    let scaled = threshold * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        return Err(format!("{threshold} has more than two decimal digits"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methodology::schema::{build_root_methodology, default_params, default_template};

    fn root() -> RootMethodology {
        build_root_methodology(&default_template(), &default_params()).expect("root builds")
    }

    fn threshold_key() -> RuleKey {
        RuleKey::new(
            "passes_negative_screening",
            "principal_adverse_impacts",
            "pais_upon_threshold",
        )
    }

    fn excluded_key() -> RuleKey {
        RuleKey::new(
            "passes_negative_screening",
            "principal_adverse_impacts",
            "pais_excluded",
        )
    }

    fn kind_of(edit: RuleEdit) -> Option<RuleErrorKind> {
        validate_rule(&edit, &root()).err().map(|err| err.kind())
    }

    #[test]
    fn accepts_threshold_within_bounds() {
        let root = root();
        let edit = RuleEdit::new(
            threshold_key(),
            "scope_1_emissions",
            "less",
            Some(CriterionValue::Number(60.0)),
        );

        let validated = validate_rule(&edit, &root).expect("edit valid");
        assert_eq!(validated.operator, Operator::Less);
        assert_eq!(validated.option.code, "scope_1_emissions");
    }

    #[test]
    fn unknown_rule_is_reported_first() {
        let mut key = threshold_key();
        key.category_code = "controversies_criteria".to_string();
        let edit = RuleEdit::new(key, "unknown_option", "bogus", None);

        assert_eq!(kind_of(edit), Some(RuleErrorKind::RuleNotFound));
    }

    #[test]
    fn option_must_belong_to_the_rule() {
        let edit = RuleEdit::new(
            excluded_key(),
            "scope_1_emissions",
            "equal",
            Some(CriterionValue::Boolean(false)),
        );

        assert_eq!(kind_of(edit), Some(RuleErrorKind::InvalidOption));
    }

    #[test]
    fn operator_must_exist_and_be_allowed_for_the_option() {
        let unknown = RuleEdit::new(
            threshold_key(),
            "scope_1_emissions",
            "lessThan",
            Some(CriterionValue::Number(10.0)),
        );
        assert_eq!(kind_of(unknown), Some(RuleErrorKind::InvalidOperator));

        let disallowed = RuleEdit::new(
            threshold_key(),
            "scope_1_emissions",
            "between",
            Some(CriterionValue::Range(ThresholdRange::new(1.0, 2.0))),
        );
        assert_eq!(kind_of(disallowed), Some(RuleErrorKind::InvalidOperator));
    }

    #[test]
    fn operator_is_checked_against_the_matched_option() {
        // `between` is only offered by the energy option, which is declared last.
        let edit = RuleEdit::new(
            threshold_key(),
            "total_share_non_renewable_energy_consumption",
            "between",
            Some(CriterionValue::Range(ThresholdRange::new(10.0, 20.0))),
        );

        assert!(validate_rule(&edit, &root()).is_ok());
    }

    #[test]
    fn engine_tokens_are_accepted_for_allowed_operators() {
        let edit = RuleEdit::new(
            threshold_key(),
            "scope_1_emissions",
            "lessThanInclusive",
            Some(CriterionValue::Number(25.5)),
        );

        let root = root();
        let validated = validate_rule(&edit, &root).expect("engine token accepted");
        assert_eq!(validated.operator, Operator::Less);
    }

    #[test]
    fn select_rules_accept_any_value() {
        for value in [
            Some(CriterionValue::Boolean(true)),
            Some(CriterionValue::Number(1234.5678)),
            None,
        ] {
            let edit = RuleEdit::new(
                excluded_key(),
                "activities_affecting_biodiversity",
                "equal",
                value,
            );
            assert_eq!(kind_of(edit), None);
        }
    }

    #[test]
    fn threshold_values_are_percentages_with_two_decimals() {
        for (value, expected) in [
            (Some(CriterionValue::Number(0.0)), None),
            (Some(CriterionValue::Number(100.0)), None),
            (Some(CriterionValue::Number(12.34)), None),
            (Some(CriterionValue::Number(12.345)), Some(RuleErrorKind::InvalidValue)),
            (Some(CriterionValue::Number(100.01)), Some(RuleErrorKind::InvalidValue)),
            (Some(CriterionValue::Number(-1.0)), Some(RuleErrorKind::InvalidValue)),
            (Some(CriterionValue::Boolean(true)), Some(RuleErrorKind::InvalidValue)),
            (None, Some(RuleErrorKind::InvalidValue)),
        ] {
            let edit = RuleEdit::new(threshold_key(), "scope_2_emissions", "less", value.clone());
            assert_eq!(kind_of(edit), expected, "value {value:?}");
        }
    }

    #[test]
    fn between_requires_two_positive_bounds() {
        let energy = "total_share_non_renewable_energy_consumption";
        for (value, expected) in [
            (Some(CriterionValue::Range(ThresholdRange::new(5.0, 250.0))), None),
            (
                Some(CriterionValue::Range(ThresholdRange {
                    from: Some(5.0),
                    to: None,
                })),
                Some(RuleErrorKind::InvalidValue),
            ),
            (
                Some(CriterionValue::Range(ThresholdRange::new(0.0, 10.0))),
                Some(RuleErrorKind::InvalidValue),
            ),
            (Some(CriterionValue::Number(10.0)), Some(RuleErrorKind::InvalidValue)),
            (None, Some(RuleErrorKind::InvalidValue)),
        ] {
            let edit = RuleEdit::new(threshold_key(), energy, "between", value.clone());
            assert_eq!(kind_of(edit), expected, "value {value:?}");
        }
    }

    #[test]
    fn above_tolerates_a_missing_threshold() {
        let energy = "total_share_non_renewable_energy_consumption";
        let edit = RuleEdit::new(threshold_key(), energy, "above", None);
        assert_eq!(kind_of(edit), None);

        let edit = RuleEdit::new(
            threshold_key(),
            energy,
            "above",
            Some(CriterionValue::Number(101.0)),
        );
        assert_eq!(kind_of(edit), Some(RuleErrorKind::InvalidValue));
    }
}
