use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a rule node: `(step_code, category_code, rule_code)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub step_code: String,
    pub category_code: String,
    pub rule_code: String,
}

impl RuleKey {
    pub fn new(
        step_code: impl Into<String>,
        category_code: impl Into<String>,
        rule_code: impl Into<String>,
    ) -> Self {
        Self {
            step_code: step_code.into(),
            category_code: category_code.into(),
            rule_code: rule_code.into(),
        }
    }

    pub fn matches(&self, step_code: &str, category_code: &str, rule_code: &str) -> bool {
        self.step_code == step_code
            && self.category_code == category_code
            && self.rule_code == rule_code
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.step_code, self.category_code, self.rule_code
        )
    }
}

/// Threshold payload attached to a selected option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    Boolean(bool),
    Number(f64),
    Range(ThresholdRange),
}

impl CriterionValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&ThresholdRange> {
        match self {
            Self::Range(range) => Some(range),
            _ => None,
        }
    }
}

/// Inclusive `{from, to}` bounds used by the `between` operator.
///
/// Both bounds are optional at the wire level so an incomplete range reaches validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
}

impl ThresholdRange {
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// Option selection proposed by an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedValue {
    pub code: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<CriterionValue>,
}

/// Add-or-replace request for a single option value of a rule node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEdit {
    #[serde(flatten)]
    pub rule: RuleKey,
    pub value: ProposedValue,
}

impl RuleEdit {
    pub fn new(
        rule: RuleKey,
        code: impl Into<String>,
        operator: impl Into<String>,
        value: Option<CriterionValue>,
    ) -> Self {
        Self {
            rule,
            value: ProposedValue {
                code: code.into(),
                operator: operator.into(),
                value,
            },
        }
    }
}

/// Removal request for the value stored under `code` in a rule node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeletion {
    #[serde(flatten)]
    pub rule: RuleKey,
    pub code: String,
}

impl RuleDeletion {
    pub fn new(rule: RuleKey, code: impl Into<String>) -> Self {
        Self {
            rule,
            code: code.into(),
        }
    }
}

/// Value stored on a rule node of a methodology instance.
///
/// `operator` holds the engine-facing token, `original_operator` the human token the
/// editor chose so the value can be displayed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleValue {
    pub code: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<CriterionValue>,
    #[serde(rename = "originalOperator", alias = "original_operator")]
    pub original_operator: String,
}
