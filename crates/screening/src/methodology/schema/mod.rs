//! Root methodology: the immutable, versioned description of which criteria exist.
//!
//! A root methodology is built once from a JSON template whose leaves may reference a
//! parameter namespace through `$params.<dot.path>` placeholders. Building resolves every
//! placeholder, checks the structural invariants the rest of the pipeline relies on, and
//! resolves the bucket-to-classification table. Nothing mutates it afterwards.

pub mod catalog;
mod classification;
mod template;

pub use catalog::{default_params, default_template, BucketIdentifiers, MethodologyParams};
pub use classification::{Bucket, ClassificationDefinition, ClassificationTable};
pub use template::PARAMS_PREFIX;

use super::domain::RuleKey;
use super::operators::Operator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Display metadata for a criteria category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub empty_state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
}

/// Value shape family of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Select,
    SelectThreshold,
}

/// Option a rule offers, with the human operators it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDefinition {
    pub code: String,
    pub name: String,
    pub operators: BTreeSet<String>,
}

impl OptionDefinition {
    pub fn new<'a>(
        code: impl Into<String>,
        name: impl Into<String>,
        operators: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            operators: operators.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn allows(&self, operator: &str) -> bool {
        self.operators.contains(operator)
    }
}

/// Schema node for a screening rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub step_code: String,
    #[serde(default)]
    pub category_code: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub options: Vec<OptionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_rule: Option<String>,
}

impl RuleDefinition {
    pub fn option(&self, code: &str) -> Option<&OptionDefinition> {
        self.options.iter().find(|option| option.code == code)
    }

    pub fn key(&self) -> RuleKey {
        RuleKey::new(&self.step_code, &self.category_code, &self.code)
    }
}

/// Category grouping inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCategory {
    pub code: String,
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub categories: Vec<StepCategory>,
}

/// Serialized shape of a fully populated template.
#[derive(Debug, Deserialize)]
struct RootDocument {
    version: String,
    #[serde(default)]
    categories: Vec<CategoryDescriptor>,
    classifications: Vec<ClassificationDefinition>,
    steps: Vec<StepDefinition>,
}

/// Fully concrete, validated root methodology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootMethodology {
    version: String,
    categories: Vec<CategoryDescriptor>,
    classifications: Vec<ClassificationDefinition>,
    steps: Vec<StepDefinition>,
    #[serde(skip)]
    classification_table: ClassificationTable,
}

impl RootMethodology {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn categories(&self) -> &[CategoryDescriptor] {
        &self.categories
    }

    pub fn classifications(&self) -> &[ClassificationDefinition] {
        &self.classifications
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn classification_table(&self) -> &ClassificationTable {
        &self.classification_table
    }

    /// Rule definitions in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &RuleDefinition> + '_ {
        self.steps
            .iter()
            .flat_map(|step| step.categories.iter())
            .flat_map(|category| category.rules.iter())
    }

    /// Resolve a rule by its triple. Triples are unique once the root is built.
    pub fn find_rule(&self, key: &RuleKey) -> Option<&RuleDefinition> {
        self.rules()
            .find(|rule| key.matches(&rule.step_code, &rule.category_code, &rule.code))
    }
}

/// Error raised while building a root methodology. No partial schema is usable.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("parameter key not found: $params.{path}")]
    ParameterKeyNotFound { path: String },
    #[error("root methodology template is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("rule {0} is declared more than once")]
    AmbiguousRule(RuleKey),
    #[error("option {option_code} of rule {rule_code} declares unknown operator '{operator}'")]
    UnknownOperator {
        rule_code: String,
        option_code: String,
        operator: String,
    },
    #[error("option {option_code} is declared more than once in rule {rule_code}")]
    DuplicateOption {
        rule_code: String,
        option_code: String,
    },
    #[error("rule {rule_code} depends on undeclared rule {dependency}")]
    MissingDependency {
        rule_code: String,
        dependency: String,
    },
    #[error("bucket {0} is mapped to more than one classification")]
    DuplicateBucket(Bucket),
    #[error("bucket {0} is not mapped to any classification")]
    UnmappedBucket(Bucket),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Build the root methodology from a template and the typed parameter object.
pub fn build_root_methodology(
    template: &Value,
    params: &MethodologyParams,
) -> Result<RootMethodology, SchemaError> {
    let namespace = serde_json::to_value(params)?;
    build_root_methodology_from_namespace(template, &namespace)
}

/// Build the root methodology from a template and an arbitrary parameter namespace.
pub fn build_root_methodology_from_namespace(
    template: &Value,
    namespace: &Value,
) -> Result<RootMethodology, SchemaError> {
    let populated = template::populate_params(template, namespace, PARAMS_PREFIX)?;
    let mut document: RootDocument = serde_json::from_value(populated)?;

    for step in &mut document.steps {
        for category in &mut step.categories {
            for rule in &mut category.rules {
                rule.step_code = step.code.clone();
                rule.category_code = category.code.clone();
            }
        }
    }

    check_rules(&document.steps)?;
    let classification_table = ClassificationTable::from_definitions(&document.classifications)?;

    debug!(
        version = %document.version,
        steps = document.steps.len(),
        "root methodology built"
    );

    Ok(RootMethodology {
        version: document.version,
        categories: document.categories,
        classifications: document.classifications,
        steps: document.steps,
        classification_table,
    })
}

/// Read a JSON document used as a template or as typed parameters.
pub fn read_json_document<T: DeserializeOwned>(path: &Path) -> Result<T, SchemaError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn check_rules(steps: &[StepDefinition]) -> Result<(), SchemaError> {
    let rules: Vec<&RuleDefinition> = steps
        .iter()
        .flat_map(|step| step.categories.iter())
        .flat_map(|category| category.rules.iter())
        .collect();

    let mut seen = HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.key()) {
            return Err(SchemaError::AmbiguousRule(rule.key()));
        }

        let mut option_codes = HashSet::new();
        for option in &rule.options {
            if !option_codes.insert(option.code.as_str()) {
                return Err(SchemaError::DuplicateOption {
                    rule_code: rule.code.clone(),
                    option_code: option.code.clone(),
                });
            }

            if let Some(unknown) = option
                .operators
                .iter()
                .find(|operator| Operator::from_human(operator).is_none())
            {
                return Err(SchemaError::UnknownOperator {
                    rule_code: rule.code.clone(),
                    option_code: option.code.clone(),
                    operator: unknown.clone(),
                });
            }
        }
    }

    for rule in &rules {
        if let Some(dependency) = &rule.dependency_rule {
            if !rules.iter().any(|candidate| &candidate.code == dependency) {
                return Err(SchemaError::MissingDependency {
                    rule_code: rule.code.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_template(rules: Value) -> Value {
        json!({
            "version": "2.0",
            "classifications": [
                { "code": "ok", "bucket": "$params.engine_classifications.PASS" },
                { "code": "ko", "bucket": "$params.engine_classifications.NOT_PASS" },
                { "code": "gap", "bucket": "$params.engine_classifications.NONE" }
            ],
            "steps": [{
                "code": "step",
                "categories": [{ "code": "cat", "rules": rules }]
            }]
        })
    }

    #[test]
    fn default_catalog_builds() {
        let root = build_root_methodology(&default_template(), &default_params())
            .expect("default root builds");

        assert_eq!(root.version(), "1.0");
        assert_eq!(
            root.classification_table().code_for(Bucket::None),
            "uncovered"
        );
        let rule = root
            .find_rule(&RuleKey::new(
                "passes_negative_screening",
                "principal_adverse_impacts",
                "pais_upon_threshold",
            ))
            .expect("threshold rule present");
        assert_eq!(rule.rule_type, RuleType::SelectThreshold);
        assert!(rule.option("scope_1_emissions").is_some());
    }

    #[test]
    fn rules_inherit_their_step_and_category() {
        let template = minimal_template(json!([
            { "code": "r1", "type": "select", "options": [] }
        ]));
        let root = build_root_methodology(&template, &MethodologyParams::default())
            .expect("root builds");

        let rule = root.rules().next().expect("one rule");
        assert_eq!(rule.key(), RuleKey::new("step", "cat", "r1"));
    }

    #[test]
    fn duplicate_triples_are_rejected() {
        let template = minimal_template(json!([
            { "code": "r1", "type": "select", "options": [] },
            { "code": "r1", "type": "select_threshold", "options": [] }
        ]));

        let err = build_root_methodology(&template, &MethodologyParams::default())
            .expect_err("ambiguous rule rejected");
        assert!(matches!(err, SchemaError::AmbiguousRule(key) if key.rule_code == "r1"));
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let template = minimal_template(json!([{
            "code": "r1",
            "type": "select",
            "options": [{ "code": "o", "name": "O", "operators": ["lessThan"] }]
        }]));

        let err = build_root_methodology(&template, &MethodologyParams::default())
            .expect_err("unknown operator rejected");
        assert!(matches!(
            err,
            SchemaError::UnknownOperator { operator, .. } if operator == "lessThan"
        ));
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let template = minimal_template(json!([{
            "code": "r1",
            "type": "select",
            "options": [],
            "dependency_rule": "r0"
        }]));

        let err = build_root_methodology(&template, &MethodologyParams::default())
            .expect_err("missing dependency rejected");
        assert!(matches!(
            err,
            SchemaError::MissingDependency { dependency, .. } if dependency == "r0"
        ));
    }

    #[test]
    fn missing_parameter_aborts_the_build() {
        let template = json!({
            "version": "1.0",
            "classifications": [],
            "steps": [{
                "code": "step",
                "categories": [{
                    "code": "cat",
                    "rules": [{ "code": "r1", "type": "select", "options": "$params.nope.deeper" }]
                }]
            }]
        });

        let err = build_root_methodology(&template, &MethodologyParams::default())
            .expect_err("missing key");
        assert_eq!(err.to_string(), "parameter key not found: $params.nope.deeper");
    }
}
