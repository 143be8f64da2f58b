//! Built-in sustainability screening catalogue: the default template and the typed
//! parameter object it is populated from.

use super::{Bucket, OptionDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Typed parameter namespace injected once when the root methodology is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodologyParams {
    #[serde(default)]
    pub qualitative_pais: Vec<OptionDefinition>,
    #[serde(default)]
    pub quantitative_pais: Vec<OptionDefinition>,
    #[serde(default)]
    pub engine_classifications: BucketIdentifiers,
    /// Additional namespace entries a custom template may reference.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Symbolic bucket identifiers referenced by the template's classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketIdentifiers {
    #[serde(rename = "PASS")]
    pub pass: Bucket,
    #[serde(rename = "NOT_PASS")]
    pub not_pass: Bucket,
    #[serde(rename = "NONE")]
    pub none: Bucket,
}

impl Default for BucketIdentifiers {
    fn default() -> Self {
        Self {
            pass: Bucket::Pass,
            not_pass: Bucket::NotPass,
            none: Bucket::None,
        }
    }
}

/// Principal adverse impact indicators offered by the default methodology.
pub fn default_params() -> MethodologyParams {
    MethodologyParams {
        qualitative_pais: vec![OptionDefinition::new(
            "activities_affecting_biodiversity",
            "Activities negatively affecting biodiversity-sensitive areas",
            ["equal"],
        )],
        quantitative_pais: vec![
            OptionDefinition::new(
                "scope_1_emissions",
                "(GHG) Scope 1 emissions",
                ["within", "less", "max"],
            ),
            OptionDefinition::new(
                "scope_2_emissions",
                "(GHG) Scope 2 emissions",
                ["within", "less", "max"],
            ),
            OptionDefinition::new(
                "scope_3_emissions",
                "(GHG) Scope 3 emissions",
                ["within", "less", "max"],
            ),
            OptionDefinition::new(
                "total_share_non_renewable_energy_consumption",
                "Non-renewable energy consumption",
                ["within", "more", "between", "above"],
            ),
        ],
        engine_classifications: BucketIdentifiers::default(),
        extra: BTreeMap::new(),
    }
}

pub fn default_template() -> Value {
    json!({
        "version": "1.0",
        "categories": [
            {
                "code": "principal_adverse_impacts",
                "name": "Principal Adverse Impacts",
                "empty_state": "No Principal Adverse Impacts are required in the methodology."
            },
            {
                "code": "controversies_criteria",
                "name": "Controversies criteria",
                "empty_state": "No controversial business involvements are required in the methodology."
            }
        ],
        "classifications": [
            {
                "code": "sustainable",
                "name": "Sustainable",
                "bucket": "$params.engine_classifications.PASS"
            },
            {
                "code": "not_sustainable",
                "name": "Not sustainable",
                "bucket": "$params.engine_classifications.NOT_PASS"
            },
            {
                "code": "uncovered",
                "name": "Uncovered",
                "bucket": "$params.engine_classifications.NONE"
            }
        ],
        "steps": [
            {
                "code": "passes_negative_screening",
                "name": "Passes Negative Screening",
                "categories": [
                    {
                        "code": "principal_adverse_impacts",
                        "rules": [
                            {
                                "code": "pais_excluded",
                                "name": "Which of these PAIs must be excluded?",
                                "type": "select",
                                "options": "$params.qualitative_pais"
                            },
                            {
                                "code": "pais_upon_threshold",
                                "name": "Principal Adverse Impacts upon a threshold",
                                "type": "select_threshold",
                                "options": "$params.quantitative_pais"
                            }
                        ]
                    }
                ]
            }
        ]
    })
}
