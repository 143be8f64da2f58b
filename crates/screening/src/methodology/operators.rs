//! Operator vocabulary shared by the editor-facing schema and the evaluation engine.
//!
//! Editors speak in short human tokens (`less`, `more`, ...) while the evaluation engine
//! dispatches on its own names (`lessThanInclusive`, ...). The mapping is a fixed bijection;
//! [`translate`] walks it in either direction.

use std::fmt;

/// Human token paired with the engine token it compiles to.
const OPERATOR_PAIRS: [(&str, &str); 7] = [
    ("less", "lessThanInclusive"),
    ("more", "greaterThanInclusive"),
    ("within", "within"),
    ("equal", "equal"),
    ("between", "between"),
    ("above", "above"),
    ("max", "max"),
];

/// Prefix of the per-option operators derived from `within`.
pub const WITHIN_PREFIX: &str = "within-";

/// Translate an operator token in either direction.
///
/// A human token yields its engine name, an engine token yields its human name. Tokens
/// that are both (`within`, `equal`, ...) map to themselves. Unknown tokens yield `None`.
pub fn translate(token: &str) -> Option<&'static str> {
    OPERATOR_PAIRS
        .iter()
        .find(|(human, _)| *human == token)
        .map(|(_, engine)| *engine)
        .or_else(|| {
            OPERATOR_PAIRS
                .iter()
                .find(|(_, engine)| *engine == token)
                .map(|(human, _)| *human)
        })
}

/// Closed set of comparison operators a criterion may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Less,
    More,
    Within,
    Equal,
    Between,
    Above,
    Max,
}

impl Operator {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Less,
            Self::More,
            Self::Within,
            Self::Equal,
            Self::Between,
            Self::Above,
            Self::Max,
        ]
    }

    pub const fn human_name(self) -> &'static str {
        OPERATOR_PAIRS[self as usize].0
    }

    pub const fn engine_name(self) -> &'static str {
        OPERATOR_PAIRS[self as usize].1
    }

    pub fn from_human(token: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|operator| operator.human_name() == token)
    }

    pub fn from_engine(token: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|operator| operator.engine_name() == token)
    }

    /// Resolve a token given in either vocabulary.
    pub fn resolve(token: &str) -> Option<Self> {
        Self::from_human(token).or_else(|| Self::from_engine(token))
    }

    /// Operators whose threshold may be omitted.
    pub const fn value_optional(self) -> bool {
        matches!(self, Self::Above)
    }

    /// Engine operator after custom modifiers are applied for the given option code.
    ///
    /// `within` is rewritten to `within-<code>` so the engine can dispatch a comparator per
    /// option; every other operator keeps its engine name.
    pub fn compiled_name(self, option_code: &str) -> String {
        match self {
            Self::Within => format!("{WITHIN_PREFIX}{option_code}"),
            other => other.engine_name().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.human_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_is_an_involution_over_the_vocabulary() {
        for (human, engine) in OPERATOR_PAIRS {
            let forward = translate(human).expect("human token translates");
            assert_eq!(translate(forward), Some(human));

            let backward = translate(engine).expect("engine token translates");
            assert_eq!(translate(backward), Some(engine));
        }
    }

    #[test]
    fn translate_maps_between_vocabularies() {
        assert_eq!(translate("less"), Some("lessThanInclusive"));
        assert_eq!(translate("greaterThanInclusive"), Some("more"));
        assert_eq!(translate("within"), Some("within"));
        assert_eq!(translate("lessThan"), None);
        assert_eq!(translate(""), None);
    }

    #[test]
    fn enum_names_line_up_with_table() {
        for operator in Operator::ordered() {
            assert_eq!(translate(operator.human_name()), Some(operator.engine_name()));
            assert_eq!(Operator::resolve(operator.engine_name()), Some(operator));
        }
    }

    #[test]
    fn within_is_parameterized_per_option() {
        assert_eq!(
            Operator::Within.compiled_name("scope_1_emissions"),
            "within-scope_1_emissions"
        );
        assert_eq!(Operator::Less.compiled_name("scope_1_emissions"), "lessThanInclusive");
    }

    #[test]
    fn only_above_tolerates_missing_threshold() {
        let optional: Vec<_> = Operator::ordered()
            .into_iter()
            .filter(|operator| operator.value_optional())
            .collect();
        assert_eq!(optional, vec![Operator::Above]);
    }
}
