use super::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity-level outcome of a screening run, before it is mapped to a user-facing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    Pass,
    NotPass,
    None,
}

impl Bucket {
    pub const fn ordered() -> [Self; 3] {
        [Self::Pass, Self::NotPass, Self::None]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::NotPass => "NOT_PASS",
            Self::None => "NONE",
        }
    }

    /// Failures dominate data gaps; a pass needs neither.
    pub fn from_counts(failures: usize, inapplicable: usize) -> Self {
        if failures > 0 {
            Self::NotPass
        } else if inapplicable > 0 {
            Self::None
        } else {
            Self::Pass
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-facing classification declared by the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDefinition {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "condition")]
    pub bucket: Bucket,
}

/// Bucket to classification code table, resolved once when the schema is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTable {
    pass: String,
    not_pass: String,
    none: String,
}

impl ClassificationTable {
    pub(crate) fn from_definitions(
        definitions: &[ClassificationDefinition],
    ) -> Result<Self, SchemaError> {
        let mut slots: [Option<&str>; 3] = [None, None, None];

        for definition in definitions {
            let slot = &mut slots[definition.bucket as usize];
            if slot.is_some() {
                return Err(SchemaError::DuplicateBucket(definition.bucket));
            }
            *slot = Some(definition.code.as_str());
        }

        let code = |bucket: Bucket| {
            slots[bucket as usize]
                .map(str::to_string)
                .ok_or(SchemaError::UnmappedBucket(bucket))
        };

        Ok(Self {
            pass: code(Bucket::Pass)?,
            not_pass: code(Bucket::NotPass)?,
            none: code(Bucket::None)?,
        })
    }

    pub fn code_for(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Pass => &self.pass,
            Bucket::NotPass => &self.not_pass,
            Bucket::None => &self.none,
        }
    }

    /// Classification codes in bucket order.
    pub fn codes(&self) -> [&str; 3] {
        Bucket::ordered().map(|bucket| self.code_for(bucket))
    }
}
