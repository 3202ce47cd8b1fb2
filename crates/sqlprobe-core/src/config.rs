//! Dialect configuration
//!
//! Which SQL dialect the engine bridge should parse with. Serialized form
//! is stable; add variants, never rename them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI-ish SQL (the default).
    Ansi,
    Postgres,
    BigQuery,
    Snowflake,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Ansi
    }
}

impl fmt::Display for DialectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ansi => write!(f, "ansi"),
            Self::Postgres => write!(f, "postgres"),
            Self::BigQuery => write!(f, "bigquery"),
            Self::Snowflake => write!(f, "snowflake"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_names_are_stable() {
        assert_eq!(
            serde_json::to_string(&DialectConfig::BigQuery).unwrap(),
            "\"bigquery\""
        );
        assert_eq!(
            serde_json::from_str::<DialectConfig>("\"snowflake\"").unwrap(),
            DialectConfig::Snowflake
        );
        assert_eq!(DialectConfig::default(), DialectConfig::Ansi);
    }
}
