use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENVIRONMENTS: [&str; 3] = ["dev", "staging", "prod"];

/// Container environment variables, one table per deployment environment.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablesFile {
    #[serde(default)]
    pub dev: BTreeMap<String, String>,
    #[serde(default)]
    pub staging: BTreeMap<String, String>,
    #[serde(default)]
    pub prod: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variables {
    pub values: VariablesFile,
    pub env: String,
}

impl Variables {
    pub fn new(values: VariablesFile, env: &str) -> Self {
        Variables {
            values,
            env: env.to_lowercase(),
        }
    }

    fn table(&self) -> Option<&BTreeMap<String, String>> {
        match self.env.as_str() {
            "dev" => Some(&self.values.dev),
            "staging" => Some(&self.values.staging),
            "prod" => Some(&self.values.prod),
            _ => None,
        }
    }

    /// `KEY=VALUE` pairs for the selected environment, sorted by key.
    pub fn pairs(&self) -> Vec<String> {
        self.table()
            .map(|table| {
                table
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_table_by_environment() {
        let values: VariablesFile = serde_yaml::from_str(
            "dev:\n  RUST_LOG: debug\n  PORT: '8000'\nprod:\n  RUST_LOG: warn\n",
        )
        .unwrap();

        let dev = Variables::new(values.clone(), "DEV");
        assert_eq!(dev.pairs(), vec!["PORT=8000", "RUST_LOG=debug"]);

        let staging = Variables::new(values.clone(), "staging");
        assert!(staging.pairs().is_empty());

        let unknown = Variables::new(values, "qa");
        assert!(unknown.pairs().is_empty());
    }
}
