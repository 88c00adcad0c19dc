//! Suite files: services plus the test cases that run against them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use apitest_core::{Service, TestCase};

/// A JSON suite file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl Suite {
    /// Read and validate a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file {}", path.display()))?;
        let suite = Self::from_json(&content)
            .with_context(|| format!("Invalid suite file {}", path.display()))?;
        Ok(suite)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let suite: Suite = serde_json::from_str(content).context("Failed to parse suite JSON")?;
        suite.validate()?;
        Ok(suite)
    }

    /// Reject suites whose identities collide.
    pub fn validate(&self) -> Result<()> {
        let mut service_ids = HashSet::new();
        for service in &self.services {
            if !service_ids.insert(service.id) {
                bail!("Duplicate service id {}", service.id);
            }
        }

        let mut case_ids = HashSet::new();
        for case in &self.test_cases {
            if !case_ids.insert(case.id) {
                bail!("Duplicate test case id {}", case.id);
            }
        }
        Ok(())
    }

    /// Active cases whose service is also active, in file order.
    ///
    /// Cases pointing at an unknown service are kept so the run reports them.
    pub fn active_cases(&self) -> Vec<TestCase> {
        let inactive: HashSet<_> = self
            .services
            .iter()
            .filter(|s| !s.is_active)
            .map(|s| s.id)
            .collect();

        self.test_cases
            .iter()
            .filter(|c| c.is_active && !inactive.contains(&c.service_id))
            .cloned()
            .collect()
    }
}
