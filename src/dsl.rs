// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::{unique, Context};
use crate::model::{Policy, Repository};
use crate::rules::PolicyRules;

use std::path::Path;

use anyhow::{Context as _, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// The schema identifier rule documents are expected to carry.
pub const SCHEMA: &str = "https://microsoft.github.io/resolvus/schemas/rules-1.0.json";

/// A declarative rule document: a schema marker plus an ordered list of
/// policy templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    #[serde(default, rename = "policy-rules", skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
}

impl RuleDocument {
    pub fn from_json_str(json: &str) -> Result<RuleDocument> {
        let doc: RuleDocument =
            serde_json::from_str(json).context("unable to parse rule document")?;
        doc.check_schema();
        Ok(doc)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<RuleDocument> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<RuleDocument> {
        let doc: RuleDocument =
            serde_yaml::from_str(yaml).context("unable to parse rule document")?;
        doc.check_schema();
        Ok(doc)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<RuleDocument> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents)
    }

    // Historical documents carry a few different schema ids; an unknown one
    // is worth a warning but not a failure.
    fn check_schema(&self) {
        if self.schema != SCHEMA {
            warn!("unrecognized rule document schema '{}'", self.schema);
        }
    }

    /// Resolve every policy template against `context`, returning the
    /// distinct concrete policies in template order.
    pub fn resolve(&self, context: &mut Context) -> Result<Vec<Policy>> {
        let rules = PolicyRules::new();
        let mut resolved = vec![];
        for policy in &self.policies {
            let expansion = rules
                .resolve(policy, context)
                .with_context(|| format!("could not resolve policy rule for '{}'", policy.id))?;
            resolved.extend(expansion);
        }

        let resolved = unique(resolved);
        info!(
            "resolved {} policies from {} templates",
            resolved.len(),
            self.policies.len()
        );
        Ok(resolved)
    }

    /// Resolve the repositories that apply: expand the policies, then
    /// flatten their repositories in policy order, keeping first
    /// occurrences.
    pub fn resolve_repositories(&self, context: &mut Context) -> Result<Vec<Repository>> {
        let policies = self.resolve(context)?;
        let mut repositories = vec![];
        for policy in policies {
            repositories.extend(policy.repositories);
        }
        Ok(unique(repositories))
    }
}
