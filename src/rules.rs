// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::{unique, Context};
use crate::errors::ResolveError;
use crate::model::{Policy, Repository};
use crate::resolver::VariableResolver;
use crate::variable::Variable;

use anyhow::{bail, Context as _, Result};
use log::debug;

/// Expands repository templates against a resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryRules;

impl RepositoryRules {
    pub fn new() -> Self {
        Self
    }

    /// A template with a variable id expands to zero or more concrete
    /// repositories, one per resolved id, carrying the template's
    /// descriptive fields. A concrete template passes through unchanged.
    pub fn resolve(
        &self,
        repository: &Repository,
        vars: &mut dyn VariableResolver,
    ) -> Result<Vec<Repository>> {
        if !Variable::is_variable(&repository.id) {
            return Ok(vec![repository.clone()]);
        }

        let ids = vars.resolve(&repository.id).with_context(|| {
            format!(
                "could not resolve repository id expression '{}'",
                repository.id
            )
        })?;

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            resolved.push(Repository {
                id: concrete_id(&id)?,
                ..repository.clone()
            });
        }
        Ok(resolved)
    }
}

/// Expands policy templates against a context: resolves id expressions,
/// pins each concrete id, expands nested repository templates and filters
/// by the template's conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyRules;

impl PolicyRules {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, policy: &Policy, context: &mut Context) -> Result<Vec<Policy>> {
        if Variable::is_variable(&policy.id) {
            let ids = context.resolve(&policy.id).with_context(|| {
                format!("could not resolve policy id expression '{}'", policy.id)
            })?;
            debug!(
                "policy id expression '{}' expanded to {} id(s)",
                policy.id,
                ids.len()
            );

            let mut resolved = vec![];
            for id in ids {
                // The clone proceeds as a concrete policy; the pinned
                // context remembers which id its expression stands for.
                let concrete = Policy {
                    id: concrete_id(&id)?,
                    ..policy.clone()
                };
                let mut pinned = context.pin(&policy.id, &id)?;
                let expansion = self
                    .resolve(&concrete, &mut pinned)
                    .with_context(|| format!("could not resolve policy rule for '{id}'"))?;
                resolved.extend(expansion);
            }
            return Ok(unique(resolved));
        }

        let id = concrete_id(&policy.id)?;
        let repositories = self.resolve_repositories(policy, context)?;
        if !self
            .apply_conditions(policy, context)
            .with_context(|| format!("could not evaluate conditions for policy '{}'", policy.id))?
        {
            debug!("conditions rejected policy '{}'", policy.id);
            return Ok(vec![]);
        }

        Ok(vec![Policy {
            id,
            repositories,
            ..policy.clone()
        }])
    }

    // Expand every nested repository template, in template order.
    fn resolve_repositories(&self, policy: &Policy, context: &mut Context) -> Result<Vec<Repository>> {
        let rules = RepositoryRules::new();
        let mut resolved = vec![];
        for repository in &policy.repositories {
            resolved.extend(rules.resolve(repository, context)?);
        }
        Ok(resolved)
    }

    // Every condition attached to the template must pass.
    fn apply_conditions(&self, policy: &Policy, context: &mut Context) -> Result<bool> {
        for condition in &policy.conditions {
            if !condition.apply(context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// A concrete id is a base-10 u64, rendered back in canonical decimal so
// spellings like "007" or "+7" come out as "7".
fn concrete_id(id: &str) -> Result<String> {
    match id.parse::<u64>() {
        Ok(parsed) => Ok(parsed.to_string()),
        Err(_) => bail!(ResolveError::ParseError(
            id.to_string(),
            "not a numeric entity id".to_string()
        )),
    }
}
