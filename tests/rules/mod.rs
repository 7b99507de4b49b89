// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;
use resolvus::*;
use serde_json::json;

/// Resolves every variable expression to the same fixed value list.
struct Fixed(Vec<String>);

impl VariableResolver for Fixed {
    fn resolve(&mut self, source: &str) -> Result<Vec<String>> {
        if Variable::is_variable(source) {
            Ok(self.0.clone())
        } else {
            Ok(vec![source.to_string()])
        }
    }
}

fn headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("institution".to_string(), "jhu".to_string());
    headers.insert(
        "policy".to_string(),
        "http://localhost:8080/data/policies/1".to_string(),
    );
    headers
}

fn context(entities: serde_json::Value) -> Context {
    let store = Rc::new(MemoryStore::from_json(entities).unwrap());
    Context::new(Some("submission:1".to_string()), headers(), store)
}

fn repository(id: &str) -> Repository {
    Repository {
        id: id.to_string(),
        ..Default::default()
    }
}

fn policy(id: &str) -> Policy {
    Policy {
        id: id.to_string(),
        ..Default::default()
    }
}

fn condition(value: serde_json::Value) -> Condition {
    serde_json::from_value(value).unwrap()
}

#[test]
fn concrete_repositories_pass_through() -> Result<()> {
    let template = Repository {
        name: Some("PubMed Central".to_string()),
        ..repository("7")
    };
    let resolved = RepositoryRules::new().resolve(&template, &mut Passthrough)?;
    assert_eq!(resolved, vec![template]);
    Ok(())
}

#[test]
fn variable_repositories_expand_per_resolved_id() -> Result<()> {
    let template = Repository {
        name: Some("institutional".to_string()),
        ..repository("${header.policy.repositories}")
    };
    let mut vars = Fixed(vec!["7".to_string(), "8".to_string()]);
    let resolved = RepositoryRules::new().resolve(&template, &mut vars)?;
    assert_eq!(
        resolved,
        vec![
            Repository {
                name: Some("institutional".to_string()),
                ..repository("7")
            },
            Repository {
                name: Some("institutional".to_string()),
                ..repository("8")
            },
        ]
    );
    Ok(())
}

#[test]
fn variable_repositories_may_expand_to_nothing() -> Result<()> {
    let template = repository("${grants.repositories}");
    let resolved = RepositoryRules::new().resolve(&template, &mut Fixed(vec![]))?;
    assert!(resolved.is_empty());
    Ok(())
}

#[test]
fn non_numeric_repository_ids_fail() {
    let template = repository("${header.institution}");
    let err = RepositoryRules::new()
        .resolve(&template, &mut Fixed(vec!["jhu".to_string()]))
        .unwrap_err();
    assert!(format!("{err:#}").contains("not a numeric entity id"));
}

// Expansion validates ids as u64 and renders them back, so zero padding
// and an explicit plus sign normalize away.
#[test]
fn ids_normalize_to_canonical_decimal() -> Result<()> {
    let template = repository("${header.policy.repositories}");
    let mut vars = Fixed(vec!["007".to_string(), "+7".to_string()]);
    let resolved = RepositoryRules::new().resolve(&template, &mut vars)?;
    assert_eq!(resolved, vec![repository("7"), repository("7")]);

    let mut ctx = context(json!({}));
    let resolved = PolicyRules::new().resolve(&policy("007"), &mut ctx)?;
    assert_eq!(resolved, vec![policy("7")]);
    Ok(())
}

#[test]
fn concrete_policies_expand_their_repositories() -> Result<()> {
    let template = Policy {
        repositories: vec![repository("${header.policy.repositories}")],
        ..policy("1")
    };
    let mut ctx = context(json!({
        "policies": {"1": {"repositories": ["7", "8"]}},
    }));

    let resolved = PolicyRules::new().resolve(&template, &mut ctx)?;
    assert_eq!(
        resolved,
        vec![Policy {
            repositories: vec![repository("7"), repository("8")],
            ..policy("1")
        }]
    );
    Ok(())
}

#[test]
fn conditions_filter_policies() -> Result<()> {
    let rejected = Policy {
        conditions: vec![condition(json!({"equals": ["mit", "${header.institution}"]}))],
        ..policy("1")
    };
    let mut ctx = context(json!({}));
    assert!(PolicyRules::new().resolve(&rejected, &mut ctx)?.is_empty());

    let kept = Policy {
        conditions: vec![condition(json!({"equals": ["jhu", "${header.institution}"]}))],
        ..policy("1")
    };
    let mut ctx = context(json!({}));
    let resolved = PolicyRules::new().resolve(&kept, &mut ctx)?;
    assert_eq!(resolved, vec![kept]);
    Ok(())
}

// Repository templates are expanded before conditions run, so a condition
// can reference values the expansion resolved.
#[test]
fn repositories_expand_before_conditions() -> Result<()> {
    let template = Policy {
        repositories: vec![repository("${header.policy.repositories}")],
        conditions: vec![condition(json!({"equals": ["7", "${repositories}"]}))],
        ..policy("1")
    };
    let mut ctx = context(json!({
        "policies": {"1": {"repositories": ["7"]}},
    }));

    let resolved = PolicyRules::new().resolve(&template, &mut ctx)?;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].repositories, vec![repository("7")]);
    Ok(())
}

#[test]
fn variable_policy_ids_expand_with_a_pinned_context() -> Result<()> {
    let template = Policy {
        title: Some("funder policy".to_string()),
        repositories: vec![repository("${header.policy.repositories}")],
        ..policy("${header.policy.id}")
    };
    let mut ctx = context(json!({
        "policies": {"1": {"id": "1", "repositories": ["7", "8"]}},
    }));

    let resolved = PolicyRules::new().resolve(&template, &mut ctx)?;
    assert_eq!(
        resolved,
        vec![Policy {
            title: Some("funder policy".to_string()),
            repositories: vec![repository("7"), repository("8")],
            ..policy("1")
        }]
    );
    Ok(())
}

#[test]
fn variable_policy_ids_may_expand_to_nothing() -> Result<()> {
    let template = policy("${grants.policy}");
    let mut ctx = context(json!({}));
    assert!(PolicyRules::new().resolve(&template, &mut ctx)?.is_empty());
    Ok(())
}

#[test]
fn non_numeric_policy_ids_fail() {
    let mut ctx = context(json!({}));
    let err = PolicyRules::new()
        .resolve(&policy("abc"), &mut ctx)
        .unwrap_err();
    assert!(format!("{err:#}").contains("not a numeric entity id"));
}

#[test]
fn non_numeric_resolved_policy_ids_fail() {
    let template = policy("${header.institution}");
    let mut ctx = context(json!({}));
    let err = PolicyRules::new().resolve(&template, &mut ctx).unwrap_err();
    assert!(format!("{err:#}").contains("not a numeric entity id"));
}
