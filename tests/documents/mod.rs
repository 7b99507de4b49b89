// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use resolvus::{Engine, MemoryStore};
use serde::Deserialize;
use serde_json::Value as Json;
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct TestCase {
    note: String,
    rules: Json,
    submission: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    data: Option<Json>,
    #[serde(default)]
    want_policies: Option<Json>,
    #[serde(default)]
    want_repositories: Option<Json>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn eval_case(case: &TestCase) -> Result<(Json, Json)> {
    let mut engine = Engine::new();
    engine.load_rules(&case.rules.to_string())?;
    if let Some(data) = &case.data {
        engine.set_store(Rc::new(MemoryStore::from_json(data.clone())?));
    }

    let policies = engine.find_policies(&case.submission, &case.headers)?;
    let repositories = engine.find_repositories(&case.submission, &case.headers)?;
    Ok((
        serde_json::to_value(policies)?,
        serde_json::to_value(repositories)?,
    ))
}

fn expect_json(what: &str, computed: &Json, expected: &Json) -> Result<()> {
    if computed != expected {
        bail!(
            "{what} mismatch:\nleft  = {}\nright = {}",
            serde_json::to_string_pretty(computed)?,
            serde_json::to_string_pretty(expected)?
        );
    }
    Ok(())
}

fn run_case(case: &TestCase) -> Result<()> {
    match eval_case(case) {
        Ok((policies, repositories)) => {
            if let Some(expected) = &case.error {
                bail!("expected an error containing `{expected}`, got policies {policies}");
            }
            if let Some(want) = &case.want_policies {
                expect_json("policies", &policies, want)?;
            }
            if let Some(want) = &case.want_repositories {
                expect_json("repositories", &repositories, want)?;
            }
            Ok(())
        }
        Err(actual) => match &case.error {
            Some(expected) => {
                let rendered = format!("{actual:#}");
                if !rendered.contains(expected) {
                    bail!("error `{rendered}` does not contain `{expected}`");
                }
                Ok(())
            }
            None => Err(actual),
        },
    }
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml)?;

    println!("running {file}");
    for case in &test.cases {
        print!("case {} ", case.note);
        run_case(case)?;
        println!("passed");
    }
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test]
fn basic() -> Result<()> {
    yaml_test("tests/documents/cases/basic.yaml")
}

#[test]
fn conditions() -> Result<()> {
    yaml_test("tests/documents/cases/conditions.yaml")
}

#[test]
fn dereference() -> Result<()> {
    yaml_test("tests/documents/cases/dereference.yaml")
}

#[test]
fn absent() -> Result<()> {
    yaml_test("tests/documents/cases/absent.yaml")
}

#[test]
fn errors() -> Result<()> {
    yaml_test("tests/documents/cases/errors.yaml")
}

#[test]
#[ignore = "intended for running a single case file by hand"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();
    for a in std::env::args() {
        if a.ends_with(".yaml") {
            file = a;
        }
    }

    if file.is_empty() {
        bail!("missing <yaml-file>");
    }

    yaml_test(file.as_str())
}

// Sweep the whole cases directory so a file that loses its named test
// above still runs.
#[test]
fn all_documents() {
    let mut failures = vec![];
    for entry in WalkDir::new("tests/documents/cases")
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path().to_string_lossy().to_string();
        if !path.ends_with(".yaml") {
            continue;
        }
        if let Err(e) = yaml_test_impl(&path) {
            failures.push((path, e));
        }
    }

    if !failures.is_empty() {
        dbg!(failures);
        panic!("failed");
    }
}
