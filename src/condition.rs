// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::ResolveError;
use crate::resolver::VariableResolver;
use crate::value::JsonMap;

use std::collections::HashMap;

use anyhow::{bail, Context as _, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub type ComparatorFcn = fn(&str, &str) -> bool;

fn str_equals(a: &str, b: &str) -> bool {
    a == b
}

fn str_ends_with(a: &str, b: &str) -> bool {
    a.ends_with(b)
}

fn str_contains(a: &str, b: &str) -> bool {
    a.contains(b)
}

lazy_static! {
    static ref COMPARATORS: HashMap<&'static str, ComparatorFcn> = {
        let mut m: HashMap<&'static str, ComparatorFcn> = HashMap::new();
        m.insert("equals", str_equals);
        m.insert("endsWith", str_ends_with);
        m.insert("contains", str_contains);
        m
    };
}

/// A boolean predicate over resolved values, deserialized straight from a
/// rule document.
///
/// Every top-level entry maps a combinator to its operands and all entries
/// must pass (logical AND). Pairwise combinators (`equals`, `endsWith`,
/// `contains`) take a two-element operand list; `anyOf` and `noneOf` take
/// a map of pairwise conditions:
///
/// ```json
/// {
///   "endsWith": ["nih.gov", "${submission.grants.primaryFunder.url}"],
///   "anyOf": {
///     "equals": ["jhu", "${header.institution}"],
///     "contains": ["hopkins", "${header.institution}"]
///   }
/// }
/// ```
///
/// An empty condition is vacuously true.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(JsonMap);

impl Condition {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the condition, resolving variable operands through `vars`.
    /// The first failing combinator short-circuits to `false`.
    pub fn apply(&self, vars: &mut dyn VariableResolver) -> Result<bool> {
        for (name, operands) in &self.0 {
            let passes = apply_one(name, operands, vars)
                .with_context(|| format!("could not evaluate condition '{name}'"))?;
            if !passes {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl From<JsonMap> for Condition {
    fn from(fields: JsonMap) -> Self {
        Condition(fields)
    }
}

fn apply_one(name: &str, operands: &Json, vars: &mut dyn VariableResolver) -> Result<bool> {
    match name {
        "anyOf" => any_of(operands, vars),
        "noneOf" => Ok(!any_of(operands, vars)?),
        _ => match COMPARATORS.get(name) {
            Some(test) => each_pair(operands, vars, *test),
            None => bail!(ResolveError::UnknownCondition(name.to_string())),
        },
    }
}

// Each entry is an independent single-combinator condition; the first
// passing entry decides (logical OR).
fn any_of(conditions: &Json, vars: &mut dyn VariableResolver) -> Result<bool> {
    let map = match conditions {
        Json::Object(m) => m,
        other => bail!(ResolveError::InvalidArgument(format!(
            "anyOf/noneOf expect a map of conditions, got {other}"
        ))),
    };
    for (name, operands) in map {
        if !operands.is_array() {
            bail!(ResolveError::InvalidArgument(format!(
                "value of '{name}' is not an operand list: {operands}"
            )));
        }
        if apply_one(name, operands, vars)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// Operand order is fixed by the rule-document wire format: index 1
// resolves to the left operand, index 0 to the right, so
// `endsWith: ["ing", "testing"]` asks whether "testing" ends with "ing".
fn each_pair(operands: &Json, vars: &mut dyn VariableResolver, test: ComparatorFcn) -> Result<bool> {
    let pair = match operands {
        Json::Array(items) => items,
        other => bail!(ResolveError::InvalidArgument(format!(
            "expected a two-element operand list, got {other}"
        ))),
    };
    if pair.len() != 2 {
        bail!(ResolveError::InvalidArgument(format!(
            "expected exactly two operands, got {}",
            pair.len()
        )));
    }

    let a = operand_value(&pair[1], vars)?;
    let b = operand_value(&pair[0], vars)?;
    Ok(test(&a, &b))
}

// Resolve one operand to a single string. Variables resolve through the
// supplied resolver, literals pass through it unchanged. An empty
// resolution compares as the empty string.
fn operand_value(operand: &Json, vars: &mut dyn VariableResolver) -> Result<String> {
    let source = match operand {
        Json::String(s) => s,
        other => bail!(ResolveError::InvalidArgument(format!(
            "operand must be a string, got {other}"
        ))),
    };
    single_valued(vars.resolve(source)?, source)
}

fn single_valued(mut vals: Vec<String>, path: &str) -> Result<String> {
    match vals.len() {
        0 => Ok(String::new()),
        1 => Ok(vals.remove(0)),
        _ => bail!(ResolveError::MultiValuedWhereScalarExpected(
            path.to_string()
        )),
    }
}
