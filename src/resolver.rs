// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;

/// The seam through which conditions and template expansion look up
/// variable expressions.
///
/// A resolver takes the raw expression string (delimiters included) and
/// returns the distinct matching values. Non-variable input passes through
/// as a single-element list. Resolution may mutate internal state, e.g. a
/// live context caches every path it walks.
pub trait VariableResolver {
    fn resolve(&mut self, source: &str) -> Result<Vec<String>>;
}

/// The identity resolver: every string resolves to itself.
///
/// Used when conditions are evaluated against literal operands without a
/// live context behind them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl VariableResolver for Passthrough {
    fn resolve(&mut self, source: &str) -> Result<Vec<String>> {
        Ok(vec![source.to_string()])
    }
}
