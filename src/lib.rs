// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod condition;
mod context;
mod dsl;
mod engine;
mod errors;
mod model;
mod resolver;
mod rules;
mod store;
mod value;
mod variable;

pub use condition::Condition;
pub use context::Context;
pub use dsl::{RuleDocument, SCHEMA};
pub use engine::Engine;
pub use errors::ResolveError;
pub use model::{Policy, Repository};
pub use resolver::{Passthrough, VariableResolver};
pub use rules::{PolicyRules, RepositoryRules};
pub use store::{EntityKind, MemoryStore, ObjectSession, ObjectStore};
pub use value::{JsonMap, ResolvedObject, ResolvedValue};
pub use variable::Variable;
