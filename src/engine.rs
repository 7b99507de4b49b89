// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::Context;
use crate::dsl::RuleDocument;
use crate::model::{Policy, Repository};
use crate::store::{MemoryStore, ObjectStore};

use std::collections::BTreeMap;
use std::convert::AsRef;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Result};
use log::info;

/// The policy resolution engine.
///
/// Owns the loaded rule document and the store handle, and builds one
/// fresh [`Context`] per find request; nothing resolved for one request
/// leaks into the next.
#[derive(Clone)]
pub struct Engine {
    document: Option<RuleDocument>,
    store: Rc<dyn ObjectStore>,
}

/// Create a default engine.
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with no rules loaded and an empty in-memory store.
    pub fn new() -> Self {
        Self {
            document: None,
            store: Rc::new(MemoryStore::new()),
        }
    }

    /// Replace the store handle dereferences go through.
    pub fn set_store(&mut self, store: Rc<dyn ObjectStore>) {
        self.store = store;
    }

    /// Load a rule document from JSON, replacing any previously loaded one.
    pub fn load_rules(&mut self, json: &str) -> Result<()> {
        self.document = Some(RuleDocument::from_json_str(json)?);
        Ok(())
    }

    pub fn load_rules_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.document = Some(RuleDocument::from_json_file(path)?);
        Ok(())
    }

    #[cfg(feature = "yaml")]
    pub fn load_rules_from_yaml_str(&mut self, yaml: &str) -> Result<()> {
        self.document = Some(RuleDocument::from_yaml_str(yaml)?);
        Ok(())
    }

    #[cfg(feature = "yaml")]
    pub fn load_rules_from_yaml_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.document = Some(RuleDocument::from_yaml_file(path)?);
        Ok(())
    }

    pub fn document(&self) -> Option<&RuleDocument> {
        self.document.as_ref()
    }

    /// The policies applying to `submission` under the loaded rules.
    pub fn find_policies(
        &self,
        submission: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<Policy>> {
        info!("finding policies for submission '{submission}'");
        let document = self.loaded_document()?;
        let mut context = self.new_context(submission, headers);
        document.resolve(&mut context)
    }

    /// The repositories applying to `submission`: the flattened, distinct
    /// repositories of the applying policies.
    pub fn find_repositories(
        &self,
        submission: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<Repository>> {
        info!("finding repositories for submission '{submission}'");
        let document = self.loaded_document()?;
        let mut context = self.new_context(submission, headers);
        document.resolve_repositories(&mut context)
    }

    fn loaded_document(&self) -> Result<&RuleDocument> {
        match &self.document {
            Some(document) => Ok(document),
            None => bail!("no rule document loaded"),
        }
    }

    fn new_context(&self, submission: &str, headers: &BTreeMap<String, String>) -> Context {
        Context::new(
            Some(submission.to_string()),
            headers.clone(),
            Rc::clone(&self.store),
        )
    }
}
