// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::cell::Cell;
use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use serde_json::Value as Json;

/// The two entity kinds a dereference may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Policy,
    Repository,
}

impl EntityKind {
    /// Infer the kind from the path of a dereference URI. `None` for paths
    /// that reference neither a policy nor a repository.
    pub fn from_path(path: &str) -> Option<EntityKind> {
        if path.contains("/policies/") {
            Some(EntityKind::Policy)
        } else if path.contains("/repositories/") {
            Some(EntityKind::Repository)
        } else {
            None
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Policy => write!(f, "policy"),
            EntityKind::Repository => write!(f, "repository"),
        }
    }
}

/// A handle to the remote object store.
///
/// `open` yields a session scoped to a single dereference or one batch of
/// them. Dropping the session releases whatever the backend acquired, on
/// every exit path; sessions never outlive the resolution call that opened
/// them.
pub trait ObjectStore {
    fn open(&self) -> Result<Box<dyn ObjectSession + '_>>;
}

/// One scoped conversation with the store.
pub trait ObjectSession {
    /// Fetch an entity by kind and numeric id as its JSON representation.
    /// Backend timeouts and cancellations surface here as plain errors.
    fn get_object(&mut self, kind: EntityKind, id: u64) -> Result<Json>;
}

/// An in-memory store keyed by entity kind and id.
///
/// Backs tests and the example binary; deployments wire in their own
/// [`ObjectStore`]. The session and fetch counters make the resource
/// scoping observable from the outside.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: BTreeMap<(EntityKind, u64), Json>,
    open_sessions: Cell<usize>,
    fetches: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EntityKind, id: u64, entity: Json) -> &mut Self {
        self.entities.insert((kind, id), entity);
        self
    }

    /// Load a store from `{"policies": {"1": {...}}, "repositories": {...}}`.
    pub fn from_json(data: Json) -> Result<Self> {
        let mut store = Self::new();
        let groups = match data {
            Json::Object(m) => m,
            _ => bail!("store data must be a JSON object"),
        };
        for (group, entities) in groups {
            let kind = match group.as_str() {
                "policies" => EntityKind::Policy,
                "repositories" => EntityKind::Repository,
                _ => bail!("unknown entity group '{group}'"),
            };
            let entities = match entities {
                Json::Object(m) => m,
                _ => bail!("'{group}' must map ids to entities"),
            };
            for (id, entity) in entities {
                let id = id
                    .parse::<u64>()
                    .map_err(|e| anyhow!("invalid {kind} id '{id}': {e}"))?;
                store.add(kind, id, entity);
            }
        }
        Ok(store)
    }

    /// Number of sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.open_sessions.get()
    }

    /// Total entity fetches served so far.
    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl ObjectStore for MemoryStore {
    fn open(&self) -> Result<Box<dyn ObjectSession + '_>> {
        self.open_sessions.set(self.open_sessions.get() + 1);
        Ok(Box::new(MemorySession { store: self }))
    }
}

struct MemorySession<'a> {
    store: &'a MemoryStore,
}

impl ObjectSession for MemorySession<'_> {
    fn get_object(&mut self, kind: EntityKind, id: u64) -> Result<Json> {
        self.store.fetches.set(self.store.fetches.get() + 1);
        match self.store.entities.get(&(kind, id)) {
            Some(entity) => Ok(entity.clone()),
            None => bail!("no {kind} with id {id}"),
        }
    }
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        let open = self.store.open_sessions.get();
        self.store.open_sessions.set(open.saturating_sub(1));
    }
}
