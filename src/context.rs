// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::ResolveError;
use crate::resolver::VariableResolver;
use crate::store::{EntityKind, ObjectSession, ObjectStore};
use crate::value::{JsonMap, ResolvedObject, ResolvedValue};
use crate::variable::Variable;

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Context as _, Result};
use log::debug;
use serde_json::Value as Json;
use url::Url;

/// The per-request resolution environment.
///
/// A context carries the submission, the request headers and a path-keyed
/// map of everything resolved so far. It is created for one request,
/// mutated freely while that request resolves, and discarded afterwards;
/// nothing in here is shared across requests.
#[derive(Clone)]
pub struct Context {
    submission: Option<String>,
    headers: BTreeMap<String, String>,
    values: BTreeMap<String, ResolvedValue>,
    store: Rc<dyn ObjectStore>,
    source: Option<String>,
    initialized: bool,
}

impl Context {
    pub fn new(
        submission: Option<String>,
        headers: BTreeMap<String, String>,
        store: Rc<dyn ObjectStore>,
    ) -> Self {
        Self {
            submission,
            headers,
            values: BTreeMap::new(),
            store,
            source: None,
            initialized: false,
        }
    }

    /// Seed the environment on first use: the submission under
    /// `submission`, all request headers as one object under `header`.
    /// Later calls are no-ops.
    pub fn init(&mut self, source: &str) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let submission = match &self.submission {
            Some(s) => s.clone(),
            None => bail!(ResolveError::MissingSubmission),
        };
        if self.headers.is_empty() {
            bail!(ResolveError::MissingHeaders);
        }

        debug!("initializing resolution context for submission '{submission}'");
        self.values
            .insert("submission".to_string(), ResolvedValue::Scalar(submission));
        self.values.insert(
            "header".to_string(),
            ResolvedValue::Object(self.header_object(source)),
        );
        self.source = Some(source.to_string());
        self.initialized = true;
        Ok(())
    }

    fn header_object(&self, source: &str) -> ResolvedObject {
        let mut fields = JsonMap::new();
        for (k, v) in &self.headers {
            fields.insert(k.clone(), Json::String(v.clone()));
        }
        ResolvedObject::new(source, fields)
    }

    /// The value stored at `path`, or [`ResolvedValue::Absent`] when the
    /// path has not been bound.
    pub fn value_of(&self, path: &str) -> &ResolvedValue {
        self.values.get(path).unwrap_or(&ResolvedValue::Absent)
    }

    /// Resolve `source` to its list of concrete values.
    ///
    /// Non-variable input passes through unchanged. A variable expression
    /// is walked segment by segment (`a`, `a.b`, `a.b.c`), dereferencing
    /// objects as needed, and the value at the full path is classified into
    /// a distinct string list. A path that never produced a value resolves
    /// to the empty list; absence is a no-match, not an error. A path with
    /// an empty segment cannot be walked and fails to parse.
    pub fn resolve(&mut self, source: &str) -> Result<Vec<String>> {
        self.init(source)
            .context("unable to initialize resolution context")?;

        let variable = match Variable::to_variable(source) {
            Some(v) => v,
            None => return Ok(vec![source.to_string()]),
        };
        if variable.has_empty_segments() {
            bail!(ResolveError::ParseError(
                source.to_string(),
                "the path has an empty segment".to_string(),
            ));
        }

        debug!("resolving ${{{}}}", variable.full_name());
        // One segment is produced per step, so a walk can never need more
        // steps than the path has segments.
        let segments = variable.full_name().split('.').count();
        let mut remaining = segments;
        let mut segment = variable.shift();
        while segment.is_shifted() {
            if remaining == 0 {
                bail!(
                    "variable '{}' did not settle within {segments} segments",
                    variable.full_name()
                );
            }
            remaining -= 1;
            self.resolve_segment(&segment).with_context(|| {
                format!(
                    "could not resolve variable segment '{}'",
                    segment.segment_name()
                )
            })?;
            segment = segment.shift();
        }

        match self.value_of(variable.full_name()) {
            ResolvedValue::Absent => Ok(vec![]),
            ResolvedValue::Scalar(s) => Ok(vec![s.clone()]),
            ResolvedValue::ScalarList(l) => Ok(unique(l.clone())),
            ResolvedValue::Object(o) => Ok(vec![o.source().to_string()]),
            ResolvedValue::ObjectList(l) => {
                Ok(unique(l.iter().map(|o| o.source().to_string()).collect()))
            }
        }
    }

    // Resolving a segment is a no-op when its value is already present, and
    // when the segment is the first of its path (there is no parent to walk
    // from). Otherwise the parent's shape decides: objects get the field
    // extracted, scalars are first promoted to objects by dereference or
    // literal parse and then re-visited. A parent is promoted at most once,
    // so two passes always settle the segment.
    fn resolve_segment(&mut self, segment: &Variable) -> Result<()> {
        for _ in 0..2 {
            if !self.value_of(segment.segment_name()).is_absent() {
                return Ok(());
            }
            let parent = segment.prev();
            if parent.segment_name().is_empty() {
                return Ok(());
            }

            match self.value_of(parent.segment_name()).clone() {
                ResolvedValue::Object(object) => return self.extract_value(segment, &object),
                ResolvedValue::ObjectList(objects) => {
                    return self.extract_values(segment, &objects)
                }
                ResolvedValue::Scalar(value) => {
                    self.resolve_to_object(&parent, &value)?;
                }
                ResolvedValue::ScalarList(values) => {
                    self.resolve_to_objects(&parent, &values).with_context(|| {
                        format!(
                            "could not resolve all sources in '{}'",
                            parent.segment_name()
                        )
                    })?;
                }
                ResolvedValue::Absent => {
                    // The parent never resolved; absence flows downward.
                    self.values.insert(
                        segment.segment_name().to_string(),
                        ResolvedValue::ScalarList(vec![]),
                    );
                    self.values.insert(
                        segment.segment().to_string(),
                        ResolvedValue::ScalarList(vec![]),
                    );
                    return Ok(());
                }
            }
        }

        bail!(
            "variable segment '{}' did not settle after object promotion",
            segment.segment_name()
        )
    }

    // A single object parent: the field must be a string, or missing. The
    // value is stored under the full path and under the bare leaf name, so
    // `${properties}` works as a shortcut for `${x.y.properties}` once the
    // longer path has been walked.
    fn extract_value(&mut self, segment: &Variable, object: &ResolvedObject) -> Result<()> {
        let resolved = match object.field(segment.segment()) {
            None | Some(Json::Null) => vec![],
            Some(Json::String(s)) => vec![s.clone()],
            Some(other) => bail!(ResolveError::TypeMismatch {
                path: segment.segment_name().to_string(),
                expected: "a string",
                actual: json_type_name(other).to_string(),
            }),
        };
        self.values.insert(
            segment.segment_name().to_string(),
            ResolvedValue::ScalarList(resolved.clone()),
        );
        self.values.insert(
            segment.segment().to_string(),
            ResolvedValue::ScalarList(resolved),
        );
        Ok(())
    }

    // An object-list parent: gather the field across every object. String
    // fields contribute one value, array fields must contain only strings
    // and contribute all of them, missing and null fields contribute
    // nothing. Duplicates are kept here; distinctness is applied when the
    // full path is classified.
    fn extract_values(&mut self, segment: &Variable, objects: &[ResolvedObject]) -> Result<()> {
        let mut resolved = vec![];
        for object in objects {
            match object.field(segment.segment()) {
                None | Some(Json::Null) => {}
                Some(Json::String(s)) => resolved.push(s.clone()),
                Some(Json::Array(items)) => {
                    for item in items {
                        match item {
                            Json::String(s) => resolved.push(s.clone()),
                            other => bail!(ResolveError::TypeMismatch {
                                path: segment.segment_name().to_string(),
                                expected: "a list of strings",
                                actual: format!("a list containing {}", json_type_name(other)),
                            }),
                        }
                    }
                }
                Some(other) => bail!(ResolveError::TypeMismatch {
                    path: segment.segment_name().to_string(),
                    expected: "a string",
                    actual: json_type_name(other).to_string(),
                }),
            }
        }
        self.values.insert(
            segment.segment_name().to_string(),
            ResolvedValue::ScalarList(resolved.clone()),
        );
        self.values.insert(
            segment.segment().to_string(),
            ResolvedValue::ScalarList(resolved),
        );
        Ok(())
    }

    // Promote a scalar to an object. An HTTP(S) source is dereferenced
    // through a scoped store session; anything else must parse as a JSON
    // object literal. The object lands under the parent's full path and
    // leaf keys.
    fn resolve_to_object(&mut self, v: &Variable, source: &str) -> Result<()> {
        let object = if source.starts_with("http") {
            let store = Rc::clone(&self.store);
            let mut session = store.open()?;
            fetch_object(session.as_mut(), source)
                .with_context(|| format!("unable to resolve source to an object '{source}'"))?
        } else {
            ResolvedObject::from_json_str(source)?
        };
        self.values.insert(
            v.segment_name().to_string(),
            ResolvedValue::Object(object.clone()),
        );
        self.values
            .insert(v.segment().to_string(), ResolvedValue::Object(object));
        Ok(())
    }

    // Promote a list of scalars under a single session; the first failing
    // source aborts the whole batch.
    fn resolve_to_objects(&mut self, v: &Variable, sources: &[String]) -> Result<()> {
        let store = Rc::clone(&self.store);
        let mut session = store.open()?;

        let mut objects = Vec::with_capacity(sources.len());
        for source in sources {
            let object = if source.starts_with("http") {
                fetch_object(session.as_mut(), source)
                    .with_context(|| format!("unable to resolve source to an object '{source}'"))?
            } else {
                ResolvedObject::from_json_str(source)?
            };
            objects.push(object);
        }

        self.values.insert(
            v.segment_name().to_string(),
            ResolvedValue::ObjectList(objects.clone()),
        );
        self.values
            .insert(v.segment().to_string(), ResolvedValue::ObjectList(objects));
        Ok(())
    }

    /// Derive a context with `value` bound under the variable's full path
    /// and leaf keys.
    ///
    /// This is a snapshot substitution, not a merge: the returned values
    /// map holds only the seed entries, one scalar per raw header name, and
    /// the pinned pair. Previously resolved paths do not survive. Pinning a
    /// non-variable returns the context unchanged.
    pub fn pin(&self, variable: &str, value: &str) -> Result<Context> {
        let parsed = match Variable::to_variable(variable) {
            Some(v) => v,
            None => return Ok(self.clone()),
        };

        let submission = match &self.submission {
            Some(s) => s.clone(),
            None => bail!(ResolveError::MissingSubmission),
        };
        if self.headers.is_empty() {
            bail!(ResolveError::MissingHeaders);
        }

        let mut pinned = BTreeMap::new();
        for (k, v) in &self.headers {
            pinned.insert(k.clone(), ResolvedValue::Scalar(v.clone()));
        }
        let source = self
            .source
            .clone()
            .unwrap_or_else(|| variable.to_string());
        pinned.insert("submission".to_string(), ResolvedValue::Scalar(submission));
        pinned.insert(
            "header".to_string(),
            ResolvedValue::Object(self.header_object(&source)),
        );

        let full_name = parsed.full_name();
        let leaf = full_name.rsplit('.').next().unwrap_or(full_name);
        pinned.insert(leaf.to_string(), ResolvedValue::Scalar(value.to_string()));
        pinned.insert(
            full_name.to_string(),
            ResolvedValue::Scalar(value.to_string()),
        );

        debug!("pinned '{variable}' to '{value}'");
        Ok(Context {
            submission: self.submission.clone(),
            headers: self.headers.clone(),
            values: pinned,
            store: Rc::clone(&self.store),
            source: Some(source),
            initialized: true,
        })
    }
}

impl VariableResolver for Context {
    fn resolve(&mut self, source: &str) -> Result<Vec<String>> {
        Context::resolve(self, source)
    }
}

// Dereference an HTTP(S) source: the last path segment is the numeric
// entity id, the path marker names the entity kind.
fn fetch_object(session: &mut dyn ObjectSession, source: &str) -> Result<ResolvedObject> {
    let url =
        Url::parse(source).map_err(|e| ResolveError::ParseError(source.to_string(), e.to_string()))?;
    let id = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let id = id.parse::<u64>().map_err(|_| {
        ResolveError::ParseError(source.to_string(), format!("'{id}' is not a numeric id"))
    })?;
    let kind = match EntityKind::from_path(url.path()) {
        Some(kind) => kind,
        None => bail!(ResolveError::UnrecognizedEntityType(source.to_string())),
    };

    debug!("dereferencing {kind} {id} from '{source}'");
    let entity = session.get_object(kind, id)?;
    ResolvedObject::from_entity(source, entity)
}

fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Stable dedup, first occurrence kept. Inputs shorter than two elements
/// come back unchanged.
pub(crate) fn unique<T: PartialEq>(vals: Vec<T>) -> Vec<T> {
    if vals.len() < 2 {
        return vals;
    }
    let mut uniques: Vec<T> = Vec::with_capacity(vals.len());
    for val in vals {
        if !uniques.contains(&val) {
            uniques.push(val);
        }
    }
    uniques
}
