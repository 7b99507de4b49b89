// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

const VARIABLE_PREFIX: &str = "${";
const VARIABLE_SUFFIX: &str = "}";

/// A dotted path expression of the form `${a.b.c}`, walked one segment at a
/// time.
///
/// A freshly parsed variable is the base of the walk: no segment has been
/// produced yet. Each [`shift`](Variable::shift) advances left-to-right, so
/// walking `${a.b.c}` produces the prefixes `a`, `a.b` and `a.b.c` in that
/// order, after which the walk terminates. [`prev`](Variable::prev) goes the
/// other way, yielding the path one segment shorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    full_name: String,
    segment: String,
    segment_name: String,
    shifted: bool,
}

impl Variable {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            segment: String::new(),
            segment_name: String::new(),
            shifted: false,
        }
    }

    /// True iff `source` is a delimited variable expression.
    pub fn is_variable(source: &str) -> bool {
        source.starts_with(VARIABLE_PREFIX) && source.ends_with(VARIABLE_SUFFIX)
    }

    /// Parse `source` into a base variable, or `None` if it is not a
    /// delimited expression. The stored path never includes the delimiters.
    pub fn to_variable(source: &str) -> Option<Variable> {
        if !Self::is_variable(source) {
            return None;
        }
        let path = &source[VARIABLE_PREFIX.len()..source.len() - VARIABLE_SUFFIX.len()];
        Some(Variable::new(path))
    }

    /// Advance one path segment. The returned variable carries the next
    /// segment appended to the accumulated prefix and has `shifted` set;
    /// once the full path has been consumed, a terminal copy with
    /// `shifted == false` is returned and the traversal loop must stop.
    pub fn shift(&self) -> Variable {
        // Two terminal states end the walk: the whole path has been
        // consumed, or the accumulated prefix no longer lies within it.
        let rest = match self.full_name.get(self.segment_name.len()..) {
            Some(rest) if self.segment_name != self.full_name => rest,
            _ => {
                let mut v = self.clone();
                v.shifted = false;
                return v;
            }
        };

        let rest = rest.strip_prefix('.').unwrap_or(rest);
        let next = match rest.find('.') {
            Some(i) => &rest[..i],
            None => rest,
        };
        let segment_name = if self.segment_name.is_empty() {
            next.to_string()
        } else {
            format!("{}.{next}", self.segment_name)
        };

        Variable {
            full_name: self.full_name.clone(),
            segment: next.to_string(),
            segment_name,
            shifted: true,
        }
    }

    /// True when any component of the path is empty, as in `${.a}` or
    /// `${a..b}`. Such paths cannot be walked.
    pub fn has_empty_segments(&self) -> bool {
        self.full_name.split('.').any(str::is_empty)
    }

    /// The variable one segment shorter; the base variable when at most one
    /// segment has been walked.
    pub fn prev(&self) -> Variable {
        match self.segment_name.rsplit_once('.') {
            Some((head, _)) => Variable {
                full_name: self.full_name.clone(),
                segment: head.rsplit('.').next().unwrap_or(head).to_string(),
                segment_name: head.to_string(),
                shifted: true,
            },
            None => Variable::new(self.full_name.clone()),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The last path component produced by the walk so far.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The accumulated prefix up to and including [`segment`](Variable::segment).
    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }

    pub fn is_shifted(&self) -> bool {
        self.shifted
    }
}
