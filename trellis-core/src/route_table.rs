//! Route table: compiled matchers over the registered path patterns.
//!
//! Two strategies are chosen once, when the table is built:
//!
//! - [`StaticRoutes`]: exact, case-insensitive lookup of the whole path.
//! - [`ParamRoutes`]: segment-wise matching with `{name}` captures.
//!
//! If any registered pattern contains a variable segment the whole table is
//! parametrized; the two strategies are never mixed.

use crate::binding::RouteBinding;
use crate::context::PathVariables;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Result of a successful path lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub bindings: &'a [Arc<RouteBinding>],
    /// Present only for parametrized tables
    pub path_variables: Option<PathVariables>,
}

/// Lookup contract shared by both strategies.
pub trait RouteLookup {
    fn has_route(&self, path: &str) -> bool;

    fn get_route(&self, path: &str) -> Option<RouteMatch<'_>>;
}

/// Variable segment name, if `segment` is `{name}` with a non-empty name.
pub fn variable_name(segment: &str) -> Option<&str> {
    if segment.len() < 3 {
        return None;
    }
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?.trim();
    if inner.is_empty() { None } else { Some(inner) }
}

pub fn has_variable_segment(pattern: &str) -> bool {
    pattern.split('/').any(|s| variable_name(s).is_some())
}

// ========== Static strategy ==========

#[derive(Debug, Default)]
pub struct StaticRoutes {
    routes: HashMap<String, Vec<Arc<RouteBinding>>>,
    patterns: Vec<String>,
}

impl StaticRoutes {
    pub fn new(groups: Vec<(String, Vec<Arc<RouteBinding>>)>) -> Self {
        let mut table = Self::default();
        for (pattern, bindings) in groups {
            match table.routes.entry(pattern.to_lowercase()) {
                Entry::Occupied(mut entry) => entry.get_mut().extend(bindings),
                Entry::Vacant(entry) => {
                    entry.insert(bindings);
                    table.patterns.push(pattern);
                }
            }
        }
        table
    }
}

impl RouteLookup for StaticRoutes {
    fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(&path.to_lowercase())
    }

    fn get_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.get(&path.to_lowercase()).map(|bindings| RouteMatch {
            bindings,
            path_variables: None,
        })
    }
}

// ========== Parametrized strategy ==========

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Lower-cased at compile time
    Literal(String),
    Variable(String),
}

/// One compiled pattern and the bindings registered at it.
#[derive(Debug)]
pub struct CompiledPattern {
    pattern: String,
    segments: Vec<Segment>,
    bindings: Vec<Arc<RouteBinding>>,
}

impl CompiledPattern {
    pub fn compile(pattern: impl Into<String>, bindings: Vec<Arc<RouteBinding>>) -> Self {
        let pattern = pattern.into();
        let segments = pattern
            .split('/')
            .map(|s| match variable_name(s) {
                Some(name) => Segment::Variable(name.to_string()),
                None => Segment::Literal(s.to_lowercase()),
            })
            .collect();
        Self {
            pattern,
            segments,
            bindings,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Captured variables when `path` matches every literal segment.
    pub fn matches(&self, path: &str) -> Option<PathVariables> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut variables = PathVariables::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if *literal != part.to_lowercase() {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    variables.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(variables)
    }
}

#[derive(Debug, Default)]
pub struct ParamRoutes {
    patterns: Vec<CompiledPattern>,
}

impl ParamRoutes {
    pub fn new(groups: Vec<(String, Vec<Arc<RouteBinding>>)>) -> Self {
        Self {
            patterns: groups
                .into_iter()
                .map(|(pattern, bindings)| CompiledPattern::compile(pattern, bindings))
                .collect(),
        }
    }
}

impl RouteLookup for ParamRoutes {
    fn has_route(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path).is_some())
    }

    fn get_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.patterns.iter().find_map(|p| {
            p.matches(path).map(|variables| RouteMatch {
                bindings: &p.bindings,
                path_variables: Some(variables),
            })
        })
    }
}

// ========== Table ==========

/// The compiled route table. Immutable once built.
#[derive(Debug)]
pub enum RouteTable {
    Static(StaticRoutes),
    Param(ParamRoutes),
}

impl RouteTable {
    /// Compile `(pattern, bindings)` groups, in registration order.
    pub fn build(groups: Vec<(String, Vec<Arc<RouteBinding>>)>) -> Self {
        if groups.iter().any(|(pattern, _)| has_variable_segment(pattern)) {
            RouteTable::Param(ParamRoutes::new(groups))
        } else {
            RouteTable::Static(StaticRoutes::new(groups))
        }
    }

    pub fn is_parametrized(&self) -> bool {
        matches!(self, RouteTable::Param(_))
    }

    /// Registered patterns in registration order
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            RouteTable::Static(s) => s.patterns.iter().map(String::as_str).collect(),
            RouteTable::Param(p) => p.patterns.iter().map(CompiledPattern::pattern).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RouteTable::Static(s) => s.patterns.len(),
            RouteTable::Param(p) => p.patterns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteLookup for RouteTable {
    fn has_route(&self, path: &str) -> bool {
        match self {
            RouteTable::Static(s) => s.has_route(path),
            RouteTable::Param(p) => p.has_route(path),
        }
    }

    fn get_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        match self {
            RouteTable::Static(s) => s.get_route(path),
            RouteTable::Param(p) => p.get_route(path),
        }
    }
}
