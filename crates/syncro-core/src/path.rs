//! Session path addressing
//!
//! A syncro path names one floating document:
//!
//! ```text
//! ENTITY::UUID            projects::11111111-1111-1111-1111-111111111111
//! ENTITY::UUID::RELATION  projects::11111111-1111-1111-1111-111111111111::members
//! ```
//!
//! The realtime store addresses the same document as collection `ENTITY`
//! and document id `UUID` or `UUID::RELATION`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{SyncroError, SyncroResult};
use crate::registry::EntityRegistry;

/// Separator between path segments
pub const SEPARATOR: &str = "::";

/// Trailing marker for namespace-style relations
pub const WILDCARD: char = '*';

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z0-9_]+)::([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:::([A-Za-z0-9_\-]+\*?))?$",
    )
    .expect("path pattern is valid")
});

/// Options for [`parse`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions<'a> {
    /// Accept a relation ending in `*`
    pub allow_wildcard: bool,
    /// Restrict entities to the registry's names
    pub registry: Option<&'a EntityRegistry>,
}

impl<'a> ParseOptions<'a> {
    pub fn with_registry(registry: &'a EntityRegistry) -> Self {
        Self {
            allow_wildcard: false,
            registry: Some(registry),
        }
    }

    pub fn allow_wildcard(mut self) -> Self {
        self.allow_wildcard = true;
        self
    }
}

/// A parsed syncro path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SyncroPath {
    pub entity: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl SyncroPath {
    /// Realtime store collection holding this document
    pub fn collection(&self) -> &str {
        &self.entity
    }

    /// Realtime store document id
    pub fn doc_id(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}{}{}", self.id, SEPARATOR, relation),
            None => self.id.clone(),
        }
    }

    /// Whether the relation is a namespace wildcard
    pub fn is_wildcard(&self) -> bool {
        self.relation
            .as_deref()
            .is_some_and(|r| r.ends_with(WILDCARD))
    }
}

impl fmt::Display for SyncroPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.entity, SEPARATOR, self.doc_id())
    }
}

impl FromStr for SyncroPath {
    type Err = SyncroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s, ParseOptions::default())
    }
}

/// Parse a path string
pub fn parse(path: &str, options: ParseOptions<'_>) -> SyncroResult<SyncroPath> {
    let syntax_error = || SyncroError::PathSyntax {
        path: path.to_string(),
    };

    let caps = PATH_RE.captures(path).ok_or_else(syntax_error)?;
    let entity = caps[1].to_string();
    let id = caps[2].to_string();
    let relation = caps.get(3).map(|m| m.as_str().to_string());

    if let Some(relation) = &relation {
        if relation.ends_with(WILDCARD) && !options.allow_wildcard {
            return Err(syntax_error());
        }
    }

    if let Some(registry) = options.registry {
        if !registry.contains(&entity) {
            return Err(SyncroError::UnsupportedEntity { entity });
        }
    }

    Ok(SyncroPath {
        entity,
        id,
        relation,
    })
}

/// Check a path without keeping the result
pub fn validate(path: &str, options: ParseOptions<'_>) -> SyncroResult<()> {
    parse(path, options).map(|_| ())
}
