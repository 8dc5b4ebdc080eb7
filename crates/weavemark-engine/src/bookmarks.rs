use std::collections::BTreeMap;

use log::trace;

use crate::error::EngineError;
use crate::geometry::Span;
use crate::host::DocumentHost;

/// Prefix of engine-internal markers. Like the host application's own hidden
/// markers, names starting with this prefix never surface as bookmarks.
pub const HIDDEN_MARKER_PREFIX: &str = "_";

/// Cache mapping bookmark name to its current span, kept in sync with the
/// host's native marker store.
///
/// The registry is the sole authority on bookmark identity: no other
/// component redefines a bookmark directly. Every mutating call updates the
/// native marker alongside the cache; after a successful call the two never
/// diverge. The cache is not thread-safe and belongs to the single
/// document-owning session.
///
/// Names are stored case-sensitively; `lookup_case_insensitive` is available
/// for call sites that need the relaxed match.
#[derive(Debug, Default)]
pub struct BookmarkRegistry {
    cache: BTreeMap<String, Span>,
}

impl BookmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry primed from the host's current marker set.
    pub fn from_host<H: DocumentHost>(host: &H) -> Self {
        let mut registry = Self::new();
        registry.refresh(host);
        registry
    }

    pub fn exists(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Span> {
        self.cache.get(name).copied()
    }

    pub fn lookup_case_insensitive(&self, name: &str) -> Option<(&str, Span)> {
        self.cache
            .iter()
            .find(|(stored, _)| stored.eq_ignore_ascii_case(name))
            .map(|(stored, span)| (stored.as_str(), *span))
    }

    /// Register a new bookmark. Fails if the name is already taken.
    pub fn create<H: DocumentHost>(
        &mut self,
        host: &mut H,
        name: &str,
        span: Span,
    ) -> Result<(), EngineError> {
        if self.cache.contains_key(name) || host.marker_span(name).is_some() {
            return Err(EngineError::DuplicateBookmark(name.to_string()));
        }
        host.create_marker(name, span)?;
        self.cache.insert(name.to_string(), span);
        Ok(())
    }

    /// Point `name` at `span`, replacing the old underlying marker if any.
    /// Behaves as `create` when the name did not exist.
    pub fn redefine<H: DocumentHost>(
        &mut self,
        host: &mut H,
        name: &str,
        span: Span,
    ) -> Result<(), EngineError> {
        if host.marker_span(name).is_some() {
            host.remove_marker(name)?;
        }
        host.create_marker(name, span)?;
        self.cache.insert(name.to_string(), span);
        Ok(())
    }

    /// Remove the bookmark and its native marker. Not an error if absent;
    /// callers check `exists` first where absence is meaningful.
    pub fn delete<H: DocumentHost>(
        &mut self,
        host: &mut H,
        name: &str,
    ) -> Result<(), EngineError> {
        if self.cache.remove(name).is_none() {
            return Ok(());
        }
        if host.marker_span(name).is_some() {
            host.remove_marker(name)?;
        }
        Ok(())
    }

    /// Rebuild the cache from the host's current marker set. Used after
    /// structural operations the registry did not itself perform, and at
    /// document load.
    pub fn refresh<H: DocumentHost>(&mut self, host: &H) {
        self.cache.clear();
        for name in host.marker_names() {
            if name.starts_with(HIDDEN_MARKER_PREFIX) {
                continue;
            }
            if let Some(span) = host.marker_span(&name) {
                self.cache.insert(name, span);
            }
        }
        trace!("bookmark cache rebuilt, {} entries", self.cache.len());
    }

    pub fn names(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Span)> {
        self.cache.iter().map(|(name, span)| (name.as_str(), *span))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
