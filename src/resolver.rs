//! Type resolution — event type tag → decode strategy, per domain.
//!
//! Each timeline sub-resource has its own [`Registry`], built once at
//! startup with [`RegistryBuilder`] and read-only afterwards. Lookups never
//! fail: a tag without a registered strategy resolves to the registry's
//! fallback, which keeps the raw payload and marks the event unclassified.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, ResolverError};

/// Timeline sub-resource an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Transactions,
    Details,
    ActivityLog,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Transactions => "transactions",
            Domain::Details => "details",
            Domain::ActivityLog => "activity_log",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw event read from a stream, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedEvent {
    /// Position in the stream, from 0.
    pub sequence: usize,
    pub domain: Domain,
    /// Value of `eventType`, if the payload has one.
    pub type_tag: Option<String>,
    pub payload: Value,
}

impl TypedEvent {
    pub fn new(sequence: usize, domain: Domain, payload: Value) -> Self {
        let type_tag = payload
            .get("eventType")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self {
            sequence,
            domain,
            type_tag,
            payload,
        }
    }

    /// Event with an explicit tag, e.g. a detail response keyed by its parent's type.
    pub fn tagged(sequence: usize, domain: Domain, tag: Option<String>, payload: Value) -> Self {
        Self {
            sequence,
            domain,
            type_tag: tag,
            payload,
        }
    }

    pub fn tag_or_unknown(&self) -> &str {
        self.type_tag.as_deref().unwrap_or("<none>")
    }

    /// `id` field of the payload, when present.
    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

/// Decodes one event into an intermediate of type `T`.
pub trait Strategy<T>: Send + Sync {
    /// Stable name, used in reports and logs.
    fn name(&self) -> &'static str;

    fn decode(&self, event: &TypedEvent) -> Result<T, DecodeError>;
}

/// Outcome of a lookup.
pub struct Resolved<'a, T> {
    pub strategy: &'a dyn Strategy<T>,
    /// False when the fallback was chosen.
    pub classified: bool,
}

/// Immutable per-domain strategy table.
pub struct Registry<T> {
    domain: Domain,
    strategies: HashMap<String, Arc<dyn Strategy<T>>>,
    fallback: Arc<dyn Strategy<T>>,
}

impl<T> Registry<T> {
    pub fn builder(domain: Domain, fallback: impl Strategy<T> + 'static) -> RegistryBuilder<T> {
        RegistryBuilder {
            domain,
            strategies: HashMap::new(),
            fallback: Arc::new(fallback),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Pure lookup; unmapped or missing tags yield the fallback.
    pub fn resolve(&self, tag: Option<&str>) -> Resolved<'_, T> {
        match tag.and_then(|t| self.strategies.get(t)) {
            Some(strategy) => Resolved {
                strategy: strategy.as_ref(),
                classified: true,
            },
            None => Resolved {
                strategy: self.fallback.as_ref(),
                classified: false,
            },
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.strategies.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<_> = self.strategies.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

/// Configuration-time builder for a [`Registry`].
pub struct RegistryBuilder<T> {
    domain: Domain,
    strategies: HashMap<String, Arc<dyn Strategy<T>>>,
    fallback: Arc<dyn Strategy<T>>,
}

impl<T> RegistryBuilder<T> {
    /// Map `tag` to `strategy`. At most one strategy per tag.
    pub fn register(
        self,
        tag: impl Into<String>,
        strategy: impl Strategy<T> + 'static,
    ) -> Result<Self, ResolverError> {
        self.register_shared(tag, Arc::new(strategy))
    }

    /// Map `tag` to a strategy shared with other tags.
    pub fn register_shared(
        mut self,
        tag: impl Into<String>,
        strategy: Arc<dyn Strategy<T>>,
    ) -> Result<Self, ResolverError> {
        let tag = tag.into();
        if self.strategies.contains_key(&tag) {
            return Err(ResolverError::DuplicateTag {
                domain: self.domain.to_string(),
                tag,
            });
        }
        self.strategies.insert(tag, strategy);
        Ok(self)
    }

    /// Map every tag in `tags` to the same strategy.
    pub fn register_all(
        mut self,
        tags: &[&str],
        strategy: impl Strategy<T> + 'static,
    ) -> Result<Self, ResolverError> {
        let shared: Arc<dyn Strategy<T>> = Arc::new(strategy);
        for tag in tags {
            self = self.register_shared(*tag, Arc::clone(&shared))?;
        }
        Ok(self)
    }

    pub fn build(self) -> Registry<T> {
        Registry {
            domain: self.domain,
            strategies: self.strategies,
            fallback: self.fallback,
        }
    }
}
