//! Predicates and ordered filter lists.
//!
//! A [`FilterSet`] is an explicit, ordered list of `(predicate,
//! classification)` pairs. When a message satisfies several filters,
//! the one declared first wins. Precedence is part of the contract,
//! never an accident of storage order.

use std::fmt;
use std::sync::Arc;

use crate::message::Message;
use crate::status::Classification;

/// Message type of keep-alive traffic excluded by the default prefilter.
pub const HEARTBEAT: &str = "Heartbeat";

/// A single-method predicate over a message.
///
/// Implemented for every `Fn(&Message) -> bool + Send + Sync`, so
/// closures work directly; outer call state is captured with `move`.
pub trait Predicate: Send + Sync {
    fn matches(&self, message: &Message) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn matches(&self, message: &Message) -> bool {
        self(message)
    }
}

pub type SharedPredicate = Arc<dyn Predicate>;

/// Default scope prefilter: keep everything except heartbeats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeHeartbeats;

impl Predicate for ExcludeHeartbeats {
    fn matches(&self, message: &Message) -> bool {
        !message.is_type(HEARTBEAT)
    }
}

/// Prefilter that keeps every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Predicate for AcceptAll {
    fn matches(&self, _message: &Message) -> bool {
        true
    }
}

/// A named predicate with the classification it assigns.
#[derive(Clone)]
pub struct Filter {
    name: String,
    classification: Classification,
    predicate: SharedPredicate,
}

impl Filter {
    pub fn new(
        name: impl Into<String>,
        classification: Classification,
        predicate: impl Predicate + 'static,
    ) -> Self {
        Filter {
            name: name.into(),
            classification,
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.predicate.matches(message)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("classification", &self.classification)
            .finish_non_exhaustive()
    }
}

/// Ordered filters; declaration order is precedence order.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet::default()
    }

    /// Append a filter after every filter declared so far.
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn success(self, name: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        self.with(Filter::new(name, Classification::Success, predicate))
    }

    pub fn error(self, name: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        self.with(Filter::new(name, Classification::Error, predicate))
    }

    /// The first filter, in declaration order, that `message` satisfies.
    pub fn classify(&self, message: &Message) -> Option<&Filter> {
        self.filters.iter().find(|filter| filter.matches(message))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        FilterSet {
            filters: iter.into_iter().collect(),
        }
    }
}
