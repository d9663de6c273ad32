//! Collects the errors returned by each target of a multi-target attempt and reduces them
//! into a single error.

use crate::errors::SvcError;
use std::{collections::BTreeMap, marker::PhantomData};

/// The kind of target an error map is keyed by.
pub trait ErrorTarget {
    /// Plural name of the target kind, used when reporting.
    const PLURAL: &'static str;
}

/// Errors keyed by storage host.
#[derive(Debug)]
pub struct Host;
impl ErrorTarget for Host {
    const PLURAL: &'static str = "hosts";
}

/// Errors keyed by cluster id.
#[derive(Debug)]
pub struct Cluster;
impl ErrorTarget for Cluster {
    const PLURAL: &'static str = "clusters";
}

/// Map of per-host errors.
pub type HostErrorMap = ErrorMap<Host>;
/// Map of per-cluster errors.
pub type ClusterErrorMap = ErrorMap<Cluster>;

/// Map from target name to the error it produced.
#[derive(Debug)]
pub struct ErrorMap<K: ErrorTarget> {
    errors: BTreeMap<String, SvcError>,
    _target: PhantomData<K>,
}

impl<K: ErrorTarget> Default for ErrorMap<K> {
    fn default() -> Self {
        Self {
            errors: BTreeMap::new(),
            _target: PhantomData,
        }
    }
}

impl<K: ErrorTarget> ErrorMap<K> {
    /// New empty map.
    pub fn new() -> Self {
        Self::default()
    }
    /// Record the error of the given target, replacing any previous one.
    pub fn add(&mut self, target: impl Into<String>, error: SvcError) {
        self.errors.insert(target.into(), error);
    }
    /// Number of targets which failed.
    pub fn len(&self) -> usize {
        self.errors.len()
    }
    /// Check if no target failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
    /// Get the error recorded for the target.
    pub fn get(&self, target: &str) -> Option<&SvcError> {
        self.errors.get(target)
    }

    /// Reduce the map into a single error.
    /// A single error is returned as is. Errors with identical text on every target are
    /// collapsed into one message, otherwise every target is listed along with its error.
    pub fn to_error(self) -> Option<SvcError> {
        let count = self.errors.len();
        let mut errors = self.errors.into_iter();
        let (first_target, first) = errors.next()?;
        if count == 1 {
            return Some(first);
        }
        let first_text = first.to_string();
        let rest = errors
            .map(|(target, error)| (target, error.to_string()))
            .collect::<Vec<_>>();
        if rest.iter().all(|(_, text)| text == &first_text) {
            return Some(SvcError::AllTargets {
                count,
                targets: K::PLURAL.to_string(),
                message: first_text,
            });
        }
        let details = std::iter::once((first_target, first_text))
            .chain(rest)
            .map(|(target, text)| format!("\n  {target}: {text}"))
            .collect::<String>();
        Some(SvcError::Targets {
            count,
            targets: K::PLURAL.to_string(),
            details,
        })
    }
}
