// ABOUTME: In-memory handler registry with compile-at-registration triggers.
// ABOUTME: Supports concurrent appends and copy-on-read snapshots for dispatch.

use std::sync::{Arc, RwLock};

use regex::Regex;
use thiserror::Error;

/// Registration failures, reported synchronously to the caller.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid trigger pattern {pattern:?} for handler {name:?}: {source}")]
    InvalidTrigger {
        name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One registered handler with its trigger compiled, ready for matching.
#[derive(Debug)]
pub struct Entry {
    pub name: String,
    pub address: String,
    pub usage: String,
    trigger: Regex,
}

impl Entry {
    /// Build an entry from a wire descriptor, compiling the trigger.
    ///
    /// A descriptor with an invalid pattern is rejected here and never
    /// stored; a bad pattern fails at registration, not at dispatch.
    pub fn new(handler: botrpc::Handler) -> Result<Self, RegistryError> {
        let trigger =
            Regex::new(&handler.trigger).map_err(|source| RegistryError::InvalidTrigger {
                name: handler.name.clone(),
                pattern: handler.trigger.clone(),
                source,
            })?;

        Ok(Self {
            name: handler.name,
            address: handler.address,
            usage: handler.usage,
            trigger,
        })
    }

    /// Test the compiled trigger against a message body. Unanchored patterns
    /// match anywhere; anchoring is up to the pattern itself.
    pub fn matches(&self, body: &str) -> bool {
        self.trigger.is_match(body)
    }

    /// The trigger pattern as registered.
    pub fn trigger(&self) -> &str {
        self.trigger.as_str()
    }
}

/// Insertion-ordered collection of handlers, append-only in practice.
///
/// Shared between the registration endpoint (writer) and the dispatcher
/// (reader). Snapshots are copies: later appends never mutate a snapshot
/// already handed out.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a handler descriptor.
    ///
    /// The entry is fully constructed before the write lock is taken, so a
    /// concurrent snapshot can never observe a half-initialized entry.
    /// Duplicate names are permitted; later registrations do not replace
    /// earlier ones, and all matching entries fire.
    pub fn add(&self, handler: botrpc::Handler) -> Result<(), RegistryError> {
        let entry = Arc::new(Entry::new(handler)?);
        let mut entries = self.entries.write().expect("registry lock poisoned");
        entries.push(entry);
        Ok(())
    }

    /// Point-in-time view of the registry in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.entries.read().expect("registry lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
