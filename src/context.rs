//! Per-unit mutable generation state.
//!
//! Every registry the builder and emitter share lives on [`GenContext`]. The driver resets it at the start of each
//! unit; the emitter resets the emission part at the start of each emission, so emitting the same tree twice gives
//! byte-identical output.

use std::collections::{BTreeSet, HashMap};

use crate::classify::Classification;

#[derive(Debug, Default)]
pub struct GenContext {
    /// Identifier → number of times it has been handed out.
    identifiers: HashMap<String, usize>,
    classifications: HashMap<String, Classification>,
    used_types: BTreeSet<String>,
    wrapped_types: BTreeSet<String>,
    exported_types: BTreeSet<String>,
    next_adapter_token: u32,
}

impl GenContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything (start of a unit).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget handed-out identifiers (after a reparse).
    pub fn reset_identifiers(&mut self) {
        self.identifiers.clear();
    }

    /// Forget classification and type registries (start of an emission).
    pub fn reset_emission(&mut self) {
        self.classifications.clear();
        self.used_types.clear();
        self.wrapped_types.clear();
        self.exported_types.clear();
        self.next_adapter_token = 0;
    }

    /// `base` the first time, then `base1`, `base2`, ...
    pub fn unique_identifier(&mut self, base: &str) -> String {
        let mut n = self.identifiers.get(base).copied().unwrap_or(0);
        loop {
            let id = match n {
                0 => base.to_string(),
                n => format!("{base}{n}"),
            };
            n += 1;
            // a suffixed name may already be taken as a base of its own
            if id == base || !self.identifiers.contains_key(&id) {
                self.identifiers.insert(base.to_string(), n);
                if id != base {
                    self.identifiers.insert(id.clone(), 1);
                }
                return id;
            }
        }
    }

    pub(crate) fn cached_classification(&self, canonical: &str) -> Option<&Classification> {
        self.classifications.get(canonical)
    }

    pub(crate) fn cache_classification(&mut self, canonical: String, classification: Classification) {
        self.classifications.insert(canonical, classification);
    }

    pub(crate) fn next_adapter_token(&mut self) -> u32 {
        let token = self.next_adapter_token;
        self.next_adapter_token += 1;
        token
    }

    pub fn record_used(&mut self, spelling: impl Into<String>) {
        self.used_types.insert(spelling.into());
    }

    pub fn record_wrapped(&mut self, pointee: impl Into<String>) {
        self.wrapped_types.insert(pointee.into());
    }

    pub fn record_exported(&mut self, spelling: impl Into<String>) {
        self.exported_types.insert(spelling.into());
    }

    pub fn used_types(&self) -> &BTreeSet<String> {
        &self.used_types
    }

    pub fn wrapped_types(&self) -> &BTreeSet<String> {
        &self.wrapped_types
    }

    pub fn exported_types(&self) -> &BTreeSet<String> {
        &self.exported_types
    }

    /// Types seen in signatures that this unit neither exports nor wraps.
    pub fn unbound_used_types(&self) -> impl Iterator<Item = &str> {
        self.used_types
            .iter()
            .filter(|t| !self.exported_types.contains(*t) && !self.wrapped_types.contains(*t))
            .map(String::as_str)
    }
}
