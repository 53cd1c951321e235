//! Rule type registry.
//!
//! Maps rule type names to constructors. Built-in rules are registered by
//! [`RuleRegistry::with_builtins`]; custom rules are added with
//! [`RuleRegistry::register`]. Registering a name again replaces the
//! previous constructor.
//!
//! A process-wide registry is available through [`global`]. Engines take a
//! snapshot (`Arc`) of it when they start, so registrations made while a
//! run is in progress never affect that run.

use crate::rules::{Rule, RuleFamily, register_builtins};
use crate::{RuleConfigError, RuleParams};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use strsim::jaro_winkler;

/// Builds a rule from its parameters.
pub type RuleConstructor = Arc<dyn Fn(&RuleParams) -> Result<Rule, RuleConfigError> + Send + Sync>;

/// Minimum similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Clone)]
struct Entry {
    family: Option<RuleFamily>,
    /// Whether a `reference_file` param makes the rule read another file.
    reads_reference: bool,
    constructor: RuleConstructor,
}

/// Name-to-constructor map.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in rule.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Registers a custom rule type, replacing any previous binding.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&RuleParams) -> Result<Rule, RuleConfigError> + Send + Sync + 'static,
    {
        // A custom rule may be cross-source; its reference is honoured.
        self.insert(name.into(), None, true, Arc::new(constructor));
    }

    pub(crate) fn register_family<F>(&mut self, name: &str, family: RuleFamily, constructor: F)
    where
        F: Fn(&RuleParams) -> Result<Rule, RuleConfigError> + Send + Sync + 'static,
    {
        let reads_reference = family == RuleFamily::CrossSource;
        self.insert(name.to_string(), Some(family), reads_reference, Arc::new(constructor));
    }

    /// Marks a built-in of another family as reading `reference_file` when given.
    pub(crate) fn accept_reference(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.reads_reference = true;
        }
    }

    fn insert(&mut self, name: String, family: Option<RuleFamily>, reads_reference: bool, constructor: RuleConstructor) {
        let entry = Entry {
            family,
            reads_reference,
            constructor,
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            tracing::debug!(rule = %name, "rule type re-registered");
        }
    }

    /// Builds a rule of type `name`.
    ///
    /// # Errors
    ///
    /// `UnknownRuleType` (with the closest registered name, if any) when
    /// `name` is not registered, or whatever the constructor reports.
    pub fn create(&self, name: &str, params: &RuleParams) -> Result<Rule, RuleConfigError> {
        match self.entries.get(name) {
            Some(entry) => (entry.constructor)(params),
            None => Err(RuleConfigError::UnknownRuleType {
                name: name.to_string(),
                suggestion: self.suggest(name),
            }),
        }
    }

    /// Whether a rule type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Family of a built-in rule type; `None` for custom or unknown types.
    pub fn family(&self, name: &str) -> Option<RuleFamily> {
        self.entries.get(name).and_then(|entry| entry.family)
    }

    /// Whether a rule of type `name` depends on the file named by its
    /// `reference_file` param. `false` for unknown types.
    pub fn reads_reference(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.reads_reference)
    }

    /// Closest registered name to `name`, when one is similar enough.
    pub fn suggest(&self, name: &str) -> Option<String> {
        let wanted = name.to_lowercase();
        self.entries
            .keys()
            .map(|candidate| (jaro_winkler(&wanted, &candidate.to_lowercase()), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, candidate)| candidate.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static GLOBAL: Lazy<RwLock<Arc<RuleRegistry>>> = Lazy::new(|| RwLock::new(Arc::new(RuleRegistry::with_builtins())));

/// Snapshot of the process-wide registry.
pub fn global() -> Arc<RuleRegistry> {
    match GLOBAL.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Registers a custom rule type in the process-wide registry.
///
/// Runs already in progress keep the snapshot they started with.
pub fn register_global<F>(name: impl Into<String>, constructor: F)
where
    F: Fn(&RuleParams) -> Result<Rule, RuleConfigError> + Send + Sync + 'static,
{
    let mut guard = match GLOBAL.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    Arc::make_mut(&mut guard).register(name, constructor);
}
