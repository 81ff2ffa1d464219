//! Operation registry
//!
//! Maps stage names to operation constructors. Every registry starts with
//! the builtin operations; more can be added at runtime with
//! [`OperationRegistry::register`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::operation::{BuiltinOperation, ExternalOperation, Operation};
use super::spec::{parse_stages, Stage, ARG_SEPARATOR, STAGE_SEPARATOR};
use crate::error::RenditionError;

/// Builds an external operation from raw stage arguments
pub type OperationFactory =
    Arc<dyn Fn(&[&str]) -> Result<Box<dyn ExternalOperation>, String> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Builtin(BuiltinOperation),
    External(OperationFactory),
}

#[derive(Clone)]
pub struct OperationRegistry {
    entries: HashMap<String, Entry>,
}

impl OperationRegistry {
    /// A registry holding only the builtin operations
    pub fn new() -> Self {
        let entries = BuiltinOperation::ALL
            .iter()
            .map(|op| (op.name().to_string(), Entry::Builtin(*op)))
            .collect();
        Self { entries }
    }

    /// Register an operation under `name`
    ///
    /// Names must be non-empty, unique, and free of spec separators.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), RenditionError>
    where
        F: Fn(&[&str]) -> Result<Box<dyn ExternalOperation>, String> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RenditionError::Registration(
                "operation name must not be empty".to_string(),
            ));
        }
        if name.contains(STAGE_SEPARATOR) || name.contains(ARG_SEPARATOR) {
            return Err(RenditionError::Registration(format!(
                "operation name '{}' must not contain '{}' or '{}'",
                name, STAGE_SEPARATOR, ARG_SEPARATOR
            )));
        }
        if self.entries.contains_key(name) {
            return Err(RenditionError::Registration(format!(
                "operation '{}' is already registered",
                name
            )));
        }

        tracing::debug!(operation = %name, "Registered image operation");
        self.entries
            .insert(name.to_string(), Entry::External(Arc::new(factory)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a single stage into an operation
    pub fn build(&self, stage: &Stage<'_>) -> Result<Operation, RenditionError> {
        match self.entries.get(stage.name) {
            Some(Entry::Builtin(kind)) => Operation::parse(*kind, &stage.args, stage.raw),
            Some(Entry::External(factory)) => {
                let op = factory(&stage.args)
                    .map_err(|reason| RenditionError::invalid_spec(stage.raw, reason))?;
                Ok(Operation::External(Arc::from(op)))
            }
            None => Err(RenditionError::invalid_spec(
                stage.raw,
                format!("unrecognised operation '{}'", stage.name),
            )),
        }
    }

    /// Parse a whole spec into its ordered operations
    pub fn parse(&self, spec: &str) -> Result<Vec<Operation>, RenditionError> {
        parse_stages(spec)?
            .iter()
            .map(|stage| self.build(stage))
            .collect()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
