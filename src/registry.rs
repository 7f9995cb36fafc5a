//! Injectable registry mapping declarative identifiers to step constructors.
//!
//! The registry is an explicit value, not ambient global state: construct
//! one (usually via [`StepRegistry::with_builtins`]), register step types
//! into it, then hand it by reference to the config loader. Tests build
//! isolated registries of their own.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::error::RegistryError;
use crate::step::Step;

/// Builds a boxed step from the leftover keys of one config entry.
pub type StepBuilder = fn(serde_yaml::Value) -> Result<Box<dyn Step>>;

/// One registered step type: identifier, description, and constructor.
pub struct Registration {
    id: String,
    description: &'static str,
    type_name: &'static str,
    builder: StepBuilder,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Rust type backing this identifier, used in duplicate diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Construct a step instance, treating every key in `args` as a named
    /// constructor argument.
    pub fn build(&self, args: serde_yaml::Value) -> Result<Box<dyn Step>> {
        (self.builder)(args)
    }
}

fn construct<T>(args: serde_yaml::Value) -> Result<Box<dyn Step>>
where
    T: Step + DeserializeOwned + 'static,
{
    let step: T = serde_yaml::from_value(args)?;
    Ok(Box::new(step))
}

/// Mapping from string identifier to constructible step type.
#[derive(Default)]
pub struct StepRegistry {
    entries: BTreeMap<String, Registration>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the whole built-in step catalog.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        crate::steps::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// Associate `id` with step type `T`, constructed by deserializing the
    /// config entry's leftover keys.
    ///
    /// Fails without modifying the registry when `id` is already taken.
    pub fn register<T>(
        &mut self,
        id: &str,
        description: &'static str,
    ) -> Result<(), RegistryError>
    where
        T: Step + DeserializeOwned + 'static,
    {
        if let Some(existing) = self.entries.get(id) {
            return Err(RegistryError::Duplicate {
                id: id.to_string(),
                existing: existing.type_name,
                incoming: std::any::type_name::<T>(),
            });
        }
        self.entries.insert(
            id.to_string(),
            Registration {
                id: id.to_string(),
                description,
                type_name: std::any::type_name::<T>(),
                builder: construct::<T>,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Registration> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All registered identifiers in sorted order, for diagnostics.
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Registrations in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Context;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct AddN {
        n: i64,
    }

    impl Step for AddN {
        fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
            let value = data.as_i64().unwrap_or(0);
            Ok(json!(value + self.n))
        }

        fn name(&self) -> &'static str {
            "add_n"
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Negate {}

    impl Step for Negate {
        fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
            Ok(json!(-data.as_i64().unwrap_or(0)))
        }

        fn name(&self) -> &'static str {
            "negate"
        }
    }

    fn args(yaml: &str) -> serde_yaml::Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn register_and_build() {
        let mut registry = StepRegistry::new();
        registry.register::<AddN>("add_n", "Add a constant").unwrap();

        let reg = registry.get("add_n").unwrap();
        assert_eq!(reg.description(), "Add a constant");

        let step = reg.build(args("n: 4")).unwrap();
        let mut ctx = Context::new();
        assert_eq!(step.run(json!(3), &mut ctx).unwrap(), json!(7));
    }

    #[test]
    fn duplicate_registration_fails_and_leaves_registry_intact() {
        let mut registry = StepRegistry::new();
        registry.register::<AddN>("twice", "first").unwrap();

        let err = registry.register::<Negate>("twice", "second").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("twice"));
        assert!(msg.contains("AddN"));
        assert!(msg.contains("Negate"));

        // The original registration survives the failed attempt.
        assert_eq!(registry.len(), 1);
        let reg = registry.get("twice").unwrap();
        assert_eq!(reg.description(), "first");
        assert!(reg.type_name().contains("AddN"));
    }

    #[test]
    fn identifiers_are_sorted() {
        let mut registry = StepRegistry::new();
        registry.register::<Negate>("negate", "").unwrap();
        registry.register::<AddN>("add_n", "").unwrap();
        assert_eq!(registry.identifiers(), vec!["add_n", "negate"]);
    }

    #[test]
    fn builder_rejects_unknown_arguments() {
        let mut registry = StepRegistry::new();
        registry.register::<AddN>("add_n", "").unwrap();

        let err = registry
            .get("add_n")
            .unwrap()
            .build(args("n: 1\nbogus: true"))
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn lookup_of_unregistered_identifier_is_none() {
        let registry = StepRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }
}
