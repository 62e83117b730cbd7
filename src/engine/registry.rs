//! Ordered component registry.
//!
//! Insertion order is load-bearing: it is the order in which parameter
//! fragments are concatenated into the flat parameter vector. Names are
//! unique; adding a duplicate is a validation error.
//!
//! Every mutation bumps `revision`, which parameter tables record so a table
//! built before a change can be recognised as stale.

use crate::error::{Capability, ModelError, ModelResult};
use crate::models::{Capabilities, TimeSeriesComponent};

#[derive(Debug)]
struct Entry {
    component: Box<dyn TimeSeriesComponent>,
    /// Captured once at registration.
    capabilities: Capabilities,
}

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: Vec<Entry>,
    revision: u64,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, component: Box<dyn TimeSeriesComponent>) -> ModelResult<()> {
        let name = component.name();
        if name.trim().is_empty() {
            return Err(ModelError::validation("component name must not be empty"));
        }
        if self.position(name).is_some() {
            return Err(ModelError::validation(format!(
                "a component named `{name}` is already registered"
            )));
        }
        let nparam = component.nparam();
        let fragment = component.parameters().len();
        if fragment != nparam {
            return Err(ModelError::validation(format!(
                "component `{name}` declares {nparam} parameters but lists {fragment}"
            )));
        }

        let capabilities = component.capabilities();
        self.entries.push(Entry {
            component,
            capabilities,
        });
        self.revision += 1;
        Ok(())
    }

    /// Remove a component; any parameter table built before this call is stale.
    pub fn remove(&mut self, name: &str) -> ModelResult<Box<dyn TimeSeriesComponent>> {
        let pos = self.position(name).ok_or_else(|| self.unknown(name))?;
        self.revision += 1;
        Ok(self.entries.remove(pos).component)
    }

    pub fn get(&self, name: &str) -> ModelResult<&dyn TimeSeriesComponent> {
        self.position(name)
            .map(|i| self.entries[i].component.as_ref())
            .ok_or_else(|| self.unknown(name))
    }

    /// Component plus a check that it declared `capability` at registration.
    pub fn get_capable(&self, name: &str, capability: Capability) -> ModelResult<&dyn TimeSeriesComponent> {
        let pos = self.position(name).ok_or_else(|| self.unknown(name))?;
        let entry = &self.entries[pos];
        if !entry.capabilities.supports(capability) {
            return Err(ModelError::CapabilityNotSupported {
                name: name.to_string(),
                capability,
            });
        }
        Ok(entry.component.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.component.name().to_string()).collect()
    }

    /// Components in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn TimeSeriesComponent> {
        self.entries.iter().map(|e| e.component.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn total_nparam(&self) -> usize {
        self.iter().map(|c| c.nparam()).sum()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.component.name() == name)
    }

    fn unknown(&self, name: &str) -> ModelError {
        ModelError::UnknownComponent {
            name: name.to_string(),
            available: self.names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Constant;

    #[test]
    fn preserves_insertion_order() {
        let mut reg = ComponentRegistry::new();
        for name in ["z", "a", "m"] {
            reg.add(Box::new(Constant::new(name, 0.0))).unwrap();
        }
        assert_eq!(reg.names(), ["z", "a", "m"]);
        assert_eq!(reg.total_nparam(), 3);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.add(Box::new(Constant::new("A", 0.0))).unwrap();
        let err = reg.add(Box::new(Constant::new("A", 1.0))).unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_lookup_lists_registered_names() {
        let mut reg = ComponentRegistry::new();
        reg.add(Box::new(Constant::new("A", 0.0))).unwrap();
        reg.add(Box::new(Constant::new("B", 0.0))).unwrap();
        match reg.get("missing_name").unwrap_err() {
            ModelError::UnknownComponent { name, available } => {
                assert_eq!(name, "missing_name");
                assert_eq!(available, ["A", "B"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mutations_bump_revision() {
        let mut reg = ComponentRegistry::new();
        let r0 = reg.revision();
        reg.add(Box::new(Constant::new("A", 0.0))).unwrap();
        let r1 = reg.revision();
        reg.remove("A").unwrap();
        assert!(r1 > r0);
        assert!(reg.revision() > r1);
        assert!(reg.remove("A").is_err());
    }

    #[test]
    fn capability_check_uses_registration_record() {
        let mut reg = ComponentRegistry::new();
        reg.add(Box::new(Constant::new("A", 0.0))).unwrap();
        let err = reg.get_capable("A", Capability::Stress).unwrap_err();
        assert!(matches!(err, ModelError::CapabilityNotSupported { .. }));
    }
}
