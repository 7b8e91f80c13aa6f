//! Driver registry: persisted discriminant name to constructor.
//!
//! The resolution layer materializes drivers lazily from their persisted name;
//! the registry is the single place that mapping lives, instead of a type
//! switch spread across call sites.

use crate::local::{LocalDriver, LOCAL_DRIVER_NAME};
use crate::traits::Driver;
use std::collections::HashMap;
use std::sync::Arc;

type DriverCtor = Box<dyn Fn() -> Arc<dyn Driver> + Send + Sync>;

/// Fixed mapping from persisted driver names to variant constructors.
pub struct DriverRegistry {
    ctors: HashMap<String, DriverCtor>,
}

impl DriverRegistry {
    /// An empty registry; useful for tests that install their own variants.
    pub fn empty() -> Self {
        DriverRegistry {
            ctors: HashMap::new(),
        }
    }

    /// Register a constructor for a persisted driver name.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Arc<dyn Driver> + Send + Sync + 'static,
    {
        self.ctors.insert(name.into(), Box::new(ctor));
    }

    /// Construct the driver variant for a persisted name, if known.
    pub fn build(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.ctors.get(name).map(|ctor| ctor())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }
}

impl Default for DriverRegistry {
    /// Registry of the known driver variants: local disk today.
    fn default() -> Self {
        let mut registry = DriverRegistry::empty();
        registry.register(LOCAL_DRIVER_NAME, || Arc::new(LocalDriver::new()));
        registry
    }
}
