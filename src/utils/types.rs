use std::fmt::Debug;
use std::sync::Arc;

use crate::utils::generate_id;

/// Source of room identifiers used by the registry.
///
/// Swappable so that tests can force collisions.
#[derive(Clone)]
pub struct IdGenerator(Arc<dyn Fn() -> String + Send + Sync>);

impl IdGenerator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        IdGenerator(Arc::new(f))
    }

    pub fn next_id(&self) -> String {
        (self.0)()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::new(generate_id)
    }
}

impl Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdGenerator")
    }
}
