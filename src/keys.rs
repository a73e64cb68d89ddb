//! The credential lookup capability handed in by the hosting application.

use std::collections::HashMap;
use std::sync::Mutex;

/// Looks up credentials by environment-variable name.
///
/// The hosting application supplies an implementation at resolution time;
/// handles capture it and consult it again at execution time, so a key
/// rotated between the two is picked up.
pub trait KeySource: Send + Sync {
    fn read(&self, name: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
pub struct EnvKeySource;

impl KeySource for EnvKeySource {
    fn read(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An in-memory key source. Mutable after construction so tests and
/// embedders can rotate or revoke keys while handles are live.
#[derive(Default)]
pub struct MapKeySource {
    keys: Mutex<HashMap<String, String>>,
}

impl MapKeySource {
    pub fn new() -> MapKeySource {
        MapKeySource::default()
    }

    pub fn with(name: impl Into<String>, value: impl Into<String>) -> MapKeySource {
        let source = MapKeySource::new();
        source.set(name, value);
        source
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.keys
            .lock()
            .expect("key map poisoned")
            .insert(name.into(), value.into());
    }

    pub fn unset(&self, name: &str) {
        self.keys.lock().expect("key map poisoned").remove(name);
    }
}

impl KeySource for MapKeySource {
    fn read(&self, name: &str) -> Option<String> {
        self.keys.lock().expect("key map poisoned").get(name).cloned()
    }
}
