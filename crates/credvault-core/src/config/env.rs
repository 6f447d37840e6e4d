//! Environment variable access behind a trait
//!
//! Key configuration is read through [`ReadEnv`] so that tests and embedders can
//! supply a fixed environment without mutating the process-wide one.

use std::collections::HashMap;
use std::env::{self, VarError};
use std::sync::{Arc, RwLock};

/// Read a single environment variable
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;
}

impl<E: ReadEnv + ?Sized> ReadEnv for Arc<E> {
    fn var(&self, key: &str) -> Result<String, VarError> {
        (**self).var(key)
    }
}

/// Zero-sized type that delegates to `std::env`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, VarError> {
        env::var(key)
    }
}

/// Environment held in memory; never touches the process environment
#[derive(Debug, Default)]
pub struct InMemoryEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl InMemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut vars) = self.vars.write() {
            vars.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut vars) = self.vars.write() {
            vars.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut vars) = self.vars.write() {
            vars.clear();
        }
    }
}

impl ReadEnv for InMemoryEnv {
    fn var(&self, key: &str) -> Result<String, VarError> {
        self.vars
            .read()
            .ok()
            .and_then(|vars| vars.get(key).cloned())
            .ok_or(VarError::NotPresent)
    }
}
