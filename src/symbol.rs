//! Symbol table.
//!
//! Maps label names to virtual addresses so branch targets can be written
//! symbolically. Only names the caller (or a label in the same assembled
//! sequence) provides are known; there is no cross-file resolution.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Label names and the virtual addresses they stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `address`, returning the address it was previously bound to.
    pub fn insert(&mut self, name: impl Into<String>, address: u32) -> Option<u32> {
        self.symbols.insert(name.into(), address)
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<u32> {
        self.get(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.symbols.iter().map(|(name, &address)| (name.as_str(), address))
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self {
            symbols: iter.into_iter().map(|(name, address)| (name.into(), address)).collect(),
        }
    }
}
