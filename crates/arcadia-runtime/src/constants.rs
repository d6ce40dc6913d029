//! Constant pool
//!
//! Insertion-ordered, deduplicating table of literal values referenced by
//! bytecode. One pool serves the whole process: written while the
//! front-end lowers procedures, read-only during execution. Requesting an
//! already-interned literal returns its existing index.

use crate::value::{RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Hashable identity of an internable literal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Void,
    Boolean(bool),
    Integer64(i64),
    String(Arc<str>),
}

/// Deduplicating pool of literal values, indexed by position
#[derive(Debug, Default)]
pub struct ConstantPool {
    values: Vec<Value>,
    lookup: HashMap<LiteralKey, u32>,
}

impl ConstantPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All interned values, in insertion order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Intern the void literal
    pub fn get_or_create_void(&mut self) -> Result<u32, RuntimeError> {
        self.get_or_create(LiteralKey::Void, Value::Void)
    }

    /// Intern a boolean literal
    pub fn get_or_create_boolean(&mut self, value: bool) -> Result<u32, RuntimeError> {
        self.get_or_create(LiteralKey::Boolean(value), Value::Boolean(value))
    }

    /// Intern a 64-bit integer literal
    pub fn get_or_create_integer64(&mut self, value: i64) -> Result<u32, RuntimeError> {
        self.get_or_create(LiteralKey::Integer64(value), Value::Integer64(value))
    }

    /// Intern a string literal (byte-sequence equality)
    pub fn get_or_create_string(&mut self, value: impl Into<Arc<str>>) -> Result<u32, RuntimeError> {
        let shared: Arc<str> = value.into();
        self.get_or_create(
            LiteralKey::String(Arc::clone(&shared)),
            Value::String(shared),
        )
    }

    /// Look up the value at `index`.
    ///
    /// Fails with a value error when `index` is out of range; constant
    /// references in bytecode are not trusted.
    pub fn get_at(&self, index: u32) -> Result<&Value, RuntimeError> {
        self.values
            .get(index as usize)
            .ok_or_else(|| RuntimeError::ValueInvalid {
                msg: format!(
                    "constant index {} out of range (pool holds {})",
                    index,
                    self.values.len()
                ),
            })
    }

    /// Rebuild a pool from previously captured values, preserving indices.
    ///
    /// Used when loading a program image; for duplicate literals the first
    /// occurrence wins the lookup slot.
    pub fn from_values(values: Vec<Value>) -> Result<Self, RuntimeError> {
        let mut pool = Self::new();
        for value in values {
            let index = pool.push(value.clone())?;
            if let Some(key) = Self::literal_key(&value) {
                pool.lookup.entry(key).or_insert(index);
            }
        }
        Ok(pool)
    }

    fn literal_key(value: &Value) -> Option<LiteralKey> {
        match value {
            Value::Void => Some(LiteralKey::Void),
            Value::Boolean(b) => Some(LiteralKey::Boolean(*b)),
            Value::Integer64(n) => Some(LiteralKey::Integer64(*n)),
            Value::String(s) => Some(LiteralKey::String(Arc::clone(s))),
            _ => None,
        }
    }

    fn get_or_create(&mut self, key: LiteralKey, value: Value) -> Result<u32, RuntimeError> {
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let index = self.push(value)?;
        self.lookup.insert(key, index);
        Ok(index)
    }

    fn push(&mut self, value: Value) -> Result<u32, RuntimeError> {
        self.values
            .try_reserve(1)
            .map_err(|_| RuntimeError::AllocationFailed {
                msg: format!("constant pool growth past {} entries", self.values.len()),
            })?;
        let index = u32::try_from(self.values.len()).map_err(|_| RuntimeError::ValueInvalid {
            msg: "constant pool exhausted the index space".to_string(),
        })?;
        self.values.push(value);
        Ok(index)
    }
}
