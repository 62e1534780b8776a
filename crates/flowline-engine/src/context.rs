//! The run context: data visible to block templates during a traversal.
//!
//! Reserved roots are `$params`, `$session`, `$vars`, `$credentials` and,
//! inside an iterator body, `iterator`. Every other key is a block's
//! `variableName` holding `{ "output": ..., "error": ... }`.
//!
//! The context is a value. Cloning is cheap (the map sits behind an `Arc`)
//! and the first write after a clone copies it.

use std::sync::Arc;

use flowline_types::Session;
use serde_json::{Map, Value, json};

pub const PARAMS: &str = "$params";
pub const SESSION: &str = "$session";
pub const VARS: &str = "$vars";
pub const CREDENTIALS: &str = "$credentials";
pub const ITERATOR: &str = "iterator";

/// Whether `key` is a reserved root rather than a block entry.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with('$') || key == ITERATOR
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    entries: Arc<Map<String, Value>>,
}

impl RunContext {
    pub fn new(
        params: Value,
        session: &Session,
        vars: Map<String, Value>,
        credentials: Map<String, Value>,
    ) -> Self {
        let mut entries = Map::new();
        entries.insert(PARAMS.to_string(), params);
        entries.insert(
            SESSION.to_string(),
            serde_json::to_value(session).unwrap_or(Value::Null),
        );
        entries.insert(VARS.to_string(), Value::Object(vars));
        entries.insert(CREDENTIALS.to_string(), Value::Object(credentials));
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn params(&self) -> &Value {
        self.entries.get(PARAMS).unwrap_or(&Value::Null)
    }

    /// Current `$vars` object.
    pub fn vars(&self) -> Map<String, Value> {
        match self.entries.get(VARS) {
            Some(Value::Object(vars)) => vars.clone(),
            _ => Map::new(),
        }
    }

    pub fn set_vars(&mut self, vars: Map<String, Value>) {
        Arc::make_mut(&mut self.entries).insert(VARS.to_string(), Value::Object(vars));
    }

    /// Record a block's result under its variable name.
    pub fn insert_block(&mut self, variable_name: &str, output: Value, error: Option<String>) {
        Arc::make_mut(&mut self.entries).insert(
            variable_name.to_string(),
            json!({ "output": output, "error": error }),
        );
    }

    /// Output recorded for a block, if it ran.
    pub fn block_output(&self, variable_name: &str) -> Option<&Value> {
        self.entries.get(variable_name)?.get("output")
    }

    /// A copy with the `iterator` frame set for one loop item.
    pub fn with_iterator(&self, index: usize, item: Value, len: usize) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.entries).insert(
            ITERATOR.to_string(),
            json!({
                "index": index,
                "item": item,
                "isFirst": index == 0,
                "isLast": index + 1 == len,
            }),
        );
        next
    }

    /// The context as it may be persisted: everything but `$credentials`.
    pub fn persisted(&self) -> Value {
        let mut entries = (*self.entries).clone();
        entries.remove(CREDENTIALS);
        Value::Object(entries)
    }
}
