//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// A structured audit record pushed to the monitoring pipeline.
//
// Samples are free-form JSON objects; every sample carries the creation time
// under the "time" key.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LogSample {
    values: Map<String, Value>,
}

// ===== impl LogSample =====

impl LogSample {
    pub fn new() -> LogSample {
        let mut values = Map::new();
        values.insert("time".to_owned(), Value::from(Utc::now().timestamp()));
        LogSample { values }
    }

    pub fn add_string(
        &mut self,
        key: &str,
        value: impl Into<String>,
    ) -> &mut LogSample {
        self.values.insert(key.to_owned(), Value::from(value.into()));
        self
    }

    pub fn add_int(&mut self, key: &str, value: i64) -> &mut LogSample {
        self.values.insert(key.to_owned(), Value::from(value));
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl Default for LogSample {
    fn default() -> LogSample {
        LogSample::new()
    }
}
