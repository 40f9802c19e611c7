use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Text(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

/// The next UI action chosen by the planner, handed to the actuation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
    pub function_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl ParsedAction {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }
}

/// Outcome reported back by the actuation layer after running an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub function_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ActionResult {
    pub fn succeeded(action: &ParsedAction) -> Self {
        Self {
            function_name: action.function_name.clone(),
            success: true,
            error: None,
            detail: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn failed(action: &ParsedAction, error: impl Into<String>) -> Self {
        Self {
            function_name: action.function_name.clone(),
            success: false,
            error: Some(error.into()),
            detail: None,
            timestamp: chrono::Utc::now(),
        }
    }
}
