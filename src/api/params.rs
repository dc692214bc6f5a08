//! Normalized endpoint arguments.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::error::ApiError;

/// Arguments of a query or mutation.
///
/// Keys are kept sorted and `null` values are dropped, so two calls that differ
/// only in argument order or in unset optionals produce the same signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(key, value);
    self
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    let key = key.into();
    match normalize(value.into()) {
      Some(value) => {
        self.0.insert(key, value);
      }
      None => {
        self.0.remove(&key);
      }
    }
  }

  /// Build params from any struct that serializes to a JSON object.
  pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
    let value = serde_json::to_value(value)
      .map_err(|e| ApiError::invalid_request("params", format!("Unserializable params: {}", e)))?;
    match value {
      Value::Null => Ok(Self::new()),
      Value::Object(map) => {
        let mut params = Self::new();
        for (key, value) in map {
          params.insert(key, value);
        }
        Ok(params)
      }
      other => Err(ApiError::invalid_request(
        "params",
        format!("Params must be an object, got {}", other),
      )),
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  /// Scalar value rendered as a string (strings verbatim, numbers and bools formatted).
  pub fn get_scalar(&self, key: &str) -> Option<String> {
    self.0.get(key).and_then(scalar_to_string)
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    self.0.remove(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  /// Stable textual form used for hashing query signatures.
  pub fn canonical(&self) -> String {
    // BTreeMap keys serialize in order; nested objects use serde_json's sorted map.
    serde_json::to_string(&self.0).unwrap_or_default()
  }

  /// Consume into a JSON object body.
  pub fn into_json(self) -> Value {
    Value::Object(self.0.into_iter().collect::<Map<String, Value>>())
  }

  /// Flatten into query-string pairs: arrays as `key[]`, nested objects as `key[sub]`.
  pub fn to_query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in &self.0 {
      push_pairs(&mut pairs, key, value);
    }
    pairs
  }
}

fn push_pairs(pairs: &mut Vec<(String, String)>, key: &str, value: &Value) {
  match value {
    Value::Null => {}
    Value::Array(items) => {
      let key = format!("{}[]", key);
      for item in items {
        if let Some(s) = scalar_to_string(item) {
          pairs.push((key.clone(), s));
        }
      }
    }
    Value::Object(map) => {
      for (sub, item) in map {
        push_pairs(pairs, &format!("{}[{}]", key, sub), item);
      }
    }
    scalar => {
      if let Some(s) = scalar_to_string(scalar) {
        pairs.push((key.to_string(), s));
      }
    }
  }
}

/// Render a JSON scalar for use in a path segment, query string or tag key.
pub fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn normalize(value: Value) -> Option<Value> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(Value::String(s.trim().to_string())),
    Value::Object(map) => Some(Value::Object(
      map
        .into_iter()
        .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
        .collect(),
    )),
    other => Some(other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_order_and_nulls_do_not_change_canonical_form() {
    let a = Params::new().with("page", 1).with("city", "Dhaka");
    let b = Params::new()
      .with("city", " Dhaka ")
      .with("search", Value::Null)
      .with("page", 1);
    assert_eq!(a.canonical(), b.canonical());
    assert_eq!(a, b);
  }

  #[test]
  fn test_from_serialize_skips_none_fields() {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Filters {
      patient_id: Option<String>,
      doctor_id: Option<String>,
    }

    let params = Params::from_serialize(&Filters {
      patient_id: Some("p1".into()),
      doctor_id: None,
    })
    .unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params.get_scalar("patientId").as_deref(), Some("p1"));
  }

  #[test]
  fn test_from_serialize_rejects_scalars() {
    assert!(Params::from_serialize(&42).is_err());
  }

  #[test]
  fn test_query_pairs_flatten_arrays_and_objects() {
    let params = Params::new()
      .with("services", json!(["dental", "eye"]))
      .with("ageRange", json!({"min": 18, "max": 40}))
      .with("limit", 5);
    let pairs = params.to_query_pairs();
    assert_eq!(
      pairs,
      vec![
        ("ageRange[max]".to_string(), "40".to_string()),
        ("ageRange[min]".to_string(), "18".to_string()),
        ("limit".to_string(), "5".to_string()),
        ("services[]".to_string(), "dental".to_string()),
        ("services[]".to_string(), "eye".to_string()),
      ]
    );
  }
}
