//! Query signatures: the cache key of an entry.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::api::params::Params;
use crate::api::registry::QueryEndpoint;

/// An endpoint plus its normalized params.
#[derive(Clone)]
pub struct QuerySignature {
  pub endpoint: &'static QueryEndpoint,
  pub params: Params,
  hash: String,
}

impl QuerySignature {
  pub fn new(endpoint: &'static QueryEndpoint, params: Params) -> Self {
    let input = format!("{}:{}", endpoint.name, params.canonical());

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Self {
      endpoint,
      params,
      hash,
    }
  }

  pub fn hash(&self) -> &str {
    &self.hash
  }

  /// Human readable form for logs.
  pub fn description(&self) -> String {
    if self.params.is_empty() {
      self.endpoint.name.to_string()
    } else {
      format!("{}({})", self.endpoint.name, self.params.canonical())
    }
  }
}

impl fmt::Debug for QuerySignature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QuerySignature")
      .field("endpoint", &self.endpoint.name)
      .field("params", &self.params)
      .finish()
  }
}

impl PartialEq for QuerySignature {
  fn eq(&self, other: &Self) -> bool {
    self.hash == other.hash
  }
}

impl Eq for QuerySignature {}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::endpoints::{appointments, clinics};

  #[test]
  fn test_same_params_same_hash() {
    let a = QuerySignature::new(
      &appointments::GET_APPOINTMENTS,
      Params::new().with("patientId", "p1").with("page", 1),
    );
    let b = QuerySignature::new(
      &appointments::GET_APPOINTMENTS,
      Params::new().with("page", 1).with("patientId", "p1"),
    );
    assert_eq!(a, b);
    assert_eq!(a.hash().len(), 64);
  }

  #[test]
  fn test_endpoint_is_part_of_signature() {
    let params = Params::new().with("id", "3");
    let a = QuerySignature::new(&clinics::GET_CLINIC, params.clone());
    let b = QuerySignature::new(&appointments::GET_APPOINTMENT, params);
    assert_ne!(a, b);
  }

  #[test]
  fn test_description() {
    let sig = QuerySignature::new(&clinics::GET_CLINICS, Params::new());
    assert_eq!(sig.description(), "get_clinics");
    let sig = QuerySignature::new(&clinics::GET_CLINIC, Params::new().with("id", "3"));
    assert_eq!(sig.description(), r#"get_clinic({"id":"3"})"#);
  }
}
