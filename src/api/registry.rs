//! Declaration surface: one static entry per query and mutation.
//!
//! An endpoint names its path template, how its params are split between
//! path, query string and body, and the pure functions that compute the tags
//! it provides (queries) or invalidates (mutations).

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::error::ApiError;
use super::params::{scalar_to_string, Params};
use super::transport::{ApiRequest, Method};
use crate::cache::tags::{ResourceType, Tag, TagKey, TagSet};

/// Tags provided by a query, computed from its result and arguments.
pub type ProvidesFn = fn(&Value, &Params) -> TagSet;

/// Tags invalidated by a successful mutation, computed from its arguments.
pub type InvalidatesFn = fn(&Params) -> TagSet;

/// A read endpoint. Always `GET`; params not consumed by the path become the
/// query string.
pub struct QueryEndpoint {
  pub name: &'static str,
  pub resource: ResourceType,
  pub path: &'static str,
  pub description: &'static str,
  pub provides: ProvidesFn,
}

impl QueryEndpoint {
  pub fn request(&self, params: &Params) -> Result<ApiRequest, ApiError> {
    let (path, rest) = render_path(self.path, params)?;
    Ok(ApiRequest::new(Method::Get, path).with_query(rest.to_query_pairs()))
  }

  pub fn provided_tags(&self, result: &Value, params: &Params) -> TagSet {
    (self.provides)(result, params)
  }
}

impl fmt::Debug for QueryEndpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryEndpoint")
      .field("name", &self.name)
      .field("resource", &self.resource)
      .field("path", &self.path)
      .finish_non_exhaustive()
  }
}

/// How a mutation's remaining params (after the path) form the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
  /// No body.
  Empty,
  /// All remaining params as a JSON object.
  Rest,
  /// The value of one param (e.g. `{ id, data }` sends `data`).
  Field(&'static str),
}

pub struct MutationEndpoint {
  pub name: &'static str,
  pub resource: ResourceType,
  pub method: Method,
  pub path: &'static str,
  pub description: &'static str,
  pub body: Body,
  pub invalidates: InvalidatesFn,
}

impl MutationEndpoint {
  pub fn request(&self, params: &Params) -> Result<ApiRequest, ApiError> {
    let (path, mut rest) = render_path(self.path, params)?;
    let request = ApiRequest::new(self.method, path);
    Ok(match self.body {
      Body::Empty => request,
      Body::Rest => request.with_body(rest.into_json()),
      Body::Field(field) => match rest.remove(field) {
        Some(value) => request.with_body(value),
        None => request.with_body(Value::Object(Default::default())),
      },
    })
  }

  pub fn invalidated_tags(&self, params: &Params) -> TagSet {
    (self.invalidates)(params)
  }
}

impl fmt::Debug for MutationEndpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MutationEndpoint")
      .field("name", &self.name)
      .field("method", &self.method)
      .field("path", &self.path)
      .finish_non_exhaustive()
  }
}

/// Lookup table over every declared endpoint.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
  queries: BTreeMap<&'static str, &'static QueryEndpoint>,
  mutations: BTreeMap<&'static str, &'static MutationEndpoint>,
}

impl EndpointRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_queries(mut self, queries: &[&'static QueryEndpoint]) -> Self {
    for q in queries {
      self.queries.insert(q.name, q);
    }
    self
  }

  pub fn with_mutations(mut self, mutations: &[&'static MutationEndpoint]) -> Self {
    for m in mutations {
      self.mutations.insert(m.name, m);
    }
    self
  }

  pub fn query(&self, name: &str) -> Option<&'static QueryEndpoint> {
    self.queries.get(name).copied()
  }

  pub fn mutation(&self, name: &str) -> Option<&'static MutationEndpoint> {
    self.mutations.get(name).copied()
  }

  pub fn queries(&self) -> impl Iterator<Item = &'static QueryEndpoint> + '_ {
    self.queries.values().copied()
  }

  pub fn mutations(&self) -> impl Iterator<Item = &'static MutationEndpoint> + '_ {
    self.mutations.values().copied()
  }
}

// ============================================================================
// Tag helpers for declarations
// ============================================================================

/// `resource:<params[key]>`, or nothing when the param is absent.
pub fn param_tag(resource: ResourceType, params: &Params, key: &str) -> Option<Tag> {
  params
    .get_scalar(key)
    .map(|id| Tag::new(resource, TagKey::Id(id)))
}

/// `resource:<params[key]>-<facet>`.
pub fn param_derived_tag(
  resource: ResourceType,
  params: &Params,
  key: &str,
  facet: &'static str,
) -> Option<Tag> {
  params
    .get_scalar(key)
    .map(|id| Tag::new(resource, TagKey::derived(id, facet)))
}

// ============================================================================
// Path rendering
// ============================================================================

/// Fill `{name}` placeholders from params and return the unused params.
fn render_path(template: &str, params: &Params) -> Result<(String, Params), ApiError> {
  let mut rest = params.clone();
  let mut path = String::with_capacity(template.len());
  let mut remaining = template;

  while let Some(start) = remaining.find('{') {
    let end = remaining[start..]
      .find('}')
      .map(|i| start + i)
      .ok_or_else(|| ApiError::invalid_request("path", format!("Unclosed placeholder in {}", template)))?;
    let name = &remaining[start + 1..end];

    let value = rest
      .remove(name)
      .as_ref()
      .and_then(scalar_to_string)
      .filter(|v| !v.is_empty())
      .ok_or_else(|| ApiError::invalid_request(name, "missing path parameter"))?;

    path.push_str(&remaining[..start]);
    path.push_str(&urlencoding::encode(&value));
    remaining = &remaining[end + 1..];
  }
  path.push_str(remaining);

  Ok((path, rest))
}
