//! Endpoint lookup, autocomplete and argument parsing for the command line

use serde_json::Value;

use crate::api::{ApiError, EndpointRegistry, MutationEndpoint, Params, QueryEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
  Query,
  Mutation,
}

#[derive(Debug, Clone, Copy)]
pub struct Suggestion {
  pub name: &'static str,
  pub kind: EndpointKind,
  pub description: &'static str,
}

impl From<&'static QueryEndpoint> for Suggestion {
  fn from(q: &'static QueryEndpoint) -> Self {
    Self {
      name: q.name,
      kind: EndpointKind::Query,
      description: q.description,
    }
  }
}

impl From<&'static MutationEndpoint> for Suggestion {
  fn from(m: &'static MutationEndpoint) -> Self {
    Self {
      name: m.name,
      kind: EndpointKind::Mutation,
      description: m.description,
    }
  }
}

/// Name without the `get_` prefix, so `clinics` finds `get_clinics`.
fn short_name(name: &str) -> &str {
  name.strip_prefix("get_").unwrap_or(name)
}

/// Get autocomplete suggestions for a given input, optionally restricted to
/// one kind of endpoint
pub fn get_suggestions(
  registry: &EndpointRegistry,
  input: &str,
  kind: Option<EndpointKind>,
) -> Vec<Suggestion> {
  let input_lower = input.trim().to_lowercase().replace('-', "_");

  let candidates: Vec<Suggestion> = registry
    .queries()
    .map(Suggestion::from)
    .chain(registry.mutations().map(Suggestion::from))
    .filter(|s| kind.map_or(true, |k| s.kind == k))
    .collect();

  if input_lower.is_empty() {
    return candidates;
  }

  let mut matches: Vec<(Suggestion, u32)> = Vec::new();

  for candidate in candidates {
    let short = short_name(candidate.name);

    // Exact match on name
    if candidate.name == input_lower {
      matches.push((candidate, 0));
      continue;
    }

    // Exact match on short name
    if short == input_lower {
      matches.push((candidate, 1));
      continue;
    }

    // Prefix match on name
    if candidate.name.starts_with(&input_lower) {
      matches.push((candidate, 2));
      continue;
    }

    // Prefix match on short name
    if short.starts_with(&input_lower) {
      matches.push((candidate, 3));
      continue;
    }

    // Fuzzy match (contains)
    if candidate.name.contains(&input_lower) {
      matches.push((candidate, 4));
    }
  }

  // Sort by priority, then by name for a stable listing
  matches.sort_by(|(a, pa), (b, pb)| pa.cmp(pb).then(a.name.cmp(b.name)));

  matches.into_iter().map(|(s, _)| s).collect()
}

/// Build params from `key=value` pairs and an optional JSON object body.
///
/// Values that parse as JSON (numbers, booleans, arrays, objects) keep their
/// type; anything else is a string. Pairs override body fields.
pub fn parse_params(pairs: &[String], body: Option<&str>) -> Result<Params, ApiError> {
  let mut params = match body {
    Some(raw) => match serde_json::from_str::<Value>(raw) {
      Ok(value @ Value::Object(_)) => Params::from_serialize(&value)?,
      Ok(_) => return Err(ApiError::invalid_request("body", "body must be a JSON object")),
      Err(e) => return Err(ApiError::invalid_request("body", format!("invalid JSON: {}", e))),
    },
    None => Params::new(),
  };

  for pair in pairs {
    let (key, raw) = pair
      .split_once('=')
      .ok_or_else(|| ApiError::invalid_request(pair, "expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
      return Err(ApiError::invalid_request(pair, "empty parameter name"));
    }
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    params.insert(key, value);
  }
  Ok(params)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::endpoints::registry;

  #[test]
  fn test_empty_input_returns_all() {
    let registry = registry();
    let suggestions = get_suggestions(&registry, "", None);
    assert_eq!(
      suggestions.len(),
      registry.queries().count() + registry.mutations().count()
    );
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions(&registry(), "get_clinic", None);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "get_clinic");
  }

  #[test]
  fn test_short_name_match() {
    let suggestions = get_suggestions(&registry(), "clinics", None);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "get_clinics");
  }

  #[test]
  fn test_prefix_match_with_dashes() {
    let suggestions = get_suggestions(&registry(), "cancel-app", None);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "cancel_appointment");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions(&registry(), "review", None);
    let names: Vec<_> = suggestions.iter().map(|s| s.name).collect();
    assert!(names.contains(&"create_clinic_review"));
    assert!(names.contains(&"get_clinic_reviews"));
  }

  #[test]
  fn test_kind_filter() {
    let suggestions = get_suggestions(&registry(), "review", Some(EndpointKind::Mutation));
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, EndpointKind::Mutation);
  }

  #[test]
  fn test_parse_params_keeps_json_types() {
    let params = parse_params(
      &["id=a1".to_string(), "page=2".to_string(), "services=[\"xray\"]".to_string()],
      None,
    )
    .unwrap();
    assert_eq!(params.get("id"), Some(&Value::String("a1".to_string())));
    assert_eq!(params.get("page"), Some(&Value::from(2)));
    assert!(params.get("services").is_some_and(Value::is_array));
  }

  #[test]
  fn test_parse_params_merges_body() {
    let params = parse_params(
      &["clinicId=3".to_string()],
      Some(r#"{"rating": 5, "comment": "Kind staff", "clinicId": "9"}"#),
    )
    .unwrap();
    assert_eq!(params.get_scalar("clinicId").as_deref(), Some("3"));
    assert_eq!(params.get("rating"), Some(&Value::from(5)));
  }

  #[test]
  fn test_parse_params_rejects_malformed_input() {
    assert!(parse_params(&["novalue".to_string()], None).is_err());
    assert!(parse_params(&[], Some("[1, 2]")).is_err());
    assert!(parse_params(&[], Some("{oops")).is_err());
  }
}
