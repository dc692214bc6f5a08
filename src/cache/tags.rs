//! Resource tags: the unit of cache invalidation.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::api::params::scalar_to_string;

/// Category of remote entity managed through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
  Patient,
  Appointment,
  Doctor,
  Clinic,
  MedicalRecord,
  User,
  Analytics,
}

impl ResourceType {
  pub const ALL: [ResourceType; 7] = [
    ResourceType::Patient,
    ResourceType::Appointment,
    ResourceType::Doctor,
    ResourceType::Clinic,
    ResourceType::MedicalRecord,
    ResourceType::User,
    ResourceType::Analytics,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceType::Patient => "Patient",
      ResourceType::Appointment => "Appointment",
      ResourceType::Doctor => "Doctor",
      ResourceType::Clinic => "Clinic",
      ResourceType::MedicalRecord => "MedicalRecord",
      ResourceType::User => "User",
      ResourceType::Analytics => "Analytics",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|r| r.as_str().eq_ignore_ascii_case(s))
  }
}

impl fmt::Display for ResourceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Second half of a tag: an entity id, a collection view, or a derived key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
  Id(String),
  List,
  Search,
  Featured,
  Nearby,
  Today,
  Upcoming,
  /// The signed-in user.
  Current,
  /// `<id>-<facet>`, e.g. a clinic's reviews.
  Derived { id: String, facet: &'static str },
}

impl TagKey {
  pub fn id(id: impl Into<String>) -> Self {
    TagKey::Id(id.into())
  }

  pub fn derived(id: impl Into<String>, facet: &'static str) -> Self {
    TagKey::Derived {
      id: id.into(),
      facet,
    }
  }
}

impl fmt::Display for TagKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TagKey::Id(id) => f.write_str(id),
      TagKey::List => f.write_str("LIST"),
      TagKey::Search => f.write_str("SEARCH"),
      TagKey::Featured => f.write_str("FEATURED"),
      TagKey::Nearby => f.write_str("NEARBY"),
      TagKey::Today => f.write_str("TODAY"),
      TagKey::Upcoming => f.write_str("UPCOMING"),
      TagKey::Current => f.write_str("CURRENT"),
      TagKey::Derived { id, facet } => write!(f, "{}-{}", id, facet),
    }
  }
}

/// `Resource:key`. Tags compare by their rendered key, so an id that reads
/// `3-reviews` or `LIST` is the same tag as the derived or collection form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
  pub resource: ResourceType,
  key: String,
}

impl Tag {
  pub fn new(resource: ResourceType, key: TagKey) -> Self {
    Self {
      resource,
      key: key.to_string(),
    }
  }

  pub fn id(resource: ResourceType, id: impl Into<String>) -> Self {
    Self {
      resource,
      key: id.into(),
    }
  }

  pub fn list(resource: ResourceType) -> Self {
    Self::new(resource, TagKey::List)
  }

  pub fn derived(resource: ResourceType, id: impl Into<String>, facet: &'static str) -> Self {
    Self::new(resource, TagKey::derived(id, facet))
  }

  pub fn key(&self) -> &str {
    &self.key
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.resource, self.key)
  }
}

pub type TagSet = BTreeSet<Tag>;

/// One tag per entity found in a list result, plus the `LIST` tag.
///
/// Accepts both a paginated envelope (`{ data: [...] }`) and a bare array.
/// An empty or unexpected result still yields `LIST` so a later create
/// invalidates it.
pub fn list_with_ids(resource: ResourceType, result: &Value) -> TagSet {
  let items = match result {
    Value::Array(items) => Some(items),
    Value::Object(map) => map.get("data").and_then(Value::as_array),
    _ => None,
  };

  let mut tags: TagSet = items
    .into_iter()
    .flatten()
    .filter_map(|item| item.get("id").and_then(scalar_to_string))
    .map(|id| Tag::id(resource, id))
    .collect();
  tags.insert(Tag::list(resource));
  tags
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_display() {
    assert_eq!(Tag::list(ResourceType::Clinic).to_string(), "Clinic:LIST");
    assert_eq!(
      Tag::new(ResourceType::Clinic, TagKey::derived("3", "reviews")).to_string(),
      "Clinic:3-reviews"
    );
    assert_eq!(
      Tag::new(ResourceType::User, TagKey::Current).to_string(),
      "User:CURRENT"
    );
  }

  #[test]
  fn test_tags_with_the_same_rendering_are_equal() {
    assert_eq!(
      Tag::id(ResourceType::Clinic, "3-reviews"),
      Tag::derived(ResourceType::Clinic, "3", "reviews")
    );
    assert_eq!(
      Tag::id(ResourceType::Clinic, "LIST"),
      Tag::list(ResourceType::Clinic)
    );
    assert_ne!(
      Tag::list(ResourceType::Clinic),
      Tag::list(ResourceType::Patient)
    );

    let set = TagSet::from([Tag::new(ResourceType::User, TagKey::Current)]);
    assert!(set.contains(&Tag::id(ResourceType::User, "CURRENT")));
  }

  #[test]
  fn test_parse_resource_type() {
    assert_eq!(
      ResourceType::parse("medicalrecord"),
      Some(ResourceType::MedicalRecord)
    );
    assert_eq!(ResourceType::parse("Invoice"), None);
  }

  #[test]
  fn test_list_with_ids_from_envelope() {
    let result = json!({
      "success": true,
      "data": [{"id": "1"}, {"id": 2}, {"name": "no id"}],
      "pagination": {"total": 3}
    });
    let tags = list_with_ids(ResourceType::Clinic, &result);
    let expected: TagSet = [
      Tag::id(ResourceType::Clinic, "1"),
      Tag::id(ResourceType::Clinic, "2"),
      Tag::list(ResourceType::Clinic),
    ]
    .into_iter()
    .collect();
    assert_eq!(tags, expected);
  }

  #[test]
  fn test_empty_list_still_provides_list_tag() {
    let tags = list_with_ids(ResourceType::Patient, &json!({"data": []}));
    assert_eq!(tags.len(), 1);
    assert!(tags.contains(&Tag::list(ResourceType::Patient)));

    let tags = list_with_ids(ResourceType::Patient, &Value::Null);
    assert!(tags.contains(&Tag::list(ResourceType::Patient)));
  }
}
