//! Declared endpoints of the clinic API, grouped by resource.

pub mod appointments;
pub mod auth;
pub mod clinics;
pub mod patients;

use super::registry::EndpointRegistry;

/// Registry with every declared endpoint.
pub fn registry() -> EndpointRegistry {
  EndpointRegistry::new()
    .with_queries(clinics::QUERIES)
    .with_queries(patients::QUERIES)
    .with_queries(appointments::QUERIES)
    .with_queries(auth::QUERIES)
    .with_mutations(clinics::MUTATIONS)
    .with_mutations(patients::MUTATIONS)
    .with_mutations(appointments::MUTATIONS)
    .with_mutations(auth::MUTATIONS)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn test_names_are_unique_across_modules() {
    let total_queries = clinics::QUERIES.len()
      + patients::QUERIES.len()
      + appointments::QUERIES.len()
      + auth::QUERIES.len();
    let total_mutations = clinics::MUTATIONS.len()
      + patients::MUTATIONS.len()
      + appointments::MUTATIONS.len()
      + auth::MUTATIONS.len();

    let registry = registry();
    assert_eq!(registry.queries().count(), total_queries);
    assert_eq!(registry.mutations().count(), total_mutations);

    let query_names: HashSet<_> = registry.queries().map(|q| q.name).collect();
    assert!(registry.mutations().all(|m| !query_names.contains(m.name)));
  }

  #[test]
  fn test_paths_start_with_slash() {
    let registry = registry();
    assert!(registry.queries().all(|q| q.path.starts_with('/')));
    assert!(registry.mutations().all(|m| m.path.starts_with('/')));
  }
}
