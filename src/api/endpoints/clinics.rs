//! Clinic directory endpoints.

use serde_json::Value;

use crate::api::params::Params;
use crate::api::registry::{param_derived_tag, param_tag, Body, MutationEndpoint, QueryEndpoint};
use crate::api::transport::Method;
use crate::cache::tags::{list_with_ids, ResourceType, Tag, TagKey, TagSet};

use ResourceType::{Clinic, Doctor};

pub static GET_CLINICS: QueryEndpoint = QueryEndpoint {
  name: "get_clinics",
  resource: Clinic,
  path: "/clinics",
  description: "Paginated clinic list (search, city, services, rating)",
  provides: clinic_list_tags,
};

pub static GET_CLINIC: QueryEndpoint = QueryEndpoint {
  name: "get_clinic",
  resource: Clinic,
  path: "/clinics/{id}",
  description: "Single clinic by id",
  provides: clinic_tag,
};

pub static GET_FEATURED_CLINICS: QueryEndpoint = QueryEndpoint {
  name: "get_featured_clinics",
  resource: Clinic,
  path: "/clinics/featured",
  description: "Featured clinics (limit)",
  provides: featured_tags,
};

pub static SEARCH_CLINICS: QueryEndpoint = QueryEndpoint {
  name: "search_clinics",
  resource: Clinic,
  path: "/clinics/search",
  description: "Search clinics (query, location, services, radius)",
  provides: search_tags,
};

pub static GET_CLINIC_DOCTORS: QueryEndpoint = QueryEndpoint {
  name: "get_clinic_doctors",
  resource: Doctor,
  path: "/clinics/{clinicId}/doctors",
  description: "Doctors practicing at a clinic",
  provides: clinic_doctors_tags,
};

pub static GET_CLINIC_SERVICES: QueryEndpoint = QueryEndpoint {
  name: "get_clinic_services",
  resource: Clinic,
  path: "/clinics/{clinicId}/services",
  description: "Services offered by a clinic",
  provides: clinic_services_tags,
};

pub static GET_CLINIC_REVIEWS: QueryEndpoint = QueryEndpoint {
  name: "get_clinic_reviews",
  resource: Clinic,
  path: "/clinics/{clinicId}/reviews",
  description: "Reviews of a clinic (page, limit)",
  provides: clinic_reviews_tags,
};

pub static GET_NEARBY_CLINICS: QueryEndpoint = QueryEndpoint {
  name: "get_nearby_clinics",
  resource: Clinic,
  path: "/clinics/nearby",
  description: "Clinics near a coordinate (latitude, longitude, radius, limit)",
  provides: nearby_tags,
};

pub static CREATE_CLINIC_REVIEW: MutationEndpoint = MutationEndpoint {
  name: "create_clinic_review",
  resource: Clinic,
  method: Method::Post,
  path: "/clinics/{clinicId}/reviews",
  description: "Post a review (rating, comment, appointmentId)",
  body: Body::Rest,
  invalidates: review_invalidates,
};

pub static QUERIES: &[&QueryEndpoint] = &[
  &GET_CLINICS,
  &GET_CLINIC,
  &GET_FEATURED_CLINICS,
  &SEARCH_CLINICS,
  &GET_CLINIC_DOCTORS,
  &GET_CLINIC_SERVICES,
  &GET_CLINIC_REVIEWS,
  &GET_NEARBY_CLINICS,
];

pub static MUTATIONS: &[&MutationEndpoint] = &[&CREATE_CLINIC_REVIEW];

fn clinic_list_tags(result: &Value, _: &Params) -> TagSet {
  list_with_ids(Clinic, result)
}

fn clinic_tag(_: &Value, params: &Params) -> TagSet {
  param_tag(Clinic, params, "id").into_iter().collect()
}

fn featured_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Clinic, TagKey::Featured)])
}

fn search_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Clinic, TagKey::Search)])
}

fn nearby_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Clinic, TagKey::Nearby)])
}

// Keyed by clinic id under the Doctor type.
fn clinic_doctors_tags(_: &Value, params: &Params) -> TagSet {
  param_tag(Doctor, params, "clinicId").into_iter().collect()
}

fn clinic_services_tags(_: &Value, params: &Params) -> TagSet {
  param_derived_tag(Clinic, params, "clinicId", "services")
    .into_iter()
    .collect()
}

fn clinic_reviews_tags(_: &Value, params: &Params) -> TagSet {
  param_derived_tag(Clinic, params, "clinicId", "reviews")
    .into_iter()
    .collect()
}

fn review_invalidates(params: &Params) -> TagSet {
  let mut tags: TagSet = param_tag(Clinic, params, "clinicId")
    .into_iter()
    .chain(param_derived_tag(Clinic, params, "clinicId", "reviews"))
    .collect();
  tags.insert(Tag::list(Clinic));
  tags
}
