//! Patient endpoints.

use serde_json::Value;

use crate::api::params::Params;
use crate::api::registry::{param_tag, Body, MutationEndpoint, QueryEndpoint};
use crate::api::transport::Method;
use crate::cache::tags::{list_with_ids, ResourceType, Tag, TagKey, TagSet};

use ResourceType::{Appointment, MedicalRecord, Patient};

pub static GET_PATIENTS: QueryEndpoint = QueryEndpoint {
  name: "get_patients",
  resource: Patient,
  path: "/patients",
  description: "Paginated patient list (search, gender, ageRange)",
  provides: patient_list_tags,
};

pub static GET_PATIENT: QueryEndpoint = QueryEndpoint {
  name: "get_patient",
  resource: Patient,
  path: "/patients/{id}",
  description: "Single patient by id",
  provides: patient_tag,
};

pub static SEARCH_PATIENTS: QueryEndpoint = QueryEndpoint {
  name: "search_patients",
  resource: Patient,
  path: "/patients/search",
  description: "Free-text patient search (q)",
  provides: search_tags,
};

pub static GET_PATIENT_MEDICAL_HISTORY: QueryEndpoint = QueryEndpoint {
  name: "get_patient_medical_history",
  resource: MedicalRecord,
  path: "/patients/{patientId}/medical-history",
  description: "Medical records of a patient",
  provides: medical_history_tags,
};

pub static GET_PATIENT_APPOINTMENTS: QueryEndpoint = QueryEndpoint {
  name: "get_patient_appointments",
  resource: Appointment,
  path: "/patients/{patientId}/appointments",
  description: "Appointments of a patient (status, dateFrom, dateTo)",
  provides: patient_appointments_tags,
};

pub static CREATE_PATIENT: MutationEndpoint = MutationEndpoint {
  name: "create_patient",
  resource: Patient,
  method: Method::Post,
  path: "/patients",
  description: "Register a patient",
  body: Body::Rest,
  invalidates: list_only,
};

pub static UPDATE_PATIENT: MutationEndpoint = MutationEndpoint {
  name: "update_patient",
  resource: Patient,
  method: Method::Put,
  path: "/patients/{id}",
  description: "Update a patient (id, data)",
  body: Body::Field("data"),
  invalidates: patient_and_list,
};

pub static DELETE_PATIENT: MutationEndpoint = MutationEndpoint {
  name: "delete_patient",
  resource: Patient,
  method: Method::Delete,
  path: "/patients/{id}",
  description: "Delete a patient",
  body: Body::Empty,
  invalidates: patient_and_list,
};

pub static QUERIES: &[&QueryEndpoint] = &[
  &GET_PATIENTS,
  &GET_PATIENT,
  &SEARCH_PATIENTS,
  &GET_PATIENT_MEDICAL_HISTORY,
  &GET_PATIENT_APPOINTMENTS,
];

pub static MUTATIONS: &[&MutationEndpoint] = &[&CREATE_PATIENT, &UPDATE_PATIENT, &DELETE_PATIENT];

fn patient_list_tags(result: &Value, _: &Params) -> TagSet {
  list_with_ids(Patient, result)
}

fn patient_tag(_: &Value, params: &Params) -> TagSet {
  param_tag(Patient, params, "id").into_iter().collect()
}

fn search_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Patient, TagKey::Search)])
}

fn medical_history_tags(_: &Value, params: &Params) -> TagSet {
  param_tag(MedicalRecord, params, "patientId")
    .into_iter()
    .collect()
}

fn patient_appointments_tags(_: &Value, params: &Params) -> TagSet {
  param_tag(Appointment, params, "patientId")
    .into_iter()
    .collect()
}

fn list_only(_: &Params) -> TagSet {
  TagSet::from([Tag::list(Patient)])
}

fn patient_and_list(params: &Params) -> TagSet {
  let mut tags: TagSet = param_tag(Patient, params, "id").into_iter().collect();
  tags.insert(Tag::list(Patient));
  tags
}
