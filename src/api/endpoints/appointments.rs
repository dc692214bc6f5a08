//! Appointment endpoints.
//!
//! Completing an appointment also produces a medical record, so it invalidates
//! the medical-record list as well.

use serde_json::Value;

use crate::api::params::Params;
use crate::api::registry::{param_tag, Body, MutationEndpoint, QueryEndpoint};
use crate::api::transport::Method;
use crate::cache::tags::{list_with_ids, ResourceType, Tag, TagKey, TagSet};

use ResourceType::{Appointment, Doctor, MedicalRecord};

pub static GET_APPOINTMENTS: QueryEndpoint = QueryEndpoint {
  name: "get_appointments",
  resource: Appointment,
  path: "/appointments",
  description: "Paginated appointments (doctorId, clinicId, patientId, status, dateFrom, dateTo, type)",
  provides: appointment_list_tags,
};

pub static GET_APPOINTMENT: QueryEndpoint = QueryEndpoint {
  name: "get_appointment",
  resource: Appointment,
  path: "/appointments/{id}",
  description: "Single appointment by id",
  provides: appointment_tag,
};

pub static GET_TODAYS_APPOINTMENTS: QueryEndpoint = QueryEndpoint {
  name: "get_todays_appointments",
  resource: Appointment,
  path: "/appointments/today",
  description: "Today's appointments (doctorId, clinicId)",
  provides: today_tags,
};

pub static GET_UPCOMING_APPOINTMENTS: QueryEndpoint = QueryEndpoint {
  name: "get_upcoming_appointments",
  resource: Appointment,
  path: "/appointments/upcoming",
  description: "Upcoming appointments (patientId, doctorId, limit)",
  provides: upcoming_tags,
};

pub static GET_AVAILABLE_TIME_SLOTS: QueryEndpoint = QueryEndpoint {
  name: "get_available_time_slots",
  resource: Appointment,
  path: "/appointments/available-slots",
  description: "Free slots for a doctor on a date (doctorId, date, duration)",
  provides: no_tags,
};

pub static CREATE_APPOINTMENT: MutationEndpoint = MutationEndpoint {
  name: "create_appointment",
  resource: Appointment,
  method: Method::Post,
  path: "/appointments",
  description: "Book an appointment",
  body: Body::Rest,
  invalidates: create_invalidates,
};

pub static UPDATE_APPOINTMENT: MutationEndpoint = MutationEndpoint {
  name: "update_appointment",
  resource: Appointment,
  method: Method::Put,
  path: "/appointments/{id}",
  description: "Update an appointment (id, data)",
  body: Body::Field("data"),
  invalidates: appointment_and_list,
};

pub static CANCEL_APPOINTMENT: MutationEndpoint = MutationEndpoint {
  name: "cancel_appointment",
  resource: Appointment,
  method: Method::Put,
  path: "/appointments/{id}/cancel",
  description: "Cancel an appointment (id, reason)",
  body: Body::Rest,
  invalidates: appointment_and_list,
};

pub static RESCHEDULE_APPOINTMENT: MutationEndpoint = MutationEndpoint {
  name: "reschedule_appointment",
  resource: Appointment,
  method: Method::Put,
  path: "/appointments/{id}/reschedule",
  description: "Move an appointment (id, newDate, newTime, reason)",
  body: Body::Rest,
  invalidates: appointment_and_list,
};

pub static COMPLETE_APPOINTMENT: MutationEndpoint = MutationEndpoint {
  name: "complete_appointment",
  resource: Appointment,
  method: Method::Put,
  path: "/appointments/{id}/complete",
  description: "Close an appointment (id, diagnosis, prescription, notes, followUpDate)",
  body: Body::Rest,
  invalidates: complete_invalidates,
};

pub static QUERIES: &[&QueryEndpoint] = &[
  &GET_APPOINTMENTS,
  &GET_APPOINTMENT,
  &GET_TODAYS_APPOINTMENTS,
  &GET_UPCOMING_APPOINTMENTS,
  &GET_AVAILABLE_TIME_SLOTS,
];

pub static MUTATIONS: &[&MutationEndpoint] = &[
  &CREATE_APPOINTMENT,
  &UPDATE_APPOINTMENT,
  &CANCEL_APPOINTMENT,
  &RESCHEDULE_APPOINTMENT,
  &COMPLETE_APPOINTMENT,
];

fn appointment_list_tags(result: &Value, _: &Params) -> TagSet {
  list_with_ids(Appointment, result)
}

fn appointment_tag(_: &Value, params: &Params) -> TagSet {
  param_tag(Appointment, params, "id").into_iter().collect()
}

fn today_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Appointment, TagKey::Today)])
}

fn upcoming_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(Appointment, TagKey::Upcoming)])
}

fn no_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::new()
}

// A new booking changes doctor availability too.
fn create_invalidates(_: &Params) -> TagSet {
  TagSet::from([Tag::list(Appointment), Tag::list(Doctor)])
}

fn appointment_and_list(params: &Params) -> TagSet {
  let mut tags: TagSet = param_tag(Appointment, params, "id").into_iter().collect();
  tags.insert(Tag::list(Appointment));
  tags
}

fn complete_invalidates(params: &Params) -> TagSet {
  let mut tags = appointment_and_list(params);
  tags.insert(Tag::list(MedicalRecord));
  tags
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_complete_invalidates_medical_records() {
    let tags = COMPLETE_APPOINTMENT.invalidated_tags(&Params::new().with("id", "a1"));
    assert_eq!(
      tags,
      TagSet::from([
        Tag::id(Appointment, "a1"),
        Tag::list(Appointment),
        Tag::list(MedicalRecord),
      ])
    );
  }

  #[test]
  fn test_create_invalidates_doctor_list() {
    let tags = CREATE_APPOINTMENT.invalidated_tags(&Params::new());
    assert!(tags.contains(&Tag::list(Doctor)));
    assert!(tags.contains(&Tag::list(Appointment)));
  }

  #[test]
  fn test_reschedule_body() {
    let params = Params::new()
      .with("id", "a1")
      .with("newDate", "2026-11-02")
      .with("newTime", "10:30");
    let request = RESCHEDULE_APPOINTMENT.request(&params).unwrap();
    assert_eq!(request.path, "/appointments/a1/reschedule");
    assert_eq!(
      request.body,
      Some(json!({"newDate": "2026-11-02", "newTime": "10:30"}))
    );
  }

  #[test]
  fn test_time_slots_provide_nothing() {
    let params = Params::new().with("doctorId", "d1").with("date", "2026-11-02");
    assert!(GET_AVAILABLE_TIME_SLOTS
      .provided_tags(&json!({"data": ["09:00"]}), &params)
      .is_empty());
  }
}
