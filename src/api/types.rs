//! Serde types matching the clinic API payloads.
//!
//! Fields the API may omit are defaulted so partial records still decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
  #[serde(default)]
  pub success: bool,
  pub data: T,
  pub message: Option<String>,
  #[serde(default)]
  pub errors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Pagination {
  pub current_page: u32,
  pub per_page: u32,
  pub total: u64,
  pub total_pages: u32,
  pub has_next_page: bool,
  pub has_prev_page: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginatedResponse<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Vec<T>,
  #[serde(default)]
  pub pagination: Pagination,
  pub message: Option<String>,
}

// ============================================================================
// Common nested types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
  pub street: String,
  pub city: String,
  pub state: String,
  pub zip_code: String,
  pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingHours {
  pub day: String,
  pub open_time: String,
  pub close_time: String,
  #[serde(default)]
  pub is_closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Prescription {
  pub medication: String,
  pub dosage: String,
  pub frequency: String,
  pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EmergencyContact {
  pub name: String,
  pub phone: String,
  pub relationship: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
  Other,
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub email: String,
  pub name: String,
  /// admin, doctor, nurse or receptionist
  pub role: String,
  pub avatar: Option<String>,
  pub phone: Option<String>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub address: Address,
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub email: String,
  pub website: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
  #[serde(default)]
  pub facilities: Vec<String>,
  #[serde(default)]
  pub operating_hours: Vec<OperatingHours>,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub total_reviews: u32,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
  pub id: String,
  pub first_name: String,
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub date_of_birth: String,
  pub gender: Option<Gender>,
  #[serde(default)]
  pub address: Address,
  pub emergency_contact: Option<EmergencyContact>,
  #[serde(default)]
  pub allergies: Vec<String>,
  #[serde(default)]
  pub medications: Vec<String>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
  pub id: String,
  #[serde(default)]
  pub user_id: String,
  #[serde(default)]
  pub specialization: String,
  #[serde(default)]
  pub experience: u32,
  #[serde(default)]
  pub qualifications: Vec<String>,
  pub bio: Option<String>,
  #[serde(default)]
  pub consultation_fee: f64,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub total_reviews: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
  Scheduled,
  Confirmed,
  InProgress,
  Completed,
  Cancelled,
  NoShow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
  Consultation,
  FollowUp,
  Emergency,
  Checkup,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
  pub id: String,
  pub patient_id: String,
  pub doctor_id: String,
  pub clinic_id: String,
  pub appointment_date: String,
  pub appointment_time: String,
  /// Minutes
  #[serde(default)]
  pub duration: u32,
  #[serde(rename = "type")]
  pub appointment_type: Option<AppointmentType>,
  pub status: AppointmentStatus,
  pub notes: Option<String>,
  #[serde(default)]
  pub symptoms: Vec<String>,
  pub diagnosis: Option<String>,
  #[serde(default)]
  pub prescription: Vec<Prescription>,
  pub follow_up_date: Option<String>,
  #[serde(default)]
  pub fee: f64,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
  pub id: String,
  pub patient_id: String,
  pub doctor_id: String,
  pub appointment_id: Option<String>,
  pub date: String,
  #[serde(rename = "type")]
  pub record_type: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub diagnosis: Option<String>,
  pub treatment: Option<String>,
  #[serde(default)]
  pub prescription: Vec<Prescription>,
  #[serde(default)]
  pub is_confidential: bool,
}

// ============================================================================
// Requests and filters
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort_by: Option<String>,
  /// asc or desc
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicFilters {
  #[serde(flatten)]
  pub pagination: PaginationParams,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub city: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub services: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFilters {
  #[serde(flatten)]
  pub pagination: PaginationParams,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilters {
  #[serde(flatten)]
  pub pagination: PaginationParams,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doctor_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub clinic_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<AppointmentStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_from: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
  pub user: User,
  pub token: String,
  pub refresh_token: Option<String>,
  pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
  pub patient_id: String,
  pub doctor_id: String,
  pub clinic_id: String,
  pub appointment_date: String,
  pub appointment_time: String,
  #[serde(rename = "type")]
  pub appointment_type: AppointmentType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClinicReview {
  pub clinic_id: String,
  pub rating: u8,
  pub comment: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub appointment_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicSearch {
  pub query: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub services: Vec<String>,
  /// Kilometres
  #[serde(skip_serializing_if = "Option::is_none")]
  pub radius: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyClinics {
  pub latitude: f64,
  pub longitude: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub radius: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doctor_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
  pub doctor_id: String,
  pub date: String,
  /// Minutes
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub phone: String,
  pub date_of_birth: String,
  pub gender: Gender,
  pub address: Address,
  pub emergency_contact: EmergencyContact,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub allergies: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub medications: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub appointment_date: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub appointment_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<AppointmentStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
  pub new_date: String,
  pub new_time: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
  pub name: String,
  pub email: String,
  pub password: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
  pub token: String,
  pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
  pub token: String,
  pub password: String,
  pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
  pub current_password: String,
  pub new_password: String,
  pub confirm_password: String,
}
