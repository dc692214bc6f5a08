//! Typed clinic API client on top of the cache layer.

use color_eyre::Result as EyreResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::api::endpoints::{appointments, auth, clinics, patients};
use crate::api::types::{
  ApiResponse, Appointment, AppointmentFilters, ChangePasswordRequest, Clinic, ClinicFilters, ClinicSearch,
  CreateAppointmentRequest, CreateClinicReview, CreatePatientRequest, Doctor, LoginData, LoginRequest,
  MedicalRecord, NearbyClinics, PaginatedResponse, Patient, PatientFilters, RegisterRequest, RescheduleRequest,
  ResetPasswordRequest, SlotQuery, TokenPair, UpcomingFilters, UpdateAppointmentRequest, User,
};
use crate::api::{ApiError, Credentials, HttpTransport, MutationEndpoint, Params, QueryEndpoint};
use crate::cache::CacheLayer;
use crate::config::Config;

/// Clinic API client with transparent caching.
///
/// Reads go through the cache layer; writes invalidate the tags they touch.
#[derive(Clone)]
pub struct ClinicClient {
  layer: CacheLayer,
  credentials: Credentials,
}

impl ClinicClient {
  pub fn new(layer: CacheLayer, credentials: Credentials) -> Self {
    Self { layer, credentials }
  }

  /// HTTP transport and cache built from configuration. The credential is
  /// read from `CLINIC_API_TOKEN`.
  pub fn from_config(config: &Config) -> EyreResult<Self> {
    let credentials = Credentials::from_env();
    let transport = HttpTransport::new(&config.api, credentials.clone())?;
    let layer = CacheLayer::new(Arc::new(transport), config.cache.clone());
    Ok(Self::new(layer, credentials))
  }

  pub fn layer(&self) -> &CacheLayer {
    &self.layer
  }

  pub fn credentials(&self) -> &Credentials {
    &self.credentials
  }

  // Clinics

  pub async fn get_clinics(&self, filters: &ClinicFilters) -> Result<PaginatedResponse<Clinic>, ApiError> {
    self
      .read_page(&clinics::GET_CLINICS, Params::from_serialize(filters)?)
      .await
  }

  pub async fn get_clinic(&self, id: &str) -> Result<Clinic, ApiError> {
    self
      .read(&clinics::GET_CLINIC, Params::new().with("id", id))
      .await
  }

  pub async fn get_featured_clinics(&self, limit: Option<u32>) -> Result<Vec<Clinic>, ApiError> {
    let mut params = Params::new();
    if let Some(limit) = limit {
      params.insert("limit", limit);
    }
    self.read(&clinics::GET_FEATURED_CLINICS, params).await
  }

  pub async fn search_clinics(&self, search: &ClinicSearch) -> Result<Vec<Clinic>, ApiError> {
    self
      .read(&clinics::SEARCH_CLINICS, Params::from_serialize(search)?)
      .await
  }

  pub async fn get_clinic_doctors(&self, clinic_id: &str) -> Result<Vec<Doctor>, ApiError> {
    self
      .read(
        &clinics::GET_CLINIC_DOCTORS,
        Params::new().with("clinicId", clinic_id),
      )
      .await
  }

  /// Reviews are passed through untyped; their shape differs between API
  /// versions.
  pub async fn get_clinic_reviews(
    &self,
    clinic_id: &str,
    page: Option<u32>,
    limit: Option<u32>,
  ) -> Result<Vec<Value>, ApiError> {
    let mut params = Params::new().with("clinicId", clinic_id);
    if let Some(page) = page {
      params.insert("page", page);
    }
    if let Some(limit) = limit {
      params.insert("limit", limit);
    }
    self.read(&clinics::GET_CLINIC_REVIEWS, params).await
  }

  pub async fn get_nearby_clinics(&self, near: &NearbyClinics) -> Result<Vec<Clinic>, ApiError> {
    self
      .read(&clinics::GET_NEARBY_CLINICS, Params::from_serialize(near)?)
      .await
  }

  pub async fn get_clinic_services(&self, clinic_id: &str) -> Result<Vec<String>, ApiError> {
    self
      .read(
        &clinics::GET_CLINIC_SERVICES,
        Params::new().with("clinicId", clinic_id),
      )
      .await
  }

  pub async fn create_clinic_review(&self, review: &CreateClinicReview) -> Result<Value, ApiError> {
    self
      .write(&clinics::CREATE_CLINIC_REVIEW, Params::from_serialize(review)?)
      .await
  }

  // Patients

  pub async fn get_patients(&self, filters: &PatientFilters) -> Result<PaginatedResponse<Patient>, ApiError> {
    self
      .read_page(&patients::GET_PATIENTS, Params::from_serialize(filters)?)
      .await
  }

  pub async fn get_patient(&self, id: &str) -> Result<Patient, ApiError> {
    self
      .read(&patients::GET_PATIENT, Params::new().with("id", id))
      .await
  }

  pub async fn search_patients(&self, query: &str) -> Result<Vec<Patient>, ApiError> {
    self
      .read(&patients::SEARCH_PATIENTS, Params::new().with("q", query))
      .await
  }

  pub async fn get_patient_medical_history(&self, patient_id: &str) -> Result<Vec<MedicalRecord>, ApiError> {
    self
      .read(
        &patients::GET_PATIENT_MEDICAL_HISTORY,
        Params::new().with("patientId", patient_id),
      )
      .await
  }

  pub async fn get_patient_appointments(&self, patient_id: &str) -> Result<Vec<Appointment>, ApiError> {
    self
      .read(
        &patients::GET_PATIENT_APPOINTMENTS,
        Params::new().with("patientId", patient_id),
      )
      .await
  }

  pub async fn create_patient(&self, request: &CreatePatientRequest) -> Result<Patient, ApiError> {
    let value = self
      .write(&patients::CREATE_PATIENT, Params::from_serialize(request)?)
      .await?;
    unwrap_data(&value)
  }

  /// Partial update; `data` is sent as the request body.
  pub async fn update_patient<T: Serialize>(&self, id: &str, data: &T) -> Result<Patient, ApiError> {
    let value = self
      .write(&patients::UPDATE_PATIENT, with_data(id, data)?)
      .await?;
    unwrap_data(&value)
  }

  pub async fn delete_patient(&self, id: &str) -> Result<(), ApiError> {
    self
      .write(&patients::DELETE_PATIENT, Params::new().with("id", id))
      .await
      .map(|_| ())
  }

  // Appointments

  pub async fn get_appointments(
    &self,
    filters: &AppointmentFilters,
  ) -> Result<PaginatedResponse<Appointment>, ApiError> {
    self
      .read_page(
        &appointments::GET_APPOINTMENTS,
        Params::from_serialize(filters)?,
      )
      .await
  }

  pub async fn get_appointment(&self, id: &str) -> Result<Appointment, ApiError> {
    self
      .read(&appointments::GET_APPOINTMENT, Params::new().with("id", id))
      .await
  }

  pub async fn get_todays_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
    self
      .read(&appointments::GET_TODAYS_APPOINTMENTS, Params::new())
      .await
  }

  pub async fn get_upcoming_appointments(&self, filters: &UpcomingFilters) -> Result<Vec<Appointment>, ApiError> {
    self
      .read(
        &appointments::GET_UPCOMING_APPOINTMENTS,
        Params::from_serialize(filters)?,
      )
      .await
  }

  /// Free `HH:MM` slots for a doctor on one date.
  pub async fn get_available_time_slots(&self, query: &SlotQuery) -> Result<Vec<String>, ApiError> {
    self
      .read(
        &appointments::GET_AVAILABLE_TIME_SLOTS,
        Params::from_serialize(query)?,
      )
      .await
  }

  pub async fn create_appointment(&self, request: &CreateAppointmentRequest) -> Result<Appointment, ApiError> {
    let value = self
      .write(
        &appointments::CREATE_APPOINTMENT,
        Params::from_serialize(request)?,
      )
      .await?;
    unwrap_data(&value)
  }

  pub async fn update_appointment(
    &self,
    id: &str,
    update: &UpdateAppointmentRequest,
  ) -> Result<Appointment, ApiError> {
    let value = self
      .write(&appointments::UPDATE_APPOINTMENT, with_data(id, update)?)
      .await?;
    unwrap_data(&value)
  }

  pub async fn reschedule_appointment(
    &self,
    id: &str,
    request: &RescheduleRequest,
  ) -> Result<Appointment, ApiError> {
    let mut params = Params::from_serialize(request)?;
    params.insert("id", id);
    let value = self
      .write(&appointments::RESCHEDULE_APPOINTMENT, params)
      .await?;
    unwrap_data(&value)
  }

  pub async fn cancel_appointment(&self, id: &str, reason: Option<&str>) -> Result<Value, ApiError> {
    let mut params = Params::new().with("id", id);
    if let Some(reason) = reason {
      params.insert("reason", reason);
    }
    self.write(&appointments::CANCEL_APPOINTMENT, params).await
  }

  pub async fn complete_appointment(&self, id: &str, diagnosis: &str, notes: Option<&str>) -> Result<Value, ApiError> {
    let mut params = Params::new().with("id", id).with("diagnosis", diagnosis);
    if let Some(notes) = notes {
      params.insert("notes", notes);
    }
    self.write(&appointments::COMPLETE_APPOINTMENT, params).await
  }

  // Session

  pub async fn get_current_user(&self) -> Result<User, ApiError> {
    self.read(&auth::GET_CURRENT_USER, Params::new()).await
  }

  /// Log in and keep the returned token for later requests.
  pub async fn login(&self, request: &LoginRequest) -> Result<LoginData, ApiError> {
    let value = self
      .write(&auth::LOGIN, Params::from_serialize(request)?)
      .await?;
    let data: LoginData = unwrap_data(&value)?;
    self.credentials.set(data.token.clone());
    info!(user = %data.user.email, "Logged in");
    Ok(data)
  }

  /// Create an account. Does not sign in.
  pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
    #[derive(Deserialize)]
    struct Registered {
      user: User,
    }

    let value = self
      .write(&auth::REGISTER, Params::from_serialize(request)?)
      .await?;
    unwrap_data::<Registered>(&value).map(|r| r.user)
  }

  /// Exchange a refresh token and keep the new bearer token.
  pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
    let value = self
      .write(
        &auth::REFRESH_TOKEN,
        Params::new().with("refreshToken", refresh_token),
      )
      .await?;
    let pair: TokenPair = unwrap_data(&value)?;
    self.credentials.set(pair.token.clone());
    Ok(pair)
  }

  pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
    self
      .write(&auth::FORGOT_PASSWORD, Params::new().with("email", email))
      .await
      .map(|_| ())
  }

  pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), ApiError> {
    self
      .write(&auth::RESET_PASSWORD, Params::from_serialize(request)?)
      .await
      .map(|_| ())
  }

  pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError> {
    self
      .write(&auth::CHANGE_PASSWORD, Params::from_serialize(request)?)
      .await
      .map(|_| ())
  }

  /// End the session. The credential and every cached entry are dropped even
  /// when the server call fails.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let outcome = self.write(&auth::LOGOUT, Params::new()).await;
    self.credentials.clear();
    self.layer.reset();
    outcome.map(|_| ())
  }

  async fn read<T: DeserializeOwned>(
    &self,
    endpoint: &'static QueryEndpoint,
    params: Params,
  ) -> Result<T, ApiError> {
    let result = self.layer.query(endpoint, params).await?;
    unwrap_data(&result.data)
  }

  async fn read_page<T: DeserializeOwned>(
    &self,
    endpoint: &'static QueryEndpoint,
    params: Params,
  ) -> Result<PaginatedResponse<T>, ApiError> {
    self.layer.query(endpoint, params).await?.decode()
  }

  async fn write(&self, endpoint: &'static MutationEndpoint, params: Params) -> Result<Value, ApiError> {
    self.layer.mutate(endpoint, params).await
  }
}

/// `{ id, data }` params for endpoints whose body is the `data` field.
fn with_data<T: Serialize + ?Sized>(id: &str, data: &T) -> Result<Params, ApiError> {
  let data = serde_json::to_value(data)
    .map_err(|e| ApiError::invalid_request("data", format!("Unserializable data: {}", e)))?;
  Ok(Params::new().with("id", id).with("data", data))
}

/// Payload of a `{ success, data, message }` envelope.
fn unwrap_data<T: DeserializeOwned>(value: &Value) -> Result<T, ApiError> {
  ApiResponse::<T>::deserialize(value)
    .map(|response| response.data)
    .map_err(|e| ApiError::transport(format!("Unexpected response shape: {}", e)))
}
