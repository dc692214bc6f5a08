//! Authentication endpoints. Only the calls are declared here; holding the
//! resulting token is the session owner's job.

use serde_json::Value;

use crate::api::params::Params;
use crate::api::registry::{Body, MutationEndpoint, QueryEndpoint};
use crate::api::transport::Method;
use crate::cache::tags::{ResourceType, Tag, TagKey, TagSet};

use ResourceType::User;

pub static GET_CURRENT_USER: QueryEndpoint = QueryEndpoint {
  name: "get_current_user",
  resource: User,
  path: "/auth/me",
  description: "The signed-in user",
  provides: current_user_tags,
};

pub static LOGIN: MutationEndpoint = MutationEndpoint {
  name: "login",
  resource: User,
  method: Method::Post,
  path: "/auth/login",
  description: "Email/password login (email, password)",
  body: Body::Rest,
  invalidates: current_user,
};

pub static REGISTER: MutationEndpoint = MutationEndpoint {
  name: "register",
  resource: User,
  method: Method::Post,
  path: "/auth/register",
  description: "Create an account (name, email, password, role)",
  body: Body::Rest,
  invalidates: nothing,
};

pub static REFRESH_TOKEN: MutationEndpoint = MutationEndpoint {
  name: "refresh_token",
  resource: User,
  method: Method::Post,
  path: "/auth/refresh",
  description: "Exchange a refresh token (refreshToken)",
  body: Body::Rest,
  invalidates: nothing,
};

pub static LOGOUT: MutationEndpoint = MutationEndpoint {
  name: "logout",
  resource: User,
  method: Method::Post,
  path: "/auth/logout",
  description: "End the session",
  body: Body::Empty,
  invalidates: current_user,
};

pub static FORGOT_PASSWORD: MutationEndpoint = MutationEndpoint {
  name: "forgot_password",
  resource: User,
  method: Method::Post,
  path: "/auth/forgot-password",
  description: "Send a reset email (email)",
  body: Body::Rest,
  invalidates: nothing,
};

pub static RESET_PASSWORD: MutationEndpoint = MutationEndpoint {
  name: "reset_password",
  resource: User,
  method: Method::Post,
  path: "/auth/reset-password",
  description: "Reset with an emailed token (token, password, confirmPassword)",
  body: Body::Rest,
  invalidates: nothing,
};

pub static CHANGE_PASSWORD: MutationEndpoint = MutationEndpoint {
  name: "change_password",
  resource: User,
  method: Method::Put,
  path: "/auth/change-password",
  description: "Change password (currentPassword, newPassword, confirmPassword)",
  body: Body::Rest,
  invalidates: current_user,
};

pub static QUERIES: &[&QueryEndpoint] = &[&GET_CURRENT_USER];

pub static MUTATIONS: &[&MutationEndpoint] = &[
  &LOGIN,
  &REGISTER,
  &REFRESH_TOKEN,
  &LOGOUT,
  &FORGOT_PASSWORD,
  &RESET_PASSWORD,
  &CHANGE_PASSWORD,
];

fn current_user_tags(_: &Value, _: &Params) -> TagSet {
  TagSet::from([Tag::new(User, TagKey::Current)])
}

fn current_user(_: &Params) -> TagSet {
  TagSet::from([Tag::new(User, TagKey::Current)])
}

fn nothing(_: &Params) -> TagSet {
  TagSet::new()
}
