//! API handlers for Wicket.
//!
//! `auth` holds the login surface (join, login, logout, password reset,
//! signature keys) and the request authentication shared by every protected
//! route; `health` reports service and database status.

pub mod auth;
pub mod health;
