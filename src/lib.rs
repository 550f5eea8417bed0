//! Notekeep - personal notes service
//!
//! Email one-time passcodes and Google sign-in issue stateless JWT sessions
//! that guard per-account note storage.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mailer;
pub mod note;
pub mod oauth;
pub mod server;
pub mod session;
