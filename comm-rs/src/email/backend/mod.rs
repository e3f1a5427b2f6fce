//! Transport backend implementations
//!
//! - [`direct`]: deliver straight to the recipient domain's MX hosts
//! - [`sendmail`]: pipe through the local sendmail binary
//! - [`ses`]: AWS Simple Email Service v2 API
//! - [`stub`]: in-memory backend for tests and development

pub mod direct;
pub mod sendmail;
pub mod ses;
pub mod stub;
