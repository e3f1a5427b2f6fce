//! comm-rs: communication facade for templated, localized email
//!
//! A thin layer that selects a transport (direct MX, sendmail, AWS SES,
//! or an in-memory stub) and composes templated, localized,
//! multi-recipient emails, with an optional inbound SMTP receiver.
//!
//! # Features
//!
//! - **Transports**: direct-to-MX, sendmail, AWS SES v2, stub — selected
//!   per send, with a configured default fallback
//! - **Templates**: tera bundles per template type (content, subject,
//!   attachments subtrees) with locale catalogs injected as a `t` helper
//! - **Fan-out**: one envelope per data item, dispatched concurrently,
//!   per-recipient outcomes aggregated into a single report
//! - **Receiver**: inbound SMTP listener with validators and quoted-text
//!   stripping
//!
//! # Example
//!
//! ```no_run
//! use comm_rs::config::Config;
//! use comm_rs::email::SendRequest;
//! use comm_rs::facade::Communications;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let comms = Communications::new(config).await?;
//!
//!     let email = comms.with("email", Some("ses")).expect("email configured");
//!     let settings = SendRequest::new(
//!         "noreply@example.com",
//!         vec!["alice@example.com".to_string()],
//!         "invitation",
//!     );
//!     let report = email
//!         .send_one(&settings, json!({ "user": { "name": "Alice" } }))
//!         .await?;
//!     println!("succeeded: {:?}", report.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: configuration structs and TOML loading
//! - [`error`]: error types and handling
//! - [`facade`]: protocol-name entry point
//! - [`email`]: assembly, transports, receiver
//! - [`i18n`]: locale catalogs for template rendering

pub mod config;
pub mod email;
pub mod error;
pub mod facade;
pub mod i18n;

// Re-export commonly used types
pub use config::Config;
pub use error::{CommError, Result};
pub use facade::Communications;
