//! Email protocol: assembly, transports, inbound receiver
//!
//! - [`assembler`]: template + attachment orchestration into envelopes
//! - [`templates`]: tera adapter for the on-disk template layout
//! - [`attachments`]: static attachment discovery and merging
//! - [`transport`]: backend trait and registry
//! - [`backend`]: direct, sendmail, SES, and stub backends
//! - [`interface`]: the per-protocol façade (`send`/`receive`)
//! - [`receiver`]: inbound SMTP listener
//! - [`cleanup`]: reply/signature stripping for inbound text

pub mod assembler;
pub mod attachments;
pub mod backend;
pub mod cleanup;
pub mod dns;
pub mod interface;
pub mod message;
pub mod receiver;
pub mod templates;
pub mod transport;

/// Template variables for one recipient/outcome, opaque to this crate.
pub type DataItem = serde_json::Value;

pub use assembler::{EmailAssembler, RenderedEnvelope};
pub use attachments::{AttachmentRef, AttachmentResolver, ResolvedAttachment};
pub use interface::{EmailInterface, SendReport};
pub use message::{OutboundEmail, SendRequest};
pub use receiver::{EmailReceiver, InboundEmail};
pub use templates::TemplateRenderer;
pub use transport::{SendOutcome, Transport, TransportRegistry};
