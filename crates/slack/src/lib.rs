//! Slack integration surface for difychat.
//!
//! - **Install links** (`install`) - OAuth v2 authorize URL for "Add to Slack"
//! - **Signatures** (`signature`) - `X-Slack-Signature` verification for inbound requests
//! - **Events** (`events`) - Events API envelope parsing (URL verification, callbacks)
//!
//! The OAuth callback and token storage are handled outside this crate.

pub mod events;
pub mod install;
pub mod signature;

pub use events::{EventEnvelope, EventParseError, EventResponse};
pub use install::{InstallLinkBuilder, InstallLinkError};
pub use signature::{
    SignatureError, SignatureVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
