//! Communication layer for the Cadre organization simulator.
//!
//! Plan text produced by the planning layer embeds send directives in a
//! strict line grammar. This crate parses those directives, applies the
//! per-tick send rules (dedup, cooldown, target resolution, threading),
//! and forwards finalized messages to the delivery collaborator.
//!
//! # Modules
//!
//! - [`directive`] -- Strict parser for embedded send-directive lines
//! - [`hub`] -- [`CommunicationHub`]: scheduling, suppression rules, dispatch
//! - [`delivery`] -- Delivery backend dispatch (HTTP service or in-memory sink)
//! - [`error`] -- Error types ([`CommsError`], [`DirectiveError`])

pub mod delivery;
pub mod directive;
pub mod error;
pub mod hub;

// Re-export primary types at crate root for convenience.
pub use delivery::{DeliveryBackend, HttpDelivery, MemoryDelivery, OutgoingMessage};
pub use directive::{
    Directive, DirectiveTarget, DirectiveVerb, ParsedDirectives, RejectedLine, parse_plan_text,
};
pub use error::{CommsError, DirectiveError};
pub use hub::{
    CommunicationHub, Directory, DirectoryRoom, DirectoryWorker, DispatchReport, HubConfig,
    ScheduleOutcome, Suppression,
};
