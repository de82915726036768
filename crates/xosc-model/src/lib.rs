//! XOSC Document Model
//!
//! Typed, namespace-insensitive model of scene-description documents.
//!
//! # Core Concepts
//!
//! - [`XmlTree`]: arena of XML nodes addressed by stable [`NodeId`]s
//! - [`ScenarioDocument`]: parsed document plus a typed index of entities,
//!   entity-to-action bindings, maneuver groups, stories and environments
//! - [`EntityKind`]: category of a scenario object (ego, vehicle, pedestrian, misc)
//! - [`ContentHash`]: 32-byte Blake3 hash of document text
//!
//! # Example
//!
//! ```rust,ignore
//! use xosc_model::ScenarioDocument;
//!
//! let doc = ScenarioDocument::parse(&text)?;
//! for entity in doc.entities() {
//!     println!("{} -> {}", entity.name, entity.kind);
//! }
//! let xml = doc.to_xml()?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod document;
mod entity;
mod error;
mod hash;
mod reader;
mod tree;
mod writer;

// Re-exports
pub use document::{
    EnvironmentRef, ManeuverGroup, PrivateBinding, RoadNetworkRef, ScenarioDocument, Story,
};
pub use entity::{Capabilities, EntityKind, ScenarioObject, EGO_NAME};
pub use error::{ParseError, SerializeError};
pub use hash::ContentHash;
pub use reader::parse_tree;
pub use tree::{Attribute, Element, NodeId, NodeKind, QualifiedName, XmlTree};
pub use writer::write_tree;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
