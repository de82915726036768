//! XOSC Transformations
//!
//! Read and rewrite scene-description documents.
//!
//! # Core Concepts
//!
//! - [`extract`] / [`render`]: semantic digest of a document and its prompt text
//! - [`Reducer`]: prune to ego, one secondary vehicle, pedestrians, one story
//! - [`Injector`]: seeded random mutations of environment and entities
//! - [`ValidationGate`]: schema check every transformed document must pass
//!
//! # Example
//!
//! ```rust,ignore
//! use rand::{rngs::StdRng, SeedableRng};
//! use xosc_transform::{seed_for, InjectionConfig, Injector, Reducer};
//!
//! let reduced = Reducer::new().reduce(doc)?;
//! let xml = gate.admit(&reduced.document)?;
//!
//! let mut rng = StdRng::seed_from_u64(seed_for(42, "scenario.xosc"));
//! let injected = Injector::new(InjectionConfig::default())?.inject(doc, &mut rng)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod extract;
mod inject;
mod reduce;
mod validate;

pub use error::{ConfigError, GateError, InjectionError, ReductionError};
pub use extract::{
    extract, render, EntitySummary, FeatureDigest, InitialPosition, WeatherDigest, EMPTY_DIGEST,
};
pub use inject::{
    seed_for, InjectionConfig, Injection, Injector, MutationReport, CLOUD_STATES,
    PRECIPITATION_TYPES,
};
pub use reduce::{Reducer, Reduction, ReductionReport};
pub use validate::{
    declared_elements, SchemaValidator, ValidationGate, Verdict, VocabularyValidator,
    XmllintValidator,
};
