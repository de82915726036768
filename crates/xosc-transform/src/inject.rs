//! Diversity injection
//!
//! [`Injector`] applies independent, probabilistically gated mutations to a
//! document. The draw sequence is fixed so a seeded generator reproduces the
//! same output:
//!
//! 1. pedestrian insertion (needs an `Entities` element)
//! 2. per `Environment`, its `TimeOfDay`
//! 3. per `Environment`, its `Weather`: cloud state, precipitation, each
//!    `Sun`, each `Fog`
//!
//! Time of day and precipitation are unconditional whenever the node exists.

use crate::error::{ConfigError, InjectionError};
use chrono::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use xosc_model::{ContentHash, Element, NodeId, ScenarioDocument, XmlTree};

/// Cloud states a mutation chooses from
pub const CLOUD_STATES: [&str; 5] = ["free", "cloudy", "skyOff", "overcast", "rainy"];

/// Precipitation types a mutation chooses from
pub const PRECIPITATION_TYPES: [&str; 3] = ["rain", "dry", "snow"];

/// 2019-01-01T00:00:00 and 2025-08-20T23:59:59, seconds since the epoch
const TIME_WINDOW: (i64, i64) = (1_546_300_800, 1_755_734_399);

const PEDESTRIAN_BASE_NAME: &str = "ped";

/// Mutation probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Chance of inserting one pedestrian
    pub pedestrian_rate: f64,
    /// Chance of replacing each weather's cloud state
    pub cloud_rate: f64,
    /// Chance of randomizing each `Sun`
    pub sun_rate: f64,
    /// Chance of randomizing each `Fog`
    pub fog_rate: f64,
}

impl InjectionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pedestrian_rate(mut self, rate: f64) -> Self {
        self.pedestrian_rate = rate;
        self
    }

    #[must_use]
    pub fn with_cloud_rate(mut self, rate: f64) -> Self {
        self.cloud_rate = rate;
        self
    }

    #[must_use]
    pub fn with_sun_rate(mut self, rate: f64) -> Self {
        self.sun_rate = rate;
        self
    }

    #[must_use]
    pub fn with_fog_rate(mut self, rate: f64) -> Self {
        self.fog_rate = rate;
        self
    }

    /// Every rate gated
    #[must_use]
    pub fn always() -> Self {
        Self {
            pedestrian_rate: 1.0,
            cloud_rate: 1.0,
            sun_rate: 1.0,
            fog_rate: 1.0,
        }
    }

    /// Check that every rate is a probability.
    ///
    /// # Errors
    /// Returns [`ConfigError::RateOutOfRange`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("pedestrian_rate", self.pedestrian_rate),
            ("cloud_rate", self.cloud_rate),
            ("sun_rate", self.sun_rate),
            ("fog_rate", self.fog_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { field, value });
            }
        }
        Ok(())
    }
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            pedestrian_rate: 0.2,
            cloud_rate: 0.2,
            sun_rate: 0.2,
            fog_rate: 1.0,
        }
    }
}

/// What an injection changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Name of the inserted pedestrian
    pub pedestrian: Option<String>,
    pub time_of_day: usize,
    pub cloud: usize,
    pub precipitation: usize,
    pub sun: usize,
    pub fog: usize,
}

impl fmt::Display for MutationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ped:{}, tod:{}, cloud:{}, precip:{}, sun:{}, fog:{}]",
            self.pedestrian.as_deref().unwrap_or("-"),
            self.time_of_day,
            self.cloud,
            self.precipitation,
            self.sun,
            self.fog
        )
    }
}

/// Mutated document plus its report
#[derive(Debug, Clone)]
pub struct Injection {
    pub document: ScenarioDocument,
    pub report: MutationReport,
}

/// Applies randomized mutations
#[derive(Debug, Clone, Copy)]
pub struct Injector {
    config: InjectionConfig,
}

impl Injector {
    /// Create an injector.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a rate is not a probability.
    pub fn new(config: InjectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    /// Mutate a document with the given random source.
    ///
    /// # Errors
    /// Returns [`InjectionError`] if the mutated tree cannot be re-indexed.
    pub fn inject<R: Rng + ?Sized>(
        &self,
        doc: ScenarioDocument,
        rng: &mut R,
    ) -> Result<Injection, InjectionError> {
        let mut report = MutationReport::default();
        let entities = doc.entities_container();
        let environments = doc.environments().to_vec();
        let taken: HashSet<String> = doc.entity_names().into_iter().map(str::to_owned).collect();
        let mut tree = doc.into_tree();

        if let Some(container) = entities {
            if rng.random_bool(self.config.pedestrian_rate) {
                let name = unique_name(&taken);
                append_pedestrian(&mut tree, container, &name);
                report.pedestrian = Some(name);
            }
        }

        for env in &environments {
            if let Some(tod) = env.time_of_day {
                if let Some(stamp) = random_date_time(rng) {
                    tree.set_attr(tod, "dateTime", stamp);
                    report.time_of_day += 1;
                }
            }
        }

        for env in &environments {
            if let Some(weather) = env.weather {
                self.mutate_weather(&mut tree, weather, rng, &mut report);
            }
        }

        tracing::debug!(%report, "mutations applied");
        let document = ScenarioDocument::from_tree(tree)?;
        Ok(Injection { document, report })
    }

    fn mutate_weather<R: Rng + ?Sized>(
        &self,
        tree: &mut XmlTree,
        weather: NodeId,
        rng: &mut R,
        report: &mut MutationReport,
    ) {
        if rng.random_bool(self.config.cloud_rate) {
            tree.set_attr(weather, "cloudState", pick(rng, &CLOUD_STATES));
            report.cloud += 1;
        }

        let precipitation: Vec<NodeId> = tree.children_named(weather, "Precipitation").collect();
        if precipitation.is_empty() {
            let intensity = fixed(rng.random_range(0.0..=1.0), 3);
            let element = Element::new("Precipitation")
                .with_attr("intensity", intensity)
                .with_attr("precipitationType", pick(rng, &PRECIPITATION_TYPES));
            tree.append_element(weather, element);
            report.precipitation += 1;
        } else {
            for node in precipitation {
                tree.set_attr(node, "precipitationType", pick(rng, &PRECIPITATION_TYPES));
                if tree.attr(node, "intensity").is_none() {
                    tree.set_attr(node, "intensity", fixed(rng.random_range(0.0..=1.0), 3));
                }
                report.precipitation += 1;
            }
        }

        let suns: Vec<NodeId> = tree.children_named(weather, "Sun").collect();
        for sun in suns {
            if rng.random_bool(self.config.sun_rate) {
                tree.set_attr(sun, "azimuth", fixed(rng.random_range(-PI..=PI), 6));
                tree.set_attr(sun, "elevation", fixed(rng.random_range(-FRAC_PI_2..=FRAC_PI_2), 6));
                tree.set_attr(sun, "intensity", fixed(rng.random_range(0.0..=1.0), 3));
                report.sun += 1;
            }
        }

        let fogs: Vec<NodeId> = tree.children_named(weather, "Fog").collect();
        for fog in fogs {
            if rng.random_bool(self.config.fog_rate) {
                tree.set_attr(fog, "visualRange", fixed(rng.random_range(0.0..=1000.0), 2));
                report.fog += 1;
            }
        }
    }
}

/// Per-file seed derived from the run seed and the file name
#[must_use]
pub fn seed_for(run_seed: u64, file_name: &str) -> u64 {
    let mut material = run_seed.to_le_bytes().to_vec();
    material.extend_from_slice(file_name.as_bytes());
    ContentHash::compute(&material).prefix_u64()
}

fn pick<R: Rng + ?Sized>(rng: &mut R, choices: &[&'static str]) -> &'static str {
    choices[rng.random_range(0..choices.len())]
}

fn fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

fn random_date_time<R: Rng + ?Sized>(rng: &mut R) -> Option<String> {
    let (start, end) = TIME_WINDOW;
    let secs = rng.random_range(start..=end);
    DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// `ped`, then `ped2`, `ped3`, ... until unused
fn unique_name(taken: &HashSet<String>) -> String {
    if !taken.contains(PEDESTRIAN_BASE_NAME) {
        return PEDESTRIAN_BASE_NAME.to_string();
    }
    (2u64..)
        .map(|i| format!("{PEDESTRIAN_BASE_NAME}{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_default()
}

fn append_pedestrian(tree: &mut XmlTree, container: NodeId, name: &str) {
    const MODEL: &str = "walker.pedestrian.0001";
    let object = tree.append_element(
        container,
        Element::new("ScenarioObject").with_attr("name", name),
    );
    let pedestrian = tree.append_element(
        object,
        Element::new("Pedestrian")
            .with_attr("model", MODEL)
            .with_attr("mass", "90.0")
            .with_attr("name", MODEL)
            .with_attr("pedestrianCategory", "pedestrian"),
    );
    tree.append_element(pedestrian, Element::new("ParameterDeclarations"));
    let bbox = tree.append_element(pedestrian, Element::new("BoundingBox"));
    tree.append_element(
        bbox,
        Element::new("Center")
            .with_attr("x", "1.5")
            .with_attr("y", "0.0")
            .with_attr("z", "0.9"),
    );
    tree.append_element(
        bbox,
        Element::new("Dimensions")
            .with_attr("width", "2.1")
            .with_attr("length", "4.5")
            .with_attr("height", "1.8"),
    );
    let properties = tree.append_element(pedestrian, Element::new("Properties"));
    tree.append_element(
        properties,
        Element::new("Property")
            .with_attr("name", "type")
            .with_attr("value", "simulation"),
    );
}
