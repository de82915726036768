//! Feature extraction
//!
//! [`extract`] walks a [`ScenarioDocument`] and produces a [`FeatureDigest`],
//! a flat read view used as the prompt for description generation. Missing
//! substructures leave the corresponding field empty; extraction never fails.
//!
//! Field precedence (first present, non-empty value wins):
//!
//! | Field | Source |
//! |-------|--------|
//! | map | `RoadNetwork/LogicFile` `filepath`, then `file` |
//! | time of day | `Environment/TimeOfDay` `dateTime`, then `animation` |
//! | weather | first `Environment/Weather` and its first `Precipitation`, `Fog`, `Wind` |
//! | entities | `Entities/ScenarioObject`, ego name wins, then pedestrian > misc > vehicle |
//! | initial positions | `Init/Actions/Private` teleports to a `WorldPosition` |
//! | events | every `Event` below `Storyboard` |

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use xosc_model::{EntityKind, NodeId, ScenarioDocument, XmlTree};

/// Rendering caps
const MAX_ENTITIES: usize = 10;
const MAX_POSITIONS: usize = 6;
const MAX_EVENTS: usize = 10;

/// Rendered when every field is empty
pub const EMPTY_DIGEST: &str = "No features extracted.";

const TELEPORT_PATH: [&str; 4] = ["PrivateAction", "TeleportAction", "Position", "WorldPosition"];

/// Weather summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherDigest {
    pub cloud_state: Option<String>,
    pub precipitation: Option<String>,
    pub fog: Option<String>,
    pub wind: Option<String>,
}

impl WeatherDigest {
    /// `key=value` pairs for present fields, in declaration order
    fn parts(&self) -> Vec<String> {
        [
            ("cloud_state", &self.cloud_state),
            ("precipitation", &self.precipitation),
            ("fog", &self.fog),
            ("wind", &self.wind),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}")))
        .collect()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts().is_empty()
    }
}

/// Named entity with its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

/// Teleport target of an init binding; coordinates are kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialPosition {
    pub entity: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
    pub h: Option<String>,
}

/// Compact semantic summary of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDigest {
    pub map: Option<String>,
    pub time_of_day: Option<String>,
    pub weather: WeatherDigest,
    pub entities: Vec<EntitySummary>,
    pub initial_positions: Vec<InitialPosition>,
    pub events: Vec<String>,
}

impl FeatureDigest {
    /// Set the map when the document did not name one
    pub fn fill_map(&mut self, fallback: impl Into<String>) {
        if self.map.is_none() {
            self.map = Some(fallback.into());
        }
    }

    /// Flatten into labeled lines (see [`render`])
    #[inline]
    #[must_use]
    pub fn render(&self) -> String {
        render(self)
    }
}

/// Summarize a document.
#[must_use]
pub fn extract(doc: &ScenarioDocument) -> FeatureDigest {
    let tree = doc.tree();
    FeatureDigest {
        map: doc.road_network().and_then(|r| r.logic_file.clone()),
        time_of_day: time_of_day(doc),
        weather: weather(doc),
        entities: doc
            .entities()
            .iter()
            .filter(|e| {
                !e.name.is_empty()
                    && tree
                        .parent(e.node)
                        .is_some_and(|p| tree.is_named(p, "Entities"))
            })
            .map(|e| EntitySummary {
                name: e.name.clone(),
                kind: e.kind,
            })
            .collect(),
        initial_positions: doc
            .privates()
            .iter()
            .filter(|p| p.in_init)
            .filter_map(|p| {
                let wp = tree.first_child_path(p.node, &TELEPORT_PATH)?;
                let coord = |key: &str| tree.attr(wp, key).map(str::to_owned);
                Some(InitialPosition {
                    entity: p.entity_ref.clone(),
                    x: coord("x"),
                    y: coord("y"),
                    z: coord("z"),
                    h: coord("h"),
                })
            })
            .collect(),
        events: doc
            .storyboard()
            .map(|sb| {
                tree.descendants_named(sb, "Event")
                    .filter_map(|ev| describe_event(tree, ev))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn non_empty_attr<'t>(tree: &'t XmlTree, id: NodeId, key: &str) -> Option<&'t str> {
    tree.element(id)?.attr_non_empty(key)
}

fn time_of_day(doc: &ScenarioDocument) -> Option<String> {
    let tree = doc.tree();
    let tod = doc.environments().iter().find_map(|e| e.time_of_day)?;
    non_empty_attr(tree, tod, "dateTime")
        .or_else(|| non_empty_attr(tree, tod, "animation"))
        .map(str::to_owned)
}

fn weather(doc: &ScenarioDocument) -> WeatherDigest {
    let tree = doc.tree();
    let Some(w) = doc.environments().iter().find_map(|e| e.weather) else {
        return WeatherDigest::default();
    };

    let precipitation = tree.first_child_named(w, "Precipitation").and_then(|p| {
        let kind = non_empty_attr(tree, p, "precipitationType");
        let intensity = non_empty_attr(tree, p, "intensity");
        match (kind, intensity) {
            (Some(k), Some(i)) => Some(format!("{k} (intensity={i})")),
            (Some(k), None) => Some(k.to_owned()),
            (None, Some(i)) => Some(format!("intensity={i}")),
            (None, None) => None,
        }
    });

    let wind = tree.first_child_named(w, "Wind").and_then(|wind| {
        let direction = non_empty_attr(tree, wind, "direction");
        let speed = non_empty_attr(tree, wind, "speed");
        match (direction, speed) {
            (Some(d), Some(s)) => Some(format!("dir={d}, speed={s}")),
            (d, s) => d.or(s).map(str::to_owned),
        }
    });

    WeatherDigest {
        cloud_state: non_empty_attr(tree, w, "cloudState").map(str::to_owned),
        precipitation,
        fog: tree
            .first_child_named(w, "Fog")
            .and_then(|f| non_empty_attr(tree, f, "visualRange"))
            .map(str::to_owned),
        wind,
    }
}

/// `<name> [when sim_time <rule> <v>s | after <v>s] [actions=<leaf>,...]`
fn describe_event(tree: &XmlTree, event: NodeId) -> Option<String> {
    let mut bits: Vec<String> = Vec::new();
    if let Some(name) = non_empty_attr(tree, event, "name") {
        bits.push(name.to_owned());
    }

    let clause = tree
        .first_child_named(event, "StartTrigger")
        .and_then(|trigger| {
            tree.descendants_named(trigger, "SimulationTimeCondition")
                .filter(|&c| {
                    tree.parent(c)
                        .is_some_and(|p| tree.is_named(p, "ByValueCondition"))
                })
                .find_map(|c| {
                    let value = non_empty_attr(tree, c, "value")?;
                    Some(match non_empty_attr(tree, c, "rule") {
                        Some(rule) => format!("when sim_time {rule} {value}s"),
                        None => format!("after {value}s"),
                    })
                })
        });
    bits.extend(clause);

    let kinds: Vec<&str> = tree
        .children_named(event, "Action")
        .filter_map(|action| leaf_action_kind(tree, action))
        .collect();
    if !kinds.is_empty() {
        bits.push(format!("actions={}", kinds.join(",")));
    }

    (!bits.is_empty()).then(|| bits.join(" "))
}

/// First childless element below an action in document order, falling back
/// to the action's direct child
fn leaf_action_kind(tree: &XmlTree, action: NodeId) -> Option<&str> {
    tree.descendant_elements(action)
        .find(|&n| tree.element_children(n).next().is_none())
        .or_else(|| tree.element_children(action).next())
        .and_then(|n| tree.local_name(n))
}

/// Flatten a digest into labeled lines.
///
/// Lines appear in field order and are omitted when their field is empty;
/// a fully empty digest renders as [`EMPTY_DIGEST`].
#[must_use]
pub fn render(digest: &FeatureDigest) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(map) = &digest.map {
        lines.push(format!("Map: {map}"));
    }
    if let Some(tod) = &digest.time_of_day {
        lines.push(format!("TimeOfDay: {tod}"));
    }
    let weather = digest.weather.parts();
    if !weather.is_empty() {
        lines.push(format!("Weather: {}", weather.join(", ")));
    }
    if !digest.entities.is_empty() {
        let entities: Vec<String> = digest
            .entities
            .iter()
            .take(MAX_ENTITIES)
            .map(|e| format!("{}({})", e.name, e.kind))
            .collect();
        lines.push(format!("Entities: {}", entities.join(", ")));
    }
    if !digest.initial_positions.is_empty() {
        let positions: Vec<String> = digest
            .initial_positions
            .iter()
            .take(MAX_POSITIONS)
            .map(|p| {
                let show = |v: &Option<String>| v.as_deref().unwrap_or("n/a").to_owned();
                let mut s = String::new();
                let _ = write!(
                    s,
                    "{}@({},{},{},h={})",
                    show(&p.entity),
                    show(&p.x),
                    show(&p.y),
                    show(&p.z),
                    show(&p.h)
                );
                s
            })
            .collect();
        lines.push(format!("InitialPositions: {}", positions.join("; ")));
    }
    if !digest.events.is_empty() {
        let events: Vec<&str> = digest
            .events
            .iter()
            .take(MAX_EVENTS)
            .map(String::as_str)
            .collect();
        lines.push(format!("Events: {}", events.join(" | ")));
    }

    if lines.is_empty() {
        EMPTY_DIGEST.to_string()
    } else {
        lines.join("\n")
    }
}
