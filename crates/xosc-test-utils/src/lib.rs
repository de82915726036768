//! Testing utilities for the XOSC workspace
//!
//! Fixture builders producing scenario documents as text, plus proptest
//! strategies over them.

#![allow(missing_docs)]

use proptest::prelude::*;
use std::fmt::Write as _;
use xosc_model::{ScenarioDocument, EGO_NAME};

/// Capability tags of a fixture object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cap {
    Vehicle,
    Pedestrian,
    Misc,
    VehicleAndPedestrian,
    /// Catalog reference only
    None,
}

#[derive(Debug, Clone)]
pub struct WeatherSpec {
    pub cloud_state: String,
    pub sun: bool,
    pub fog: Option<String>,
    pub precipitation: Option<(Option<String>, Option<String>)>,
    pub wind: Option<(String, String)>,
}

impl Default for WeatherSpec {
    fn default() -> Self {
        Self {
            cloud_state: "free".to_string(),
            sun: true,
            fog: Some("100000.0".to_string()),
            precipitation: Some((Some("dry".to_string()), Some("0.0".to_string()))),
            wind: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    pub actors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorySpec {
    pub name: String,
    pub groups: Vec<GroupSpec>,
}

/// Builder for scenario document text
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    map: Option<String>,
    entities: Vec<(String, Cap)>,
    privates: Vec<(String, (f64, f64))>,
    time_of_day: Option<String>,
    weather: Option<WeatherSpec>,
    environment: bool,
    stories: Vec<StorySpec>,
}

impl ScenarioBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn map(mut self, name: &str) -> Self {
        self.map = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn entity(mut self, name: &str, cap: Cap) -> Self {
        self.entities.push((name.to_string(), cap));
        self
    }

    #[must_use]
    pub fn ego(self) -> Self {
        self.entity(EGO_NAME, Cap::Vehicle)
    }

    /// Init binding with a teleport to a world position
    #[must_use]
    pub fn private(mut self, entity: &str, x: f64, y: f64) -> Self {
        self.privates.push((entity.to_string(), (x, y)));
        self
    }

    /// Environment with a time of day and a default weather
    #[must_use]
    pub fn environment(mut self, date_time: &str) -> Self {
        self.environment = true;
        self.time_of_day = Some(date_time.to_string());
        self.weather.get_or_insert_with(WeatherSpec::default);
        self
    }

    #[must_use]
    pub fn weather(mut self, weather: WeatherSpec) -> Self {
        self.environment = true;
        self.weather = Some(weather);
        self
    }

    #[must_use]
    pub fn story(mut self, name: &str, groups: &[(&str, &[&str])]) -> Self {
        self.stories.push(StorySpec {
            name: name.to_string(),
            groups: groups
                .iter()
                .map(|(group, actors)| GroupSpec {
                    name: (*group).to_string(),
                    actors: actors.iter().map(|a| (*a).to_string()).collect(),
                })
                .collect(),
        });
        self
    }

    /// Render the document text
    #[must_use]
    pub fn build(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<OpenSCENARIO>\n");
        out.push_str(
            "  <FileHeader revMajor=\"1\" revMinor=\"0\" date=\"2020-03-20T12:00:00\" description=\"fixture\" author=\"xosc\"/>\n",
        );
        out.push_str("  <ParameterDeclarations/>\n  <CatalogLocations/>\n");
        if let Some(map) = &self.map {
            let _ = writeln!(
                out,
                "  <RoadNetwork>\n    <LogicFile filepath=\"{map}\"/>\n    <SceneGraphFile filepath=\"\"/>\n  </RoadNetwork>"
            );
        }
        out.push_str("  <Entities>\n");
        for (name, cap) in &self.entities {
            let _ = writeln!(out, "    <ScenarioObject name=\"{name}\">");
            out.push_str(&capability_xml(*cap));
            out.push_str("    </ScenarioObject>\n");
        }
        out.push_str("  </Entities>\n  <Storyboard>\n    <Init>\n      <Actions>\n");
        if self.environment {
            out.push_str(&self.environment_xml());
        }
        for (entity, (x, y)) in &self.privates {
            let _ = writeln!(
                out,
                "        <Private entityRef=\"{entity}\">\n          <PrivateAction>\n            <TeleportAction>\n              <Position>\n                <WorldPosition x=\"{x}\" y=\"{y}\" z=\"0\" h=\"0\"/>\n              </Position>\n            </TeleportAction>\n          </PrivateAction>\n        </Private>"
            );
        }
        out.push_str("      </Actions>\n    </Init>\n");
        for story in &self.stories {
            out.push_str(&story_xml(story));
        }
        out.push_str(
            "    <StopTrigger>\n      <ConditionGroup>\n        <Condition name=\"end\" delay=\"0\" conditionEdge=\"rising\">\n          <ByValueCondition>\n            <SimulationTimeCondition value=\"60\" rule=\"greaterThan\"/>\n          </ByValueCondition>\n        </Condition>\n      </ConditionGroup>\n    </StopTrigger>\n",
        );
        out.push_str("  </Storyboard>\n</OpenSCENARIO>\n");
        out
    }

    /// Render and parse
    ///
    /// # Panics
    /// Panics if the fixture does not parse.
    #[must_use]
    pub fn document(&self) -> ScenarioDocument {
        ScenarioDocument::parse(&self.build()).expect("fixture parses")
    }

    fn environment_xml(&self) -> String {
        let mut out = String::from(
            "        <GlobalAction>\n          <EnvironmentAction>\n            <Environment name=\"Environment1\">\n",
        );
        if let Some(tod) = &self.time_of_day {
            let _ = writeln!(
                out,
                "              <TimeOfDay animation=\"false\" dateTime=\"{tod}\"/>"
            );
        }
        if let Some(weather) = &self.weather {
            let _ = writeln!(
                out,
                "              <Weather cloudState=\"{}\">",
                weather.cloud_state
            );
            if weather.sun {
                out.push_str(
                    "                <Sun intensity=\"1.0\" azimuth=\"0.0\" elevation=\"1.31\"/>\n",
                );
            }
            if let Some(range) = &weather.fog {
                let _ = writeln!(out, "                <Fog visualRange=\"{range}\"/>");
            }
            if let Some((kind, intensity)) = &weather.precipitation {
                out.push_str("                <Precipitation");
                if let Some(kind) = kind {
                    let _ = write!(out, " precipitationType=\"{kind}\"");
                }
                if let Some(intensity) = intensity {
                    let _ = write!(out, " intensity=\"{intensity}\"");
                }
                out.push_str("/>\n");
            }
            if let Some((direction, speed)) = &weather.wind {
                let _ = writeln!(
                    out,
                    "                <Wind direction=\"{direction}\" speed=\"{speed}\"/>"
                );
            }
            out.push_str("              </Weather>\n");
        }
        out.push_str(
            "              <RoadCondition frictionScaleFactor=\"1.0\"/>\n            </Environment>\n          </EnvironmentAction>\n        </GlobalAction>\n",
        );
        out
    }
}

fn capability_xml(cap: Cap) -> String {
    const VEHICLE: &str = "      <Vehicle name=\"vehicle.tesla.model3\" vehicleCategory=\"car\">\n        <ParameterDeclarations/>\n      </Vehicle>\n";
    const PEDESTRIAN: &str = "      <Pedestrian model=\"walker.pedestrian.0001\" mass=\"90.0\" name=\"walker\" pedestrianCategory=\"pedestrian\">\n        <ParameterDeclarations/>\n      </Pedestrian>\n";
    const MISC: &str = "      <MiscObject miscObjectCategory=\"obstacle\" mass=\"10.0\" name=\"static.prop.box\"/>\n";
    match cap {
        Cap::Vehicle => VEHICLE.to_string(),
        Cap::Pedestrian => PEDESTRIAN.to_string(),
        Cap::Misc => MISC.to_string(),
        Cap::VehicleAndPedestrian => format!("{VEHICLE}{PEDESTRIAN}"),
        Cap::None => {
            "      <CatalogReference catalogName=\"VehicleCatalog\" entryName=\"car\"/>\n".to_string()
        }
    }
}

fn story_xml(story: &StorySpec) -> String {
    let mut out = format!(
        "    <Story name=\"{0}\">\n      <Act name=\"{0}_act\">\n",
        story.name
    );
    for group in &story.groups {
        let _ = writeln!(
            out,
            "        <ManeuverGroup maximumExecutionCount=\"1\" name=\"{}\">",
            group.name
        );
        out.push_str("          <Actors selectTriggeringEntities=\"false\">\n");
        for actor in &group.actors {
            let _ = writeln!(out, "            <EntityRef entityRef=\"{actor}\"/>");
        }
        out.push_str("          </Actors>\n");
        let _ = writeln!(
            out,
            "          <Maneuver name=\"{0}_maneuver\">\n            <Event name=\"{0}_event\" priority=\"overwrite\">\n              <Action name=\"{0}_action\">\n                <PrivateAction>\n                  <LongitudinalAction>\n                    <SpeedAction>\n                      <SpeedActionDynamics dynamicsShape=\"step\" value=\"0\" dynamicsDimension=\"time\"/>\n                      <SpeedActionTarget>\n                        <AbsoluteTargetSpeed value=\"10\"/>\n                      </SpeedActionTarget>\n                    </SpeedAction>\n                  </LongitudinalAction>\n                </PrivateAction>\n              </Action>\n              <StartTrigger>\n                <ConditionGroup>\n                  <Condition name=\"{0}_start\" delay=\"0\" conditionEdge=\"rising\">\n                    <ByValueCondition>\n                      <SimulationTimeCondition value=\"2\" rule=\"greaterThan\"/>\n                    </ByValueCondition>\n                  </Condition>\n                </ConditionGroup>\n              </StartTrigger>\n            </Event>\n          </Maneuver>",
            group.name
        );
        out.push_str("        </ManeuverGroup>\n");
    }
    out.push_str("      </Act>\n    </Story>\n");
    out
}

/// The reduction example: ego, vehicles `v1` and `v2`, pedestrian `p1`, two
/// stories with groups for both vehicles
#[must_use]
pub fn two_vehicle_scenario() -> ScenarioBuilder {
    ScenarioBuilder::new()
        .map("Town04")
        .ego()
        .entity("v1", Cap::Vehicle)
        .entity("v2", Cap::Vehicle)
        .entity("p1", Cap::Pedestrian)
        .environment("2020-06-01T12:00:00")
        .private(EGO_NAME, 10.0, 20.0)
        .private("v1", 30.0, 20.0)
        .private("v2", 50.0, 20.0)
        .story("first", &[("mg_v1", &["v1"]), ("mg_v2", &["v2"])])
        .story("second", &[("mg_v1_late", &["v1"])])
}

/// Every element the fixtures and the pedestrian template use
pub const FIXTURE_ELEMENTS: &[&str] = &[
    "OpenSCENARIO", "FileHeader", "ParameterDeclarations", "CatalogLocations", "RoadNetwork",
    "LogicFile", "SceneGraphFile", "Entities", "ScenarioObject", "Vehicle", "Pedestrian",
    "MiscObject", "CatalogReference", "Storyboard", "Init", "Actions", "GlobalAction",
    "EnvironmentAction", "Environment", "TimeOfDay", "Weather", "Sun", "Fog", "Precipitation",
    "Wind", "RoadCondition", "Private", "PrivateAction", "TeleportAction", "Position",
    "WorldPosition", "Story", "Act", "ManeuverGroup", "Actors", "EntityRef", "Maneuver", "Event",
    "Action", "LongitudinalAction", "SpeedAction", "SpeedActionDynamics", "SpeedActionTarget",
    "AbsoluteTargetSpeed", "StartTrigger", "ConditionGroup", "Condition", "ByValueCondition",
    "SimulationTimeCondition", "StopTrigger", "BoundingBox", "Center", "Dimensions", "Properties",
    "Property",
];

/// Minimal XSD declaring [`FIXTURE_ELEMENTS`] minus `excluding`
#[must_use]
pub fn fixture_schema(excluding: &[&str]) -> String {
    let mut out =
        String::from("<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">\n");
    for name in FIXTURE_ELEMENTS.iter().filter(|n| !excluding.contains(n)) {
        let _ = writeln!(out, "  <xs:element name=\"{name}\"/>");
    }
    out.push_str("</xs:schema>\n");
    out
}

fn arb_cap() -> impl Strategy<Value = Cap> {
    prop_oneof![
        4 => Just(Cap::Vehicle),
        2 => Just(Cap::Pedestrian),
        1 => Just(Cap::Misc),
        1 => Just(Cap::VehicleAndPedestrian),
        1 => Just(Cap::None),
    ]
}

/// Random scenario with unique entity names, bindings and groups that
/// reference existing entities, and one to three stories
pub fn arb_scenario() -> impl Strategy<Value = ScenarioBuilder> {
    (
        any::<bool>(),
        prop::collection::vec(arb_cap(), 0..6),
        prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 1..3), 1..4),
        1usize..4,
        any::<bool>(),
    )
        .prop_map(|(with_ego, caps, groups, story_count, with_env)| {
            let mut builder = ScenarioBuilder::new().map("Town01");
            let mut names = Vec::new();
            if with_ego {
                builder = builder.ego();
                names.push(EGO_NAME.to_string());
            }
            for (i, cap) in caps.into_iter().enumerate() {
                let name = format!("obj{i}");
                builder = builder.entity(&name, cap);
                names.push(name);
            }
            if with_env {
                builder = builder.environment("2021-01-01T08:00:00");
            }
            for (i, name) in names.iter().enumerate() {
                builder = builder.private(name, i as f64 * 5.0, 0.0);
            }
            for story in 0..story_count {
                let mut specs = Vec::new();
                if !names.is_empty() {
                    for (g, picks) in groups.iter().enumerate() {
                        let actors: Vec<String> =
                            picks.iter().map(|p| p.get(&names).clone()).collect();
                        specs.push(GroupSpec {
                            name: format!("s{story}_g{g}"),
                            actors,
                        });
                    }
                }
                builder.stories.push(StorySpec {
                    name: format!("story{story}"),
                    groups: specs,
                });
            }
            builder
        })
}
