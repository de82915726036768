//! Scenario objects and their categories

use crate::tree::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved name of the primary controlled vehicle
pub const EGO_NAME: &str = "ego_vehicle";

/// Capability tags an object declares as direct children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub vehicle: bool,
    pub pedestrian: bool,
    pub misc: bool,
}

impl Capabilities {
    /// Carries a vehicle and no pedestrian
    #[inline]
    #[must_use]
    pub fn is_vehicle_bearing(&self) -> bool {
        self.vehicle && !self.pedestrian
    }

    /// Carries a pedestrian (regardless of other tags)
    #[inline]
    #[must_use]
    pub fn is_pedestrian_bearing(&self) -> bool {
        self.pedestrian
    }

    /// Number of capability tags present
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.vehicle) + usize::from(self.pedestrian) + usize::from(self.misc)
    }
}

/// Semantic category of a scenario object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ego,
    Vehicle,
    Pedestrian,
    Misc,
}

impl EntityKind {
    /// Categorize an object.
    ///
    /// The ego name always wins. Otherwise pedestrian > misc > vehicle; an
    /// object with no capability tag (e.g. a catalog reference) is a vehicle.
    #[must_use]
    pub fn classify(name: &str, capabilities: Capabilities) -> Self {
        if name == EGO_NAME {
            Self::Ego
        } else if capabilities.pedestrian {
            Self::Pedestrian
        } else if capabilities.misc {
            Self::Misc
        } else {
            Self::Vehicle
        }
    }

    /// Lowercase label used in digests
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ego => "ego",
            Self::Vehicle => "vehicle",
            Self::Pedestrian => "pedestrian",
            Self::Misc => "misc",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named entity of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioObject {
    pub node: NodeId,
    pub name: String,
    pub capabilities: Capabilities,
    pub kind: EntityKind,
}

impl ScenarioObject {
    /// Whether this is the reserved ego entity
    #[inline]
    #[must_use]
    pub fn is_ego(&self) -> bool {
        self.kind == EntityKind::Ego
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VEHICLE: Capabilities = Capabilities {
        vehicle: true,
        pedestrian: false,
        misc: false,
    };

    #[test]
    fn ego_name_wins_over_capability() {
        let ped = Capabilities {
            pedestrian: true,
            ..Capabilities::default()
        };
        assert_eq!(EntityKind::classify(EGO_NAME, ped), EntityKind::Ego);
    }

    #[test]
    fn ambiguous_objects_follow_precedence() {
        let all = Capabilities {
            vehicle: true,
            pedestrian: true,
            misc: true,
        };
        assert_eq!(EntityKind::classify("x", all), EntityKind::Pedestrian);
        let misc_vehicle = Capabilities {
            misc: true,
            ..VEHICLE
        };
        assert_eq!(EntityKind::classify("x", misc_vehicle), EntityKind::Misc);
        assert_eq!(EntityKind::classify("x", VEHICLE), EntityKind::Vehicle);
        assert_eq!(
            EntityKind::classify("x", Capabilities::default()),
            EntityKind::Vehicle
        );
    }

    #[test]
    fn vehicle_bearing_excludes_pedestrians() {
        assert!(VEHICLE.is_vehicle_bearing());
        let both = Capabilities {
            pedestrian: true,
            ..VEHICLE
        };
        assert!(!both.is_vehicle_bearing());
        assert_eq!(both.count(), 2);
    }
}
