//! Typed scenario document
//!
//! [`ScenarioDocument`] owns the [`XmlTree`] and a typed index built once per
//! structural state. Every rule that needs entities, bindings, groups or
//! stories reads the index instead of re-inspecting tag names.
//!
//! Structural edits go through [`ScenarioDocument::into_tree`] and
//! [`ScenarioDocument::from_tree`], so the index can never go stale.

use crate::entity::{Capabilities, EntityKind, ScenarioObject, EGO_NAME};
use crate::error::{ParseError, SerializeError};
use crate::reader::parse_tree;
use crate::tree::{NodeId, XmlTree};
use crate::writer::write_tree;
use std::collections::HashSet;

/// Entity-to-action binding (`Private entityRef="..."`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateBinding {
    pub node: NodeId,
    pub entity_ref: Option<String>,
    /// Declared under `Init/Actions`
    pub in_init: bool,
}

/// Actor set plus maneuvers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManeuverGroup {
    pub node: NodeId,
    pub name: Option<String>,
    /// `Actors/EntityRef/@entityRef` values, in document order
    pub actor_refs: Vec<String>,
}

impl ManeuverGroup {
    /// Whether any actor reference names this entity
    #[inline]
    #[must_use]
    pub fn references(&self, entity: &str) -> bool {
        self.actor_refs.iter().any(|r| r == entity)
    }
}

/// Top-level narrative container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub node: NodeId,
    pub name: Option<String>,
}

/// Environment scope with its singleton children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentRef {
    pub node: NodeId,
    pub time_of_day: Option<NodeId>,
    pub weather: Option<NodeId>,
}

/// Map reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadNetworkRef {
    pub node: NodeId,
    /// `LogicFile/@filepath`, falling back to `@file`
    pub logic_file: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct DocumentIndex {
    entities_container: Option<NodeId>,
    entities: Vec<ScenarioObject>,
    privates: Vec<PrivateBinding>,
    maneuver_groups: Vec<ManeuverGroup>,
    stories: Vec<Story>,
    environments: Vec<EnvironmentRef>,
    road_network: Option<RoadNetworkRef>,
    storyboard: Option<NodeId>,
}

/// Parsed scene-description document
#[derive(Debug, Clone)]
pub struct ScenarioDocument {
    tree: XmlTree,
    index: DocumentIndex,
}

impl ScenarioDocument {
    /// Parse document text.
    ///
    /// # Errors
    /// Returns [`ParseError`] for malformed markup or a violated model
    /// invariant (duplicate entity names, repeated environment children).
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::from_tree(parse_tree(text)?)
    }

    /// Index an existing tree.
    ///
    /// # Errors
    /// Same invariant checks as [`ScenarioDocument::parse`].
    pub fn from_tree(tree: XmlTree) -> Result<Self, ParseError> {
        let index = DocumentIndex::build(&tree)?;
        Ok(Self { tree, index })
    }

    /// Underlying tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    /// Give up the index to edit the tree
    #[inline]
    #[must_use]
    pub fn into_tree(self) -> XmlTree {
        self.tree
    }

    /// Scenario objects in document order
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[ScenarioObject] {
        &self.index.entities
    }

    /// Scenario object by exact name
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&ScenarioObject> {
        self.index.entities.iter().find(|e| e.name == name)
    }

    /// The ego entity, if declared
    #[inline]
    #[must_use]
    pub fn ego(&self) -> Option<&ScenarioObject> {
        self.entity(EGO_NAME)
    }

    /// Names of all scenario objects
    #[must_use]
    pub fn entity_names(&self) -> HashSet<&str> {
        self.index.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// First `Entities` container
    #[inline]
    #[must_use]
    pub fn entities_container(&self) -> Option<NodeId> {
        self.index.entities_container
    }

    /// Entity-to-action bindings in document order
    #[inline]
    #[must_use]
    pub fn privates(&self) -> &[PrivateBinding] {
        &self.index.privates
    }

    /// Maneuver groups in document order
    #[inline]
    #[must_use]
    pub fn maneuver_groups(&self) -> &[ManeuverGroup] {
        &self.index.maneuver_groups
    }

    /// Stories in document order
    #[inline]
    #[must_use]
    pub fn stories(&self) -> &[Story] {
        &self.index.stories
    }

    /// Environment scopes in document order
    #[inline]
    #[must_use]
    pub fn environments(&self) -> &[EnvironmentRef] {
        &self.index.environments
    }

    /// First road network reference
    #[inline]
    #[must_use]
    pub fn road_network(&self) -> Option<&RoadNetworkRef> {
        self.index.road_network.as_ref()
    }

    /// First `Storyboard` element
    #[inline]
    #[must_use]
    pub fn storyboard(&self) -> Option<NodeId> {
        self.index.storyboard
    }

    /// Serialize with an XML declaration.
    ///
    /// # Errors
    /// Returns [`SerializeError`] if the writer fails.
    pub fn to_xml(&self) -> Result<String, SerializeError> {
        write_tree(&self.tree, true)
    }
}

impl PartialEq for ScenarioDocument {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl Eq for ScenarioDocument {}

impl DocumentIndex {
    fn build(tree: &XmlTree) -> Result<Self, ParseError> {
        let mut index = Self::default();
        let mut seen_names: HashSet<String> = HashSet::new();

        let root = tree.root();
        for id in std::iter::once(root).chain(tree.descendant_elements(root)) {
            let Some(local) = tree.local_name(id) else {
                continue;
            };
            match local {
                "Entities" => {
                    index.entities_container.get_or_insert(id);
                }
                "ScenarioObject" => {
                    if let Some(object) = scenario_object(tree, id) {
                        if !object.name.is_empty() && !seen_names.insert(object.name.clone()) {
                            return Err(ParseError::DuplicateEntity { name: object.name });
                        }
                        index.entities.push(object);
                    }
                }
                "Private" => index.privates.push(PrivateBinding {
                    node: id,
                    entity_ref: tree.attr(id, "entityRef").map(str::to_owned),
                    in_init: is_under_init_actions(tree, id),
                }),
                "ManeuverGroup" => index.maneuver_groups.push(ManeuverGroup {
                    node: id,
                    name: tree.attr(id, "name").map(str::to_owned),
                    actor_refs: tree
                        .child_path(id, &["Actors", "EntityRef"])
                        .into_iter()
                        .filter_map(|r| tree.attr(r, "entityRef").map(str::to_owned))
                        .collect(),
                }),
                "Story" => index.stories.push(Story {
                    node: id,
                    name: tree.attr(id, "name").map(str::to_owned),
                }),
                "Storyboard" => {
                    index.storyboard.get_or_insert(id);
                }
                "Environment" => index.environments.push(environment(tree, id)?),
                "RoadNetwork" if index.road_network.is_none() => {
                    let logic_file = tree.first_child_named(id, "LogicFile").and_then(|lf| {
                        let el = tree.element(lf)?;
                        el.attr_non_empty("filepath")
                            .or_else(|| el.attr_non_empty("file"))
                            .map(str::to_owned)
                    });
                    index.road_network = Some(RoadNetworkRef {
                        node: id,
                        logic_file,
                    });
                }
                _ => {}
            }
        }
        Ok(index)
    }
}

fn scenario_object(tree: &XmlTree, id: NodeId) -> Option<ScenarioObject> {
    let element = tree.element(id)?;
    let name = element
        .attr_non_empty("name")
        .or_else(|| element.attr_non_empty("nameRef"))
        .unwrap_or_default()
        .to_owned();
    let capabilities = Capabilities {
        vehicle: tree.has_child_named(id, "Vehicle"),
        pedestrian: tree.has_child_named(id, "Pedestrian"),
        misc: tree.has_child_named(id, "MiscObject"),
    };
    let kind = EntityKind::classify(&name, capabilities);
    Some(ScenarioObject {
        node: id,
        name,
        capabilities,
        kind,
    })
}

fn environment(tree: &XmlTree, id: NodeId) -> Result<EnvironmentRef, ParseError> {
    let single = |local: &'static str| -> Result<Option<NodeId>, ParseError> {
        let mut matches = tree.children_named(id, local);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(ParseError::DuplicateEnvironmentChild { child: local });
        }
        Ok(first)
    };
    Ok(EnvironmentRef {
        node: id,
        time_of_day: single("TimeOfDay")?,
        weather: single("Weather")?,
    })
}

fn is_under_init_actions(tree: &XmlTree, id: NodeId) -> bool {
    let Some(actions) = tree.parent(id) else {
        return false;
    };
    tree.is_named(actions, "Actions")
        && tree
            .parent(actions)
            .is_some_and(|init| tree.is_named(init, "Init"))
}
