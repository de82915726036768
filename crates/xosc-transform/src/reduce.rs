//! Structural reduction
//!
//! Prunes a document to ego, at most one secondary vehicle, every
//! pedestrian-bearing object and a single story. Rules run in order over the
//! typed index and only mark nodes; the tree is filtered once at the end.
//!
//! 1. Keep ego and pedestrian-bearing objects. The first vehicle-bearing
//!    non-ego object is the kept secondary vehicle; every other
//!    vehicle-bearing object is removed.
//! 2. Recompute the live entity names.
//! 3. Keep only bindings to ego or the secondary vehicle that are still live.
//! 4. Keep only maneuver groups with an actor reference to the secondary
//!    vehicle, dropping actor references in them that name removed entities.
//!    Condition references (`TriggeringEntities`) are left alone.
//! 5. Keep only the first story.

use crate::error::ReductionError;
use std::collections::HashSet;
use std::fmt;
use xosc_model::{NodeId, ScenarioDocument, EGO_NAME};

/// What a reduction removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReductionReport {
    /// Name of the kept secondary vehicle
    pub secondary: Option<String>,
    pub removed_entities: Vec<String>,
    pub removed_privates: usize,
    pub removed_maneuver_groups: usize,
    pub removed_stories: usize,
    /// Actor references dropped from kept groups
    pub pruned_actor_refs: usize,
}

impl ReductionReport {
    /// Nothing was removed
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed_entities.is_empty()
            && self.removed_privates == 0
            && self.removed_maneuver_groups == 0
            && self.removed_stories == 0
            && self.pruned_actor_refs == 0
    }
}

impl fmt::Display for ReductionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[secondary:{}, entities:-{}, privates:-{}, groups:-{}, stories:-{}, refs:-{}]",
            self.secondary.as_deref().unwrap_or("-"),
            self.removed_entities.len(),
            self.removed_privates,
            self.removed_maneuver_groups,
            self.removed_stories,
            self.pruned_actor_refs
        )
    }
}

/// Reduced document plus its report
#[derive(Debug, Clone)]
pub struct Reduction {
    pub document: ScenarioDocument,
    pub report: ReductionReport,
}

/// Applies the reduction rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Reducer;

impl Reducer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reduce a document.
    ///
    /// # Errors
    /// Returns [`ReductionError`] if the pruned tree cannot be re-indexed.
    pub fn reduce(&self, doc: ScenarioDocument) -> Result<Reduction, ReductionError> {
        let mut report = ReductionReport::default();
        let mut marked: HashSet<NodeId> = HashSet::new();

        // 1. classify
        let kept_vehicle = doc
            .entities()
            .iter()
            .find(|e| !e.is_ego() && e.capabilities.is_vehicle_bearing());
        // a nameless secondary stays but nothing can bind to it
        let secondary = kept_vehicle
            .map(|e| e.name.clone())
            .filter(|name| !name.is_empty());
        for entity in doc.entities() {
            let removable = !entity.is_ego()
                && entity.capabilities.is_vehicle_bearing()
                && kept_vehicle.map(|e| e.node) != Some(entity.node);
            if removable {
                marked.insert(entity.node);
                report.removed_entities.push(entity.name.clone());
            }
        }

        // 2. live names
        let live: HashSet<&str> = doc
            .entities()
            .iter()
            .filter(|e| !marked.contains(&e.node))
            .map(|e| e.name.as_str())
            .collect();

        // 3. bindings
        let allowed: HashSet<&str> = std::iter::once(EGO_NAME)
            .chain(secondary.as_deref())
            .filter(|name| live.contains(name))
            .collect();
        for binding in doc.privates() {
            let keep = binding
                .entity_ref
                .as_deref()
                .is_some_and(|r| allowed.contains(r));
            if !keep {
                marked.insert(binding.node);
                report.removed_privates += 1;
            }
        }

        // 4. maneuver groups
        let tree = doc.tree();
        for group in doc.maneuver_groups() {
            let keep = secondary.as_deref().is_some_and(|s| group.references(s));
            if !keep {
                marked.insert(group.node);
                report.removed_maneuver_groups += 1;
                continue;
            }
            for actor in tree.child_path(group.node, &["Actors", "EntityRef"]) {
                let dangling = tree
                    .attr(actor, "entityRef")
                    .is_some_and(|r| !live.contains(r));
                if dangling {
                    marked.insert(actor);
                    report.pruned_actor_refs += 1;
                }
            }
        }

        // 5. stories
        for story in doc.stories().iter().skip(1) {
            marked.insert(story.node);
            report.removed_stories += 1;
        }

        report.secondary = secondary;
        tracing::debug!(%report, "reduction rules applied");

        let mut tree = doc.into_tree();
        tree.detach_all(&marked);
        let document = ScenarioDocument::from_tree(tree)?;
        Ok(Reduction { document, report })
    }
}
