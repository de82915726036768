//! Corpus statistics and schema tag usage

use crate::corpus::{file_name, list_documents};
use crate::error::BatchError;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::path::Path;
use xosc_model::{parse_tree, NodeId, XmlTree};

/// Weather attributes counted per property, with their report labels
pub const WEATHER_PROPERTIES: [(&str, &str); 6] = [
    ("cloud_state", "Cloud state"),
    ("precip_type", "Precipitation type"),
    ("precip_intensity", "Precipitation intensity"),
    ("fog_visual_range", "Fog visual range"),
    ("wind_direction", "Wind direction"),
    ("wind_speed", "Wind speed"),
];

const MISSING: &str = "null";
const TOP_COMBOS: usize = 10;

/// Occurrence counts in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter<K: Hash + Eq> {
    counts: IndexMap<K, usize>,
}

impl<K: Hash + Eq> Default for Counter<K> {
    fn default() -> Self {
        Self {
            counts: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq> Counter<K> {
    pub fn add(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries by descending count; ties keep first-seen order
    #[must_use]
    pub fn most_common(&self) -> Vec<(&K, usize)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(k, &n)| (k, n)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

/// One full weather configuration, in [`WEATHER_PROPERTIES`] order
pub type WeatherCombo = [String; 6];

/// Aggregate counts over a corpus
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    pub files: usize,
    /// Files that could not be parsed
    pub unreadable: usize,
    pub entity_kinds: Counter<String>,
    pub time_of_day: Counter<String>,
    pub weather: IndexMap<&'static str, Counter<String>>,
    pub weather_combos: Counter<WeatherCombo>,
}

impl CorpusStats {
    fn record(&mut self, tree: &XmlTree) {
        let root = tree.root();
        for entities in tree.descendants_named(root, "Entities") {
            for object in tree.children_named(entities, "ScenarioObject") {
                self.entity_kinds.add(object_kind(tree, object).to_string());
            }
        }

        for action in tree.descendants_named(root, "EnvironmentAction") {
            for env in tree.descendants_named(action, "Environment") {
                if let Some(tod) = tree.first_child_named(env, "TimeOfDay") {
                    let value = tree.element(tod).and_then(|el| {
                        el.attr_non_empty("dateTime")
                            .or_else(|| el.attr_non_empty("animation"))
                    });
                    self.time_of_day.add(norm(value));
                }

                let Some(weather) = tree.first_child_named(env, "Weather") else {
                    continue;
                };
                let combo = weather_values(tree, weather);
                for ((key, _), value) in WEATHER_PROPERTIES.iter().zip(&combo) {
                    self.weather.entry(*key).or_default().add(value.clone());
                }
                self.weather_combos.add(combo);
            }
        }
    }
}

fn norm(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(MISSING)
        .to_string()
}

fn object_kind(tree: &XmlTree, object: NodeId) -> &'static str {
    ["Vehicle", "Pedestrian", "MiscObject"]
        .into_iter()
        .find(|kind| tree.has_child_named(object, kind))
        .unwrap_or("Unknown")
}

fn weather_values(tree: &XmlTree, weather: NodeId) -> WeatherCombo {
    let attr = |node: Option<NodeId>, name: &str| {
        norm(node.and_then(|n| tree.element(n)?.attr(name)))
    };
    let precipitation = tree.first_child_named(weather, "Precipitation");
    let fog = tree.first_child_named(weather, "Fog");
    let wind = tree.first_child_named(weather, "Wind");
    [
        attr(Some(weather), "cloudState"),
        attr(precipitation, "precipitationType"),
        attr(precipitation, "intensity"),
        attr(fog, "visualRange"),
        attr(wind, "direction"),
        attr(wind, "speed"),
    ]
}

fn read_tree(path: &Path) -> Option<XmlTree> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(file = %file_name(path), error = %e, "unreadable, skipping");
            return None;
        }
    };
    match parse_tree(&text) {
        Ok(tree) => Some(tree),
        Err(e) => {
            tracing::warn!(file = %file_name(path), error = %e, "unparseable, skipping");
            None
        }
    }
}

/// Count entities, times of day and weather over every document in `dir`.
///
/// # Errors
/// Returns [`BatchError::Input`] if the directory cannot be read.
pub fn collect_stats(dir: &Path) -> Result<CorpusStats, BatchError> {
    let files = list_documents(dir)?;
    let mut stats = CorpusStats {
        files: files.len(),
        weather: WEATHER_PROPERTIES
            .iter()
            .map(|(key, _)| (*key, Counter::default()))
            .collect(),
        ..CorpusStats::default()
    };
    for path in &files {
        match read_tree(path) {
            Some(tree) => stats.record(&tree),
            None => stats.unreadable += 1,
        }
    }
    tracing::info!(files = stats.files, unreadable = stats.unreadable, "statistics collected");
    Ok(stats)
}

impl fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files: {} ({} unreadable)", self.files, self.unreadable)?;

        writeln!(f, "\nEntity types:")?;
        for (kind, n) in self.entity_kinds.most_common() {
            writeln!(f, "  {kind}: {n}")?;
        }

        writeln!(f, "\nTime of day:")?;
        for (value, n) in self.time_of_day.most_common() {
            writeln!(f, "  {value}: {n}")?;
        }

        for (key, label) in WEATHER_PROPERTIES {
            writeln!(f, "\n{label}:")?;
            if let Some(counter) = self.weather.get(key) {
                for (value, n) in counter.most_common() {
                    writeln!(f, "  {value}: {n}")?;
                }
            }
        }

        write!(f, "\nWeather combinations (top {TOP_COMBOS}):")?;
        for (combo, n) in self.weather_combos.most_common().into_iter().take(TOP_COMBOS) {
            write!(f, "\n  ({}): {n}", combo.join(", "))?;
        }
        Ok(())
    }
}

/// Schema vocabulary against corpus usage
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagReport {
    pub declared: usize,
    pub used: usize,
    /// Declared but never used, sorted
    pub unused: Vec<String>,
    /// Usage per tag, descending count then name
    pub frequency: Vec<(String, usize)>,
}

/// Compare the element names `declared` by a schema with those used in `dir`.
///
/// # Errors
/// Returns [`BatchError::Input`] if the directory cannot be read.
pub fn tag_usage(dir: &Path, declared: &HashSet<String>) -> Result<TagReport, BatchError> {
    let mut usage: Counter<String> = Counter::default();
    for path in list_documents(dir)? {
        let Some(tree) = read_tree(&path) else {
            continue;
        };
        let root = tree.root();
        for node in std::iter::once(root).chain(tree.descendant_elements(root)) {
            if let Some(name) = tree.local_name(node) {
                usage.add(name.to_string());
            }
        }
    }

    let unused: BTreeSet<&String> = declared
        .iter()
        .filter(|tag| usage.get(tag) == 0)
        .collect();
    let mut frequency: Vec<(String, usize)> = usage
        .most_common()
        .into_iter()
        .map(|(tag, n)| (tag.clone(), n))
        .collect();
    frequency.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(TagReport {
        declared: declared.len(),
        used: frequency.len(),
        unused: unused.into_iter().cloned().collect(),
        frequency,
    })
}

impl fmt::Display for TagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Declared tags: {}", self.declared)?;
        writeln!(f, "Used tags: {}", self.used)?;
        writeln!(f, "\nUnused tags ({}):", self.unused.len())?;
        for tag in &self.unused {
            writeln!(f, "  {tag}")?;
        }
        write!(f, "\nTag frequency:")?;
        for (tag, n) in &self.frequency {
            write!(f, "\n  {tag}: {n}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xosc_test_utils::{two_vehicle_scenario, Cap, ScenarioBuilder, WeatherSpec};

    fn corpus(files: &[(&str, String)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            fs::write(dir.path().join(name), text).unwrap();
        }
        dir
    }

    #[test]
    fn most_common_is_stable_for_ties() {
        let mut counter = Counter::default();
        for key in ["b", "a", "c", "a", "b"] {
            counter.add(key);
        }
        assert_eq!(counter.most_common(), vec![(&"b", 2), (&"a", 2), (&"c", 1)]);
        assert_eq!(counter.get(&"z"), 0);
    }

    #[test]
    fn counts_entities_and_environment() {
        let rainy = ScenarioBuilder::new()
            .ego()
            .entity("walker", Cap::Pedestrian)
            .entity("cat", Cap::None)
            .environment("2021-03-01T20:00:00")
            .weather(WeatherSpec {
                cloud_state: "rainy".into(),
                precipitation: Some((Some("rain".into()), Some("0.8".into()))),
                wind: Some(("0.5".into(), "3.0".into())),
                ..WeatherSpec::default()
            })
            .build();
        let dir = corpus(&[
            ("a.xosc", two_vehicle_scenario().build()),
            ("b.xosc", rainy),
            ("c.xosc", "<broken".to_string()),
        ]);

        let stats = collect_stats(dir.path()).unwrap();
        assert_eq!((stats.files, stats.unreadable), (3, 1));
        assert_eq!(stats.entity_kinds.get(&"Vehicle".to_string()), 4);
        assert_eq!(stats.entity_kinds.get(&"Pedestrian".to_string()), 2);
        assert_eq!(stats.entity_kinds.get(&"Unknown".to_string()), 1);
        assert_eq!(stats.time_of_day.get(&"2021-03-01T20:00:00".to_string()), 1);

        let cloud = &stats.weather["cloud_state"];
        assert_eq!(cloud.get(&"free".to_string()), 1);
        assert_eq!(cloud.get(&"rainy".to_string()), 1);
        assert_eq!(stats.weather["wind_speed"].get(&"null".to_string()), 1);

        let combo: WeatherCombo = [
            "rainy", "rain", "0.8", "100000.0", "0.5", "3.0",
        ]
        .map(String::from);
        assert_eq!(stats.weather_combos.get(&combo), 1);

        let text = stats.to_string();
        assert!(text.contains("Cloud state:\n  free: 1\n  rainy: 1"));
        assert!(text.contains("(rainy, rain, 0.8, 100000.0, 0.5, 3.0): 1"));
    }

    #[test]
    fn time_of_day_falls_back_to_animation_and_skips_absent() {
        let dir = corpus(&[
            (
                "weather_only.xosc",
                r#"<OpenSCENARIO><GlobalAction><EnvironmentAction><Environment>
                    <Weather cloudState="free"/>
                </Environment></EnvironmentAction></GlobalAction></OpenSCENARIO>"#
                    .to_string(),
            ),
            (
                "animated.xosc",
                r#"<OpenSCENARIO><GlobalAction><EnvironmentAction><Environment>
                    <TimeOfDay animation="false"/>
                </Environment></EnvironmentAction></GlobalAction></OpenSCENARIO>"#
                    .to_string(),
            ),
        ]);
        let stats = collect_stats(dir.path()).unwrap();
        assert_eq!(
            stats.time_of_day.most_common(),
            vec![(&"false".to_string(), 1)]
        );
    }

    #[test]
    fn unused_tags_are_declared_minus_used() {
        let dir = corpus(&[(
            "a.xosc",
            "<OpenSCENARIO><Entities><ScenarioObject/><ScenarioObject/></Entities></OpenSCENARIO>"
                .to_string(),
        )]);
        let declared: HashSet<String> = ["OpenSCENARIO", "Entities", "Weather", "Fog"]
            .map(String::from)
            .into();

        let report = tag_usage(dir.path(), &declared).unwrap();
        assert_eq!(report.unused, vec!["Fog".to_string(), "Weather".to_string()]);
        assert_eq!(
            report.frequency,
            vec![
                ("ScenarioObject".to_string(), 2),
                ("Entities".to_string(), 1),
                ("OpenSCENARIO".to_string(), 1),
            ]
        );
        assert!(report.to_string().contains("Unused tags (2):\n  Fog\n  Weather"));
    }
}
