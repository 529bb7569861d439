//! Class vocabulary reconciliation.
//!
//! Both resolvers are pure: they take two vocabularies and return a map.
//! Filling gaps interactively is the caller's business.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::class_map::ClassMap;

/// Keyword accepted wherever a project class name is expected.
pub const IGNORE: &str = "ignore";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationTarget {
    Class(u32),
    Ignore,
}

impl TranslationTarget {
    /// Parses a user answer: a project class name or `ignore`.
    pub fn parse(answer: &str, project: &ClassMap) -> Option<Self> {
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case(IGNORE) {
            return Some(Self::Ignore);
        }
        project
            .id_of(answer)
            .or_else(|| project.id_of(&answer.to_lowercase()))
            .map(Self::Class)
    }
}

impl fmt::Display for TranslationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(id) => write!(f, "{id}"),
            Self::Ignore => f.write_str(IGNORE),
        }
    }
}

/// Foreign class id to project class id (or ignore).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    entries: BTreeMap<u32, TranslationTarget>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, foreign_id: u32, target: TranslationTarget) {
        self.entries.insert(foreign_id, target);
    }

    pub fn get(&self, foreign_id: u32) -> Option<TranslationTarget> {
        self.entries.get(&foreign_id).copied()
    }

    /// `None` for ignored and unmapped ids alike.
    pub fn translate(&self, foreign_id: u32) -> Option<u32> {
        match self.get(foreign_id) {
            Some(TranslationTarget::Class(id)) => Some(id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, TranslationTarget)> + '_ {
        self.entries.iter().map(|(id, target)| (*id, *target))
    }
}

/// Outcome of resolving a foreign vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub table: TranslationTable,
    /// Foreign classes nobody decided on yet, as `(id, name)`.
    pub unresolved: Vec<(u32, String)>,
}

/// Resolves each foreign class by exact name equality, then through
/// `explicit` (foreign name to project name or `ignore`).
pub fn resolve_translation(
    foreign: &ClassMap,
    project: &ClassMap,
    explicit: &BTreeMap<String, String>,
) -> Resolution {
    let mut resolution = Resolution::default();
    for (foreign_id, name) in foreign.iter() {
        let target = explicit
            .get(name)
            .and_then(|answer| {
                let parsed = TranslationTarget::parse(answer, project);
                if parsed.is_none() {
                    log::warn!("Mapping '{name}' -> '{answer}' names no project class");
                }
                parsed
            })
            .or_else(|| project.id_of(name).map(TranslationTarget::Class));
        match target {
            Some(target) => resolution.table.insert(foreign_id, target),
            None => resolution.unresolved.push((foreign_id, name.to_string())),
        }
    }
    resolution
}

/// Common detector labels and the project class names they stand for.
pub const DETECTOR_SYNONYMS: &[(&str, &str)] = &[
    ("person", "persona"),
    ("laptop", "computadora"),
    ("keyboard", "teclado"),
    ("mouse", "mouse"),
    ("cell phone", "telefono"),
    ("book", "libro_documento"),
    ("cup", "taza_cafe"),
    ("tv", "monitor"),
    ("monitor", "monitor"),
    ("hand", "mano"),
    ("screen", "pantalla"),
];

/// Maps detector class ids onto project class ids. A detector class maps
/// when its synonym (or, failing that, its own name) is a project class
/// that is also one of the active work activities. Unmapped detector
/// classes are absent from the result.
pub fn resolve_detector_mapping(
    detector_names: &ClassMap,
    project: &ClassMap,
    activities: &ClassMap,
) -> BTreeMap<u32, u32> {
    let mut mapping = BTreeMap::new();
    for (detector_id, detector_name) in detector_names.iter() {
        let synonym = DETECTOR_SYNONYMS
            .iter()
            .find(|(from, _)| *from == detector_name)
            .map(|(_, to)| *to);
        let candidates = synonym.into_iter().chain(std::iter::once(detector_name));
        for candidate in candidates {
            if activities.id_of(candidate).is_none() {
                continue;
            }
            if let Some(project_id) = project.id_of(candidate) {
                log::debug!("Detector class '{detector_name}' -> '{candidate}' ({project_id})");
                mapping.insert(detector_id, project_id);
                break;
            }
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ClassMap {
        ClassMap::from_names(["persona", "teclado", "mouse", "monitor"])
    }

    #[test]
    fn test_exact_names_resolve() {
        let foreign = ClassMap::from_names(["mouse", "keyboard", "teclado"]);
        let resolution = resolve_translation(&foreign, &project(), &BTreeMap::new());
        assert_eq!(resolution.table.get(0), Some(TranslationTarget::Class(2)));
        assert_eq!(resolution.table.get(2), Some(TranslationTarget::Class(1)));
        assert_eq!(resolution.unresolved, vec![(1, "keyboard".to_string())]);
    }

    #[test]
    fn test_explicit_mapping_overrides_and_ignores() {
        let foreign = ClassMap::from_names(["keyboard", "cat", "mouse"]);
        let explicit = BTreeMap::from([
            ("keyboard".to_string(), "teclado".to_string()),
            ("cat".to_string(), "IGNORE".to_string()),
        ]);
        let resolution = resolve_translation(&foreign, &project(), &explicit);
        assert!(resolution.unresolved.is_empty());
        assert_eq!(resolution.table.translate(0), Some(1));
        assert_eq!(resolution.table.get(1), Some(TranslationTarget::Ignore));
        assert_eq!(resolution.table.translate(1), None);
        assert_eq!(resolution.table.translate(2), Some(2));
    }

    #[test]
    fn test_bad_explicit_answer_stays_unresolved() {
        let foreign = ClassMap::from_names(["dog"]);
        let explicit = BTreeMap::from([("dog".to_string(), "perro".to_string())]);
        let resolution = resolve_translation(&foreign, &project(), &explicit);
        assert!(resolution.table.is_empty());
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.table.translate(0), None);
    }

    #[test]
    fn test_detector_mapping_uses_synonyms_and_activities() {
        let detector = ClassMap::from_names(["person", "bicycle", "keyboard", "tv", "mouse"]);
        let activities = ClassMap::from_names(["persona", "teclado", "mouse"]);
        let mapping = resolve_detector_mapping(&detector, &project(), &activities);
        assert_eq!(mapping.get(&0), Some(&0));
        assert_eq!(mapping.get(&1), None);
        assert_eq!(mapping.get(&2), Some(&1));
        // `monitor` is a project class but not an active activity.
        assert_eq!(mapping.get(&3), None);
        assert_eq!(mapping.get(&4), Some(&2));
    }
}
