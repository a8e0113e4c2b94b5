//! Hydrated entity view.

use serde::Serialize;

use super::{ComponentData, ComponentDef, ComponentDefSet, EntityId, JsonMap};
use crate::graph::DepKind;

/// An entity with the set of definitions it carries and, when resolved, the
/// component records themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    /// Creation sequence number.
    #[serde(skip)]
    pub seq: u64,
    pub defs: ComponentDefSet,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentData>,
}

impl Entity {
    #[inline]
    pub const fn has(&self, def: ComponentDef) -> bool {
        self.defs.contains(def)
    }

    pub fn get(&self, def: ComponentDef) -> Option<&ComponentData> {
        self.components.iter().find(|c| c.def() == def)
    }

    pub fn source_url(&self) -> Option<&str> {
        match self.get(ComponentDef::Source) {
            Some(ComponentData::Source { url, .. }) => Some(url),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(
            self.get(ComponentDef::Source),
            Some(ComponentData::Source { is_dir: true, .. })
        )
    }

    pub fn destination(&self) -> Option<&str> {
        match self.get(ComponentDef::Destination) {
            Some(ComponentData::Destination { url }) => Some(url),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&JsonMap> {
        match self.get(ComponentDef::Metadata) {
            Some(ComponentData::Metadata { meta }) => Some(meta),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self.get(ComponentDef::Title) {
            Some(ComponentData::Title { text }) => Some(text),
            _ => None,
        }
    }

    /// Literal reference text attached to an edge.
    pub fn literal(&self) -> Option<&str> {
        match self.get(ComponentDef::Url) {
            Some(ComponentData::Url { url }) => Some(url),
            _ => None,
        }
    }

    pub fn dependency(&self) -> Option<(EntityId, EntityId, DepKind)> {
        match self.get(ComponentDef::Dependency) {
            Some(ComponentData::Dependency { src, dst, kind }) => Some((*src, *dst, *kind)),
            _ => None,
        }
    }

    /// Text content and mime of whichever text component the entity has.
    pub fn text(&self) -> Option<(&str, &str)> {
        self.components.iter().find_map(|c| match c {
            ComponentData::Markup { text, mime } => Some((text.as_str(), mime.as_str())),
            ComponentData::Style { text } => Some((text.as_str(), "text/css")),
            ComponentData::Script { text } => Some((text.as_str(), "text/javascript")),
            _ => None,
        })
    }

    pub fn output(&self) -> Option<(&str, &str)> {
        match self.get(ComponentDef::Output) {
            Some(ComponentData::Output { text, mime }) => Some((text, mime)),
            _ => None,
        }
    }
}
