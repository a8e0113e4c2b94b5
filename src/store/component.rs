//! Component definitions and their typed attribute records.
//!
//! Every definition has a fixed schema expressed as a variant of
//! [`ComponentData`]. Definitions are addressed by a small integer id so a set
//! of them fits in a [`ComponentDefSet`](super::ComponentDefSet) bitfield.

use std::fmt;

use serde::Serialize;

use super::EntityId;
use crate::graph::DepKind;

/// JSON object used for metadata dictionaries.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Named component definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "&'static str")]
#[repr(u8)]
pub enum ComponentDef {
    Source = 0,
    Destination,
    Metadata,
    Markup,
    Script,
    Style,
    Output,
    Title,
    Dependency,
    Url,
    Error,
    Tag,
}

impl ComponentDef {
    pub const ALL: [ComponentDef; 12] = [
        Self::Source,
        Self::Destination,
        Self::Metadata,
        Self::Markup,
        Self::Script,
        Self::Style,
        Self::Output,
        Self::Title,
        Self::Dependency,
        Self::Url,
        Self::Error,
        Self::Tag,
    ];

    /// Human-readable definition name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
            Self::Metadata => "metadata",
            Self::Markup => "markup-text",
            Self::Script => "script-text",
            Self::Style => "style-text",
            Self::Output => "rendered-output",
            Self::Title => "title",
            Self::Dependency => "dependency-edge",
            Self::Url => "url",
            Self::Error => "error",
            Self::Tag => "tag",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|def| def.name() == name)
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl From<ComponentDef> for &'static str {
    fn from(def: ComponentDef) -> Self {
        def.name()
    }
}

impl fmt::Display for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute record of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "def", rename_all = "kebab-case")]
pub enum ComponentData {
    /// A file or directory below the content root.
    Source {
        url: String,
        is_dir: bool,
        /// Milliseconds since the unix epoch.
        mtime: u64,
        ctime: u64,
    },
    /// Output URL the entity is written to.
    Destination { url: String },
    Metadata { meta: JsonMap },
    #[serde(rename = "markup-text")]
    Markup { text: String, mime: String },
    #[serde(rename = "script-text")]
    Script { text: String },
    #[serde(rename = "style-text")]
    Style { text: String },
    #[serde(rename = "rendered-output")]
    Output { text: String, mime: String },
    Title { text: String },
    #[serde(rename = "dependency-edge")]
    Dependency {
        src: EntityId,
        dst: EntityId,
        #[serde(rename = "type")]
        kind: DepKind,
    },
    /// Literal reference text, attached to edges.
    Url { url: String },
    Error { pass: String, message: String },
    Tag { name: String },
}

impl ComponentData {
    pub const fn def(&self) -> ComponentDef {
        match self {
            Self::Source { .. } => ComponentDef::Source,
            Self::Destination { .. } => ComponentDef::Destination,
            Self::Metadata { .. } => ComponentDef::Metadata,
            Self::Markup { .. } => ComponentDef::Markup,
            Self::Script { .. } => ComponentDef::Script,
            Self::Style { .. } => ComponentDef::Style,
            Self::Output { .. } => ComponentDef::Output,
            Self::Title { .. } => ComponentDef::Title,
            Self::Dependency { .. } => ComponentDef::Dependency,
            Self::Url { .. } => ComponentDef::Url,
            Self::Error { .. } => ComponentDef::Error,
            Self::Tag { .. } => ComponentDef::Tag,
        }
    }
}

/// A component bound to its entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub eid: EntityId,
    #[serde(flatten)]
    pub data: ComponentData,
}

impl Component {
    pub const fn new(eid: EntityId, data: ComponentData) -> Self {
        Self { eid, data }
    }

    #[inline]
    pub const fn def(&self) -> ComponentDef {
        self.data.def()
    }
}
