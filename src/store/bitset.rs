//! Compact set of component definitions.

use std::fmt;

use serde::{Serialize, Serializer};

use super::ComponentDef;

/// Bitfield over [`ComponentDef`] ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentDefSet(u32);

impl ComponentDefSet {
    pub const EMPTY: Self = Self(0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn of(defs: &[ComponentDef]) -> Self {
        defs.iter().copied().collect()
    }

    pub fn insert(&mut self, def: ComponentDef) {
        self.0 |= def.bit();
    }

    pub fn remove(&mut self, def: ComponentDef) {
        self.0 &= !def.bit();
    }

    #[inline]
    pub const fn contains(self, def: ComponentDef) -> bool {
        self.0 & def.bit() != 0
    }

    #[inline]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = ComponentDef> {
        ComponentDef::ALL
            .into_iter()
            .filter(move |def| self.contains(*def))
    }
}

impl FromIterator<ComponentDef> for ComponentDefSet {
    fn from_iter<I: IntoIterator<Item = ComponentDef>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for def in iter {
            set.insert(def);
        }
        set
    }
}

impl From<ComponentDef> for ComponentDefSet {
    fn from(def: ComponentDef) -> Self {
        Self(def.bit())
    }
}

impl<const N: usize> From<[ComponentDef; N]> for ComponentDefSet {
    fn from(defs: [ComponentDef; N]) -> Self {
        defs.into_iter().collect()
    }
}

impl fmt::Display for ComponentDefSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(ComponentDef::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

impl Serialize for ComponentDefSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(ComponentDef::name))
    }
}
