use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A closed vocabulary of tags (skills, services, needs).
pub trait Capability: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.name() == normalized)
    }
}

/// Known tags plus a bucket of free-form tags nobody has modeled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet<C: Capability> {
    known: BTreeSet<C>,
    other: BTreeSet<String>,
}

impl<C: Capability> Default for CapabilitySet<C> {
    fn default() -> Self {
        Self {
            known: BTreeSet::new(),
            other: BTreeSet::new(),
        }
    }
}

impl<C: Capability> CapabilitySet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() {
            return;
        }

        match C::from_name(tag) {
            Some(known) => {
                self.known.insert(known);
            }
            None => {
                self.other.insert(tag.to_ascii_lowercase());
            }
        }
    }

    pub fn contains(&self, capability: C) -> bool {
        self.known.contains(&capability)
    }

    pub fn other(&self) -> impl Iterator<Item = &str> {
        self.other.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.other.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.known
            .iter()
            .map(|capability| capability.name().to_string())
            .chain(self.other.iter().cloned())
            .collect()
    }
}

impl<C: Capability> FromIterator<C> for CapabilitySet<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            known: iter.into_iter().collect(),
            other: BTreeSet::new(),
        }
    }
}

impl<'a, C: Capability> FromIterator<&'a str> for CapabilitySet<C> {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert_tag(tag);
        }
        set
    }
}

impl<C: Capability> Serialize for CapabilitySet<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in &names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

struct CapabilitySetVisitor<C>(PhantomData<C>);

impl<'de, C: Capability> Visitor<'de> for CapabilitySetVisitor<C> {
    type Value = CapabilitySet<C>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of tags or a map of tag to boolean")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(CapabilitySet::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut set = CapabilitySet::new();
        while let Some(tag) = seq.next_element::<String>()? {
            set.insert_tag(&tag);
        }
        Ok(set)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut set = CapabilitySet::new();
        while let Some((tag, enabled)) = map.next_entry::<String, bool>()? {
            if enabled {
                set.insert_tag(&tag);
            }
        }
        Ok(set)
    }
}

impl<'de, C: Capability> Deserialize<'de> for CapabilitySet<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CapabilitySetVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Skill {
    Medical,
    FirstAid,
    Cpr,
    Transportation,
    Childcare,
    ElderlyCare,
    Cleanup,
    Shelter,
    Rescue,
}

impl Capability for Skill {
    const ALL: &'static [Self] = &[
        Skill::Medical,
        Skill::FirstAid,
        Skill::Cpr,
        Skill::Transportation,
        Skill::Childcare,
        Skill::ElderlyCare,
        Skill::Cleanup,
        Skill::Shelter,
        Skill::Rescue,
    ];

    fn name(self) -> &'static str {
        match self {
            Skill::Medical => "medical",
            Skill::FirstAid => "first_aid",
            Skill::Cpr => "cpr",
            Skill::Transportation => "transportation",
            Skill::Childcare => "childcare",
            Skill::ElderlyCare => "elderly_care",
            Skill::Cleanup => "cleanup",
            Skill::Shelter => "shelter",
            Skill::Rescue => "rescue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Service {
    Shelter,
    Food,
    Medical,
    Transportation,
    Clothing,
    FinancialAid,
}

impl Capability for Service {
    const ALL: &'static [Self] = &[
        Service::Shelter,
        Service::Food,
        Service::Medical,
        Service::Transportation,
        Service::Clothing,
        Service::FinancialAid,
    ];

    fn name(self) -> &'static str {
        match self {
            Service::Shelter => "shelter",
            Service::Food => "food",
            Service::Medical => "medical",
            Service::Transportation => "transportation",
            Service::Clothing => "clothing",
            Service::FinancialAid => "financial_aid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Need {
    Shelter,
    Food,
    Medical,
    Transportation,
    Clothing,
    Financial,
}

impl Capability for Need {
    const ALL: &'static [Self] = &[
        Need::Shelter,
        Need::Food,
        Need::Medical,
        Need::Transportation,
        Need::Clothing,
        Need::Financial,
    ];

    fn name(self) -> &'static str {
        match self {
            Need::Shelter => "shelter",
            Need::Food => "food",
            Need::Medical => "medical",
            Need::Transportation => "transportation",
            Need::Clothing => "clothing",
            Need::Financial => "financial",
        }
    }
}

pub type SkillSet = CapabilitySet<Skill>;
pub type ServiceSet = CapabilitySet<Service>;
pub type NeedSet = CapabilitySet<Need>;
