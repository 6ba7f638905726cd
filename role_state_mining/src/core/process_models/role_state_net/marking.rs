use std::collections::BTreeMap;
use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;

use super::net_struct::{PlaceID, RoleStateNet};
use super::semantics::FiringError;
use crate::core::event_data::state_snapshot_log::RoleSet;

///
/// Canonical, hashable description of a [`Marking`]
///
/// `(place name, place ID, tokens)` triples sorted by name, so markings reached along different
/// firing sequences compare equal.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkingSignature(pub Vec<(String, PlaceID, u32)>);

///
/// Token distribution over the places of one [`RoleStateNet`]
///
/// Places without tokens are not stored. Markings borrow the net they belong to; two markings
/// are equal only if they refer to the same net instance.
///
#[derive(Debug, Clone)]
pub struct Marking<'n> {
    net: &'n RoleStateNet,
    tokens: BTreeMap<PlaceID, u32>,
}

impl<'n> Marking<'n> {
    /// Create a marking, checking that every place belongs to `net`
    pub fn new<I>(net: &'n RoleStateNet, tokens: I) -> Result<Self, FiringError>
    where
        I: IntoIterator<Item = (PlaceID, u32)>,
    {
        let mut result = BTreeMap::new();
        for (place, count) in tokens {
            if net.place(place).is_none() {
                return Err(FiringError::UnknownPlace(place));
            }
            if count > 0 {
                *result.entry(place).or_insert(0) += count;
            }
        }
        Ok(Self {
            net,
            tokens: result,
        })
    }

    /// Marking with one token on each of the named places
    pub fn from_place_names<'a>(
        net: &'n RoleStateNet,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, FiringError> {
        let mut tokens = Vec::new();
        for name in names {
            let place = net
                .place_by_name(name)
                .ok_or_else(|| FiringError::UnknownPlaceName(name.to_string()))?;
            tokens.push((place.id, 1));
        }
        Self::new(net, tokens)
    }

    /// Marking without any tokens
    pub fn empty(net: &'n RoleStateNet) -> Self {
        Self {
            net,
            tokens: BTreeMap::new(),
        }
    }

    pub(crate) fn from_tokens_unchecked<I>(net: &'n RoleStateNet, tokens: I) -> Self
    where
        I: IntoIterator<Item = (PlaceID, u32)>,
    {
        Self {
            net,
            tokens: tokens.into_iter().filter(|(_, c)| *c > 0).collect(),
        }
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut BTreeMap<PlaceID, u32> {
        &mut self.tokens
    }

    /// The net this marking refers to
    pub fn net(&self) -> &'n RoleStateNet {
        self.net
    }

    /// Tokens on a place
    pub fn tokens(&self, place: PlaceID) -> u32 {
        self.tokens.get(&place).copied().unwrap_or(0)
    }

    /// Places holding at least one token
    pub fn marked_places(&self) -> impl Iterator<Item = PlaceID> + '_ {
        self.tokens.keys().copied()
    }

    /// Whether no place holds a token
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Names of the marked places
    ///
    /// This is the role set a marking stands for in generated traces.
    pub fn place_names(&self) -> RoleSet {
        self.net.place_names(self.tokens.keys())
    }

    /// Canonical signature
    pub fn signature(&self) -> MarkingSignature {
        let mut entries: Vec<(String, PlaceID, u32)> = self
            .tokens
            .iter()
            .map(|(p, c)| {
                let name = self.net.place(*p).map(|p| p.name.clone()).unwrap_or_default();
                (name, *p, *c)
            })
            .collect();
        entries.sort();
        MarkingSignature(entries)
    }
}

impl PartialEq for Marking<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.net, other.net) && self.tokens == other.tokens
    }
}

impl Eq for Marking<'_> {}

impl Hash for Marking<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

impl Display for Marking<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .signature()
            .0
            .into_iter()
            .map(|(name, _, count)| {
                if count == 1 {
                    name
                } else {
                    format!("{name}:{count}")
                }
            })
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
