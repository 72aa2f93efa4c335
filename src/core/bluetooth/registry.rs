//! Semantic name -> characteristic handle mapping, filled during discovery

use std::collections::HashMap;

use log::{debug, info};
use uuid::Uuid;

use crate::core::bluetooth::types::{CharacteristicHandle, CharacteristicKind};

#[derive(Debug, Default, Clone)]
pub struct CharacteristicRegistry {
    entries: HashMap<CharacteristicKind, CharacteristicHandle>,
}

impl CharacteristicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies discovered characteristics against the known table.
    /// Unknown identifiers are dropped. Returns the number of entries stored.
    pub fn populate<I>(&mut self, characteristics: I) -> usize
    where
        I: IntoIterator<Item = (Uuid, CharacteristicHandle)>,
    {
        let mut stored = 0;
        for (uuid, handle) in characteristics {
            match CharacteristicKind::from_uuid(uuid) {
                Some(kind) => {
                    info!("Found {} characteristic: {}", kind, uuid);
                    self.entries.insert(kind, handle);
                    stored += 1;
                }
                None => debug!("Ignoring unknown characteristic: {}", uuid),
            }
        }
        stored
    }

    pub fn get(&self, kind: CharacteristicKind) -> Option<CharacteristicHandle> {
        self.entries.get(&kind).copied()
    }

    /// Reverse lookup used when a value arrives for a handle
    pub fn kind_of(&self, handle: CharacteristicHandle) -> Option<CharacteristicKind> {
        self.entries
            .iter()
            .find_map(|(kind, h)| (*h == handle).then_some(*kind))
    }

    pub fn contains(&self, kind: CharacteristicKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
