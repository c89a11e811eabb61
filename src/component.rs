// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Components are themselves entities, distinguished only by a [`ComponentRecord`]
//! registered against their id. A component with `size == 0` is a tag: present or
//! absent, never stored.

use ahash::AHashMap;

use crate::entity::Entity;

/// Metadata attached to an entity that is being used as a component identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRecord {
    /// Storage stride in bytes. `0` means "tag" (presence-only, no column data).
    pub size: u8,
}

impl ComponentRecord {
    pub fn sized(size: u8) -> Self {
        Self { size }
    }

    pub fn tag() -> Self {
        Self { size: 0 }
    }

    pub fn is_tag(self) -> bool {
        self.size == 0
    }
}

/// Maps component-entity ids to their [`ComponentRecord`].
///
/// Grounded on the teacher's hash-map-of-metadata pattern (its `component_tracker`
/// and `archetype_index`), generalized from `TypeId`-keyed to runtime `Entity`-keyed.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    records: AHashMap<Entity, ComponentRecord>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            records: AHashMap::new(),
        }
    }

    pub fn register(&mut self, component: Entity, record: ComponentRecord) {
        self.records.insert(component, record);
    }

    pub fn record(&self, component: Entity) -> Option<ComponentRecord> {
        self.records.get(&component).copied()
    }

    pub fn size_of(&self, component: Entity) -> Option<u8> {
        self.record(component).map(|r| r.size)
    }

    /// A component with no registered record is treated as a tag: it has no bytes to
    /// place in a column, so `is_tag` defaults to `true` for the unregistered case
    /// rather than forcing every caller to unwrap.
    pub fn is_tag(&self, component: Entity) -> bool {
        self.record(component).is_none_or(ComponentRecord::is_tag)
    }
}
