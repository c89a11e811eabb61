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

//! Entity identifiers: packed 64-bit ids with relation-tag flag bits.
//!
//! An [`Entity`] is either an ordinary handle (index + generation, no flags) or a
//! *relation element* embedded in a [`crate::types::Type`] — a `CHILD_OF` or
//! `INSTANCE_OF` edge to a target entity. Both live in the same `u64` space so that a
//! type's sorted `Vec<Entity>` can hold components and relations side by side.

use std::fmt;

/// Marks a type element as "this table's entities are children of `target`".
pub const CHILD_OF_FLAG: u64 = 1 << 63;
/// Marks a type element as "this table's entities are instances of prefab `target`".
pub const INSTANCE_OF_FLAG: u64 = 1 << 62;
/// Both relation flags together.
const RELATION_FLAGS: u64 = CHILD_OF_FLAG | INSTANCE_OF_FLAG;
/// The bits below the two relation flags: the entity mask.
pub const ENTITY_MASK: u64 = !RELATION_FLAGS;

const GENERATION_BITS: u32 = 30;
const INDEX_BITS: u32 = 32;
const GENERATION_SHIFT: u32 = INDEX_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u64 = (1 << GENERATION_BITS) - 1;

/// An opaque 64-bit entity identifier.
///
/// Ordinary handles carry no relation flags; the low 32 bits are an allocator index,
/// the next 30 bits a generation counter guarding against stale handles. A raw id with
/// [`CHILD_OF_FLAG`] or [`INSTANCE_OF_FLAG`] set is a relation element, not a handle —
/// `target()` extracts the entity it relates to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub u64);

/// Sentinel for "no entity" / an unresolved reference target.
pub const INVALID_ENTITY: Entity = Entity(0);

impl Entity {
    #[inline]
    pub fn from_parts(index: u32, generation: u32) -> Self {
        debug_assert!(generation & !(GENERATION_MASK as u32) == 0);
        Entity(((generation as u64) << GENERATION_SHIFT) | index as u64)
    }

    #[inline]
    pub fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        ((self.0 >> GENERATION_SHIFT) & GENERATION_MASK) as u32
    }

    /// Build a `CHILD_OF` relation element pointing at `target`.
    #[inline]
    pub fn child_of(target: Entity) -> Self {
        Entity((target.0 & ENTITY_MASK) | CHILD_OF_FLAG)
    }

    /// Build an `INSTANCE_OF` relation element pointing at `target`.
    #[inline]
    pub fn instance_of(target: Entity) -> Self {
        Entity((target.0 & ENTITY_MASK) | INSTANCE_OF_FLAG)
    }

    #[inline]
    pub fn is_child_of(self) -> bool {
        self.0 & CHILD_OF_FLAG != 0
    }

    #[inline]
    pub fn is_instance_of(self) -> bool {
        self.0 & INSTANCE_OF_FLAG != 0
    }

    #[inline]
    pub fn is_relation(self) -> bool {
        self.0 & RELATION_FLAGS != 0
    }

    /// The entity this relation element refers to. Identity for ordinary entities.
    #[inline]
    pub fn target(self) -> Entity {
        Entity(self.0 & ENTITY_MASK)
    }

    #[inline]
    pub fn is_invalid(self) -> bool {
        self.target().0 == 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_child_of() {
            write!(f, "ChildOf({:?})", self.target())
        } else if self.is_instance_of() {
            write!(f, "InstanceOf({:?})", self.target())
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

/// Generational index allocator for [`Entity`] handles.
///
/// Mirrors the free-list-plus-generation-counter pattern common to archetype ECS
/// entity allocators: a freed index is recycled, but its generation is bumped so a
/// stale handle referring to the old occupant can be told apart from the new one.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a fresh entity id. Returns `None` if the 32-bit index space is
    /// exhausted (an [`crate::error::EcsError::OutOfCapacity`] case for the caller).
    pub fn allocate(&mut self) -> Option<Entity> {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            return Some(Entity::from_parts(index, generation));
        }

        let index = self.generations.len();
        if index > u32::MAX as usize {
            return None;
        }
        self.generations.push(0);
        Some(Entity::from_parts(index as u32, 0))
    }

    /// Returns true if `entity` refers to a currently-live slot at its recorded
    /// generation.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        self.generations
            .get(index)
            .is_some_and(|&gen| gen == entity.generation())
    }

    /// Free `entity`'s slot, bumping its generation so old handles go stale.
    ///
    /// Returns `false` if the entity was already dead (double despawn).
    pub fn free(&mut self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        if !self.is_alive(entity) {
            return false;
        }
        self.generations[index] = self.generations[index].wrapping_add(1) & (GENERATION_MASK as u32);
        self.free_list.push(index as u32);
        true
    }

    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

/// Where an entity's row lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    pub archetype: usize,
    pub row: usize,
}
