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

//! `World`: owns entities, archetypes, the component registry and the query registry,
//! and implements [`WorldContext`] — the narrow read/write surface the query and type
//! modules are written against instead of threading the whole `World` through them.

use std::ptr::NonNull;

use ahash::AHashMap;

#[cfg(feature = "profiling")]
use tracing::instrument;

use crate::archetype::{Archetype, ArchetypeId};
use crate::bitset::BitSet;
use crate::component::{ComponentRecord, ComponentRegistry};
use crate::entity::{Entity, EntityAllocator, EntityRecord, INVALID_ENTITY};
use crate::error::{EcsError, Result};
use crate::hierarchy;
use crate::query::{Query, Signature};
use crate::registry::{QueryId, Registry};
use crate::types::{self, Type, TypeStore};

/// The small-capability context record the query and type modules read through,
/// instead of taking `&World`/`&mut World` directly.
pub trait WorldContext {
    fn get_type(&self, entity: Entity) -> Option<Type>;
    fn get_record(&self, entity: Entity) -> Option<EntityRecord>;
    fn get_ptr(&self, entity: Entity, component: Entity) -> Option<NonNull<u8>>;
    fn set_watch(&mut self, entity: Entity);
    fn has(&self, entity: Entity, component: Entity) -> bool;
    fn component_size(&self, component: Entity) -> Option<u8>;
    fn archetypes(&self) -> &[Archetype];
    fn archetype_type(&self, id: ArchetypeId) -> Option<Type>;
}

pub struct World {
    entities: EntityAllocator,
    records: AHashMap<Entity, EntityRecord>,
    components: ComponentRegistry,
    types: TypeStore,
    archetypes: Vec<Archetype>,
    archetype_index: AHashMap<Type, ArchetypeId>,
    watched: BitSet,
    registry: Registry,
    disabled_tag: Entity,
    prefab_tag: Entity,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let mut world = Self {
            entities: EntityAllocator::new(),
            records: AHashMap::new(),
            components: ComponentRegistry::new(),
            types: TypeStore::new(),
            archetypes: Vec::new(),
            archetype_index: AHashMap::new(),
            watched: BitSet::with_capacity(256),
            registry: Registry::new(),
            disabled_tag: INVALID_ENTITY,
            prefab_tag: INVALID_ENTITY,
        };

        let empty = world.types.intern(Vec::new());
        world.archetypes.push(Archetype::new(empty, |_| 0));
        world.archetype_index.insert(empty, 0);

        world.disabled_tag = world.spawn_empty().expect("fresh allocator has capacity");
        world.prefab_tag = world.spawn_empty().expect("fresh allocator has capacity");
        world
    }

    pub fn disabled_tag(&self) -> Entity {
        self.disabled_tag
    }

    pub fn prefab_tag(&self) -> Entity {
        self.prefab_tag
    }

    pub fn entity_count(&self) -> usize {
        self.entities.live_count()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_watched(&self, entity: Entity) -> bool {
        self.watched.contains(entity.index() as usize)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn table_of(&self, entity: Entity) -> Option<(ArchetypeId, Type)> {
        let record = self.records.get(&entity)?;
        let type_ = self.archetypes.get(record.archetype)?.type_();
        Some((record.archetype, type_))
    }

    /// Spawn a new entity into the empty archetype.
    pub fn spawn_empty(&mut self) -> Result<Entity> {
        let entity = self
            .entities
            .allocate()
            .ok_or(EcsError::OutOfCapacity)?;
        let row = self.archetypes[0].allocate_row(entity);
        self.records.insert(entity, EntityRecord { archetype: 0, row });
        Ok(entity)
    }

    /// Spawn a new entity to act as a component identifier, registering its storage
    /// record.
    pub fn register_component(&mut self, record: ComponentRecord) -> Result<Entity> {
        let entity = self.spawn_empty()?;
        self.components.register(entity, record);
        Ok(entity)
    }

    pub fn component_record(&self, component: Entity) -> Option<ComponentRecord> {
        self.components.record(component)
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<()> {
        let record = self
            .records
            .remove(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let swapped = self.archetypes[record.archetype].remove_row(record.row);
        if let Some(swapped_entity) = swapped {
            if let Some(r) = self.records.get_mut(&swapped_entity) {
                r.row = record.row;
            }
        }
        self.entities.free(entity);
        Ok(())
    }

    #[cfg_attr(feature = "profiling", instrument(skip(self)))]
    pub fn add_component(&mut self, entity: Entity, component: Entity) -> Result<()> {
        let record = *self
            .records
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let old_type = self.archetypes[record.archetype].type_();
        let new_type = self.types.add(old_type, component);
        if new_type == old_type {
            return Ok(());
        }
        let new_archetype_id = self.get_or_create_archetype(new_type)?;
        self.move_entity(entity, record, new_archetype_id)
    }

    pub fn remove_component(&mut self, entity: Entity, component: Entity) -> Result<()> {
        let record = *self
            .records
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let old_type = self.archetypes[record.archetype].type_();
        let new_type = self.types.remove(old_type, component);
        if new_type == old_type {
            return Ok(());
        }
        let new_archetype_id = self.get_or_create_archetype(new_type)?;
        self.move_entity(entity, record, new_archetype_id)
    }

    /// Embed a `CHILD_OF` relation element targeting `parent` into `child`'s type.
    pub fn set_child_of(&mut self, child: Entity, parent: Entity) -> Result<()> {
        if hierarchy::would_cycle(&*self, child, parent) {
            return Err(EcsError::InvalidRelationSource);
        }
        self.add_relation(child, Entity::child_of(parent))
    }

    /// Embed an `INSTANCE_OF` relation element targeting `prefab` into `entity`'s type.
    pub fn set_instance_of(&mut self, entity: Entity, prefab: Entity) -> Result<()> {
        if hierarchy::would_cycle(&*self, entity, prefab) {
            return Err(EcsError::InvalidRelationSource);
        }
        let record = *self
            .records
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let type_ = self.archetypes[record.archetype].type_();
        if hierarchy::has_prefab_marker(&*self, type_, self.prefab_tag) {
            return Err(EcsError::MultiplePrefabs);
        }
        self.add_relation(entity, Entity::instance_of(prefab))
    }

    fn add_relation(&mut self, entity: Entity, relation_element: Entity) -> Result<()> {
        let record = *self
            .records
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let old_type = self.archetypes[record.archetype].type_();
        let new_type = self.types.add(old_type, relation_element);
        if new_type == old_type {
            return Ok(());
        }
        let new_archetype_id = self.get_or_create_archetype(new_type)?;
        self.move_entity(entity, record, new_archetype_id)
    }

    fn get_or_create_archetype(&mut self, type_: Type) -> Result<ArchetypeId> {
        if let Some(&id) = self.archetype_index.get(&type_) {
            return Ok(id);
        }
        let id = self.archetypes.len();
        let components = &self.components;
        let archetype = Archetype::new(type_, |e| components.size_of(e).unwrap_or(0));
        self.archetypes.push(archetype);
        self.archetype_index.insert(type_, id);
        self.notify_new_table(id)?;
        Ok(id)
    }

    /// Move `entity` from its current row into `new_archetype_id`, copying the bytes
    /// of every component shared between the old and new table (mechanically adapted
    /// from the split-borrow `move_entity` pattern common to archetype ECS
    /// implementations, generalized from compile-time `TypeId` columns to runtime
    /// `Entity` columns).
    fn move_entity(
        &mut self,
        entity: Entity,
        old_record: EntityRecord,
        new_archetype_id: ArchetypeId,
    ) -> Result<()> {
        if new_archetype_id == old_record.archetype {
            return Ok(());
        }

        let new_row = {
            let (old_archetype, new_archetype) =
                two_mut(&mut self.archetypes, old_record.archetype, new_archetype_id);
            let new_row = new_archetype.allocate_row(entity);
            for &element in new_archetype.type_().as_slice() {
                if element.is_relation() {
                    continue;
                }
                let Some(size) = new_archetype.column_item_size(element) else {
                    continue;
                };
                if size == 0 {
                    continue;
                }
                if let (Some(src), Some(dst)) = (
                    old_archetype.get_ptr(element, old_record.row),
                    new_archetype.get_ptr(element, new_row),
                ) {
                    // SAFETY: `src`/`dst` point at `size` live bytes in two distinct,
                    // non-overlapping column buffers.
                    unsafe {
                        std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), size);
                    }
                }
            }
            new_row
        };

        let swapped = self.archetypes[old_record.archetype].remove_row(old_record.row);
        if let Some(swapped_entity) = swapped {
            if let Some(r) = self.records.get_mut(&swapped_entity) {
                r.row = old_record.row;
            }
        }
        self.records.insert(
            entity,
            EntityRecord {
                archetype: new_archetype_id,
                row: new_row,
            },
        );
        Ok(())
    }

    fn notify_new_table(&mut self, table: ArchetypeId) -> Result<()> {
        let mut registry = std::mem::take(&mut self.registry);
        let result = registry.on_new_table(self, table);
        self.registry = registry;
        result
    }

    pub fn new_query(&mut self, signature: Signature) -> Result<QueryId> {
        let disabled = self.disabled_tag;
        let prefab = self.prefab_tag;
        let mut registry = std::mem::take(&mut self.registry);
        let result = registry.new_query(self, signature, disabled, prefab);
        self.registry = registry;
        result
    }

    pub fn free_query(&mut self, id: QueryId) {
        self.registry.free_query(id);
    }

    pub fn query(&self, id: QueryId) -> Option<&Query> {
        self.registry.get(id)
    }

    pub fn query_count(&self) -> usize {
        self.registry.len()
    }
}

impl WorldContext for World {
    fn get_type(&self, entity: Entity) -> Option<Type> {
        let record = self.records.get(&entity)?;
        self.archetypes.get(record.archetype).map(Archetype::type_)
    }

    fn get_record(&self, entity: Entity) -> Option<EntityRecord> {
        self.records.get(&entity).copied()
    }

    fn get_ptr(&self, entity: Entity, component: Entity) -> Option<NonNull<u8>> {
        let record = self.get_record(entity)?;
        self.archetypes
            .get(record.archetype)?
            .get_ptr(component, record.row)
    }

    fn set_watch(&mut self, entity: Entity) {
        self.watched.set(entity.index() as usize);
    }

    fn has(&self, entity: Entity, component: Entity) -> bool {
        self.get_type(entity)
            .is_some_and(|t| types::index_of(t, component).is_some())
    }

    fn component_size(&self, component: Entity) -> Option<u8> {
        self.components.size_of(component)
    }

    fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    fn archetype_type(&self, id: ArchetypeId) -> Option<Type> {
        self.archetypes.get(id).map(Archetype::type_)
    }
}

/// Borrow two distinct elements of `archetypes` mutably at once.
fn two_mut(archetypes: &mut [Archetype], a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
    assert_ne!(a, b, "cannot borrow the same archetype twice");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_despawn_round_trip() {
        let mut world = World::new();
        let e = world.spawn_empty().unwrap();
        assert!(world.is_alive(e));
        world.despawn(e).unwrap();
        assert!(!world.is_alive(e));
    }

    #[test]
    fn add_component_moves_entity_to_new_archetype() {
        let mut world = World::new();
        let pos = world.register_component(ComponentRecord::sized(8)).unwrap();
        let e = world.spawn_empty().unwrap();
        let (before, _) = world.table_of(e).unwrap();
        world.add_component(e, pos).unwrap();
        let (after, type_) = world.table_of(e).unwrap();
        assert_ne!(before, after);
        assert_eq!(types::index_of(type_, pos), Some(0));
    }

    #[test]
    fn add_component_preserves_existing_bytes() {
        let mut world = World::new();
        let pos = world.register_component(ComponentRecord::sized(4)).unwrap();
        let vel = world.register_component(ComponentRecord::sized(4)).unwrap();
        let e = world.spawn_empty().unwrap();
        world.add_component(e, pos).unwrap();

        let (archetype, _) = world.table_of(e).unwrap();
        let record = world.get_record(e).unwrap();
        let ptr = world.archetypes[archetype].get_ptr(pos, record.row).unwrap();
        unsafe {
            std::ptr::write(ptr.as_ptr() as *mut u32, 42);
        }

        world.add_component(e, vel).unwrap();
        let record = world.get_record(e).unwrap();
        let (archetype, _) = world.table_of(e).unwrap();
        let ptr = world.archetypes[archetype].get_ptr(pos, record.row).unwrap();
        let value = unsafe { std::ptr::read(ptr.as_ptr() as *const u32) };
        assert_eq!(value, 42);
    }

    #[test]
    fn remove_component_moves_entity_back() {
        let mut world = World::new();
        let pos = world.register_component(ComponentRecord::sized(4)).unwrap();
        let e = world.spawn_empty().unwrap();
        world.add_component(e, pos).unwrap();
        let (with_pos, _) = world.table_of(e).unwrap();
        world.remove_component(e, pos).unwrap();
        let (without_pos, type_) = world.table_of(e).unwrap();
        assert_ne!(with_pos, without_pos);
        assert_eq!(type_.len(), 0);
    }

    #[test]
    fn set_child_of_embeds_relation_element() {
        let mut world = World::new();
        let parent = world.spawn_empty().unwrap();
        let child = world.spawn_empty().unwrap();
        world.set_child_of(child, parent).unwrap();
        let (_, type_) = world.table_of(child).unwrap();
        assert!(type_.as_slice().iter().any(|e| e.is_child_of() && e.target() == parent));
    }

    #[test]
    fn set_child_of_rejects_cycles() {
        let mut world = World::new();
        let a = world.spawn_empty().unwrap();
        let b = world.spawn_empty().unwrap();
        world.set_child_of(b, a).unwrap();
        assert!(world.set_child_of(a, b).is_err());
    }

    #[test]
    fn new_query_eagerly_matches_existing_tables() {
        let mut world = World::new();
        let pos = world.register_component(ComponentRecord::sized(8)).unwrap();
        let e = world.spawn_empty().unwrap();
        world.add_component(e, pos).unwrap();

        let mut sig = Signature::new();
        sig.push(crate::query::SignatureColumn::new(
            crate::query::FromKind::Self_,
            crate::query::OpKind::And,
            crate::query::Payload::Component(pos),
        ));
        let id = world.new_query(sig).unwrap();
        assert_eq!(world.query(id).unwrap().matched_tables().len(), 1);
    }
}
