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

//! Archetype (table) storage: the home of every entity sharing one [`Type`], laid out
//! as one byte column per component plus the entity column.

use rustc_hash::FxHashMap;

use crate::entity::Entity;
use crate::types::Type;

/// Opaque handle to a table in `World::archetypes`.
pub type ArchetypeId = usize;

/// Structure-of-arrays storage for every entity whose component multiset is `type_`.
///
/// Relation elements embedded in `type_` (`CHILD_OF`/`INSTANCE_OF`) do not get a
/// column — only ordinary component entities do. A component with `size == 0` still
/// gets a column entry (kept empty, per §3) so that `column_index` stays meaningful
/// for tag components too.
pub struct Archetype {
    type_: Type,
    entities: Vec<Entity>,
    columns: Vec<ComponentColumn>,
    column_index: FxHashMap<Entity, usize>,
    /// Bumped on any reallocation that can move a column's backing buffer, so cached
    /// reference pointers know to re-resolve (see `WorldContext::get_ptr`).
    generation: u64,
}

impl Archetype {
    /// Create an archetype for `type_`, registering a column for every non-relation
    /// element. `sizes` supplies each component's storage stride (0 ⇒ tag).
    pub fn new(type_: Type, sizes: impl Fn(Entity) -> u8) -> Self {
        let mut columns = Vec::new();
        let mut column_index = FxHashMap::default();
        for &element in type_.as_slice() {
            if element.is_relation() {
                continue;
            }
            let idx = columns.len();
            columns.push(ComponentColumn::new(sizes(element)));
            column_index.insert(element, idx);
        }
        Self {
            type_,
            entities: Vec::new(),
            columns,
            column_index,
            generation: 0,
        }
    }

    pub fn type_(&self) -> Type {
        self.type_
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn column_index(&self, component: Entity) -> Option<usize> {
        self.column_index.get(&component).copied()
    }

    pub fn column_by_index(&self, index: usize) -> Option<&ComponentColumn> {
        self.columns.get(index)
    }

    pub fn column_item_size(&self, component: Entity) -> Option<usize> {
        self.column(component).map(ComponentColumn::item_size)
    }

    pub fn column(&self, component: Entity) -> Option<&ComponentColumn> {
        let idx = self.column_index(component)?;
        self.columns.get(idx)
    }

    /// Pointer to `component`'s storage at `row`, or `None` for a tag / out-of-range
    /// row / unknown component.
    pub fn get_ptr(&self, component: Entity, row: usize) -> Option<std::ptr::NonNull<u8>> {
        let column = self.column(component)?;
        column.get_ptr(row)
    }

    /// Append a new row for `entity`, returning its row index.
    pub fn allocate_row(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_zeroed();
        }
        self.generation += 1;
        row
    }

    /// Remove `row` via swap-remove, returning the entity swapped into its place, if
    /// any.
    pub fn remove_row(&mut self, row: usize) -> Option<Entity> {
        if row >= self.entities.len() {
            return None;
        }
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.generation += 1;
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }

    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }
}

/// A single component's byte storage for every row of its owning archetype.
///
/// Unlike the teacher's generic `ComponentColumn<T>`, component types are not known at
/// compile time here — the core only routes bytes, it never interprets them — so there
/// is no per-element drop glue; ownership of the bytes' meaning belongs to the host
/// embedding this crate.
pub struct ComponentColumn {
    data: Vec<u8>,
    item_size: usize,
}

impl ComponentColumn {
    pub fn new(item_size: u8) -> Self {
        Self {
            data: Vec::new(),
            item_size: item_size as usize,
        }
    }

    pub fn is_tag(&self) -> bool {
        self.item_size == 0
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn len(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_zeroed(&mut self) {
        if self.item_size != 0 {
            self.data.resize(self.data.len() + self.item_size, 0);
        }
    }

    fn swap_remove(&mut self, row: usize) {
        if self.item_size == 0 {
            return;
        }
        let last = self.len() - 1;
        if row != last {
            let (a_start, b_start) = (row * self.item_size, last * self.item_size);
            for i in 0..self.item_size {
                self.data.swap(a_start + i, b_start + i);
            }
        }
        self.data.truncate(last * self.item_size);
    }

    fn reserve(&mut self, additional: usize) {
        if self.item_size != 0 {
            self.data.reserve(additional * self.item_size);
        }
    }

    pub fn get_ptr(&self, row: usize) -> Option<std::ptr::NonNull<u8>> {
        if self.item_size == 0 {
            return None;
        }
        let offset = row * self.item_size;
        if offset + self.item_size > self.data.len() {
            return None;
        }
        // SAFETY: `data` is non-empty at this offset, just checked above.
        unsafe {
            Some(std::ptr::NonNull::new_unchecked(
                self.data.as_ptr().add(offset) as *mut u8,
            ))
        }
    }

    pub fn get_mut_ptr(&mut self, row: usize) -> Option<std::ptr::NonNull<u8>> {
        if self.item_size == 0 {
            return None;
        }
        let offset = row * self.item_size;
        if offset + self.item_size > self.data.len() {
            return None;
        }
        unsafe {
            Some(std::ptr::NonNull::new_unchecked(
                self.data.as_mut_ptr().add(offset),
            ))
        }
    }
}
