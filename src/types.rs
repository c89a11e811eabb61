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

//! The type algebra: a *type* is the canonical, sorted sequence of entity ids that
//! names an archetype. Types are interned so that two tables with the same component
//! multiset share one allocation, and so `Type` equality is a pointer comparison at the
//! archetype index.

use std::cell::RefCell;
use std::ops::Deref;

use ahash::AHashMap;
use bumpalo::Bump;

use crate::entity::Entity;
use crate::world::WorldContext;

/// An interned, immutable, ascending-sorted sequence of entity ids.
///
/// `Type` is `Copy` — it is a pointer into the interner's arena plus a length, not an
/// owned buffer. Appending never mutates the pointee; [`TypeStore::add`] always returns
/// a (possibly freshly interned) new `Type`.
#[derive(Clone, Copy)]
pub struct Type {
    ptr: *const Entity,
    len: usize,
}

impl Type {
    pub const EMPTY: Type = Type {
        ptr: std::ptr::null(),
        len: 0,
    };

    pub fn as_slice(&self) -> &[Entity] {
        if self.len == 0 {
            &[]
        } else {
            // SAFETY: `ptr` was produced by `TypeStore::intern`, which keeps the
            // backing bump arena alive for as long as the store lives; every `Type`
            // handed out borrows that arena transitively through the store's lifetime.
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for Type {
    type Target = [Entity];
    fn deref(&self) -> &[Entity] {
        self.as_slice()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
impl Eq for Type {}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

/// Interns [`Type`] values in a bump arena keyed by their sorted contents, so that
/// archetypes with identical component multisets share the same slice.
///
/// Grounded on the teacher's `ArchetypeSignature` dedup pattern (an `AHashMap` keyed by
/// the sorted component list), generalized to actually own the backing bytes via
/// `bumpalo` rather than relying on `Vec<TypeId>`'s own allocation.
pub struct TypeStore {
    arena: Bump,
    interned: RefCell<AHashMap<Box<[Entity]>, Type>>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    pub fn new() -> Self {
        Self {
            arena: Bump::new(),
            interned: RefCell::new(AHashMap::new()),
        }
    }

    /// Intern an already-sorted, deduplicated slice, returning the canonical `Type`.
    pub fn intern_sorted(&self, elements: &[Entity]) -> Type {
        if elements.is_empty() {
            return Type::EMPTY;
        }
        if let Some(existing) = self.interned.borrow().get(elements) {
            return *existing;
        }
        let slot = self.arena.alloc_slice_copy(elements);
        let ty = Type {
            ptr: slot.as_ptr(),
            len: slot.len(),
        };
        self.interned
            .borrow_mut()
            .insert(elements.to_vec().into_boxed_slice(), ty);
        ty
    }

    /// Sort, dedup, and intern an arbitrary set of elements.
    pub fn intern(&self, mut elements: Vec<Entity>) -> Type {
        elements.sort_unstable();
        elements.dedup();
        self.intern_sorted(&elements)
    }

    /// Returns a new interned type with `component` inserted in sorted position.
    /// A no-op (returns `type_` unchanged) if `component` is already present.
    pub fn add(&self, type_: Type, component: Entity) -> Type {
        let slice = type_.as_slice();
        match slice.binary_search(&component) {
            Ok(_) => type_,
            Err(pos) => {
                let mut elements = Vec::with_capacity(slice.len() + 1);
                elements.extend_from_slice(&slice[..pos]);
                elements.push(component);
                elements.extend_from_slice(&slice[pos..]);
                self.intern_sorted(&elements)
            }
        }
    }

    /// Returns a new interned type with `component` removed, or `type_` unchanged if
    /// it was not present.
    pub fn remove(&self, type_: Type, component: Entity) -> Type {
        let slice = type_.as_slice();
        match slice.binary_search(&component) {
            Err(_) => type_,
            Ok(pos) => {
                let mut elements = Vec::with_capacity(slice.len() - 1);
                elements.extend_from_slice(&slice[..pos]);
                elements.extend_from_slice(&slice[pos + 1..]);
                self.intern_sorted(&elements)
            }
        }
    }
}

/// Position of `component` in the canonical order of `type_`, or `None`.
pub fn index_of(type_: Type, component: Entity) -> Option<usize> {
    type_.as_slice().binary_search(&component).ok()
}

/// Returns a witness component from `sub` present in `super_`.
///
/// If `match_all`, every element of `sub` must be present (witness is the last
/// matched element); otherwise the first present element suffices. If
/// `search_prefabs`, `INSTANCE_OF` links embedded in `super_` are followed
/// transparently: a component missing from `super_` directly may still be present on
/// an ancestor's own type.
pub fn contains(
    ctx: &impl WorldContext,
    super_: Type,
    sub: &[Entity],
    match_all: bool,
    search_prefabs: bool,
) -> Option<Entity> {
    let mut witness = None;
    for &component in sub {
        let present = if index_of(super_, component).is_some() {
            true
        } else if search_prefabs {
            find_owning_entity(ctx, None, super_, component).is_some()
        } else {
            false
        };

        if present {
            witness = Some(component);
            if !match_all {
                return witness;
            }
        } else if match_all {
            return None;
        }
    }
    witness
}

/// Single-element convenience wrapper around [`contains`].
pub fn has_entity_intern(
    ctx: &impl WorldContext,
    type_: Type,
    entity: Entity,
    search_prefabs: bool,
) -> bool {
    if index_of(type_, entity).is_some() {
        return true;
    }
    search_prefabs && find_owning_entity(ctx, None, type_, entity).is_some()
}

/// Walks `INSTANCE_OF` links to find the entity whose own type contains `component`.
///
/// When `start_entity` is `Some`, inheritance starts from that entity's type; when
/// `None`, every `INSTANCE_OF` element embedded directly in `type_` is tried as a
/// starting prefab. The walk is bounded by acyclicity of the inheritance graph, which
/// `World` guarantees at the point a `CHILD_OF`/`INSTANCE_OF` edge is introduced.
pub fn find_owning_entity(
    ctx: &impl WorldContext,
    start_entity: Option<Entity>,
    type_: Type,
    component: Entity,
) -> Option<Entity> {
    let mut frontier: Vec<Entity> = match start_entity {
        Some(e) => vec![e],
        None => type_
            .as_slice()
            .iter()
            .filter(|e| e.is_instance_of())
            .map(|e| e.target())
            .collect(),
    };

    while let Some(candidate) = frontier.pop() {
        let Some(candidate_type) = ctx.get_type(candidate) else {
            continue;
        };
        if index_of(candidate_type, component).is_some() {
            return Some(candidate);
        }
        frontier.extend(
            candidate_type
                .as_slice()
                .iter()
                .filter(|e| e.is_instance_of())
                .map(|e| e.target()),
        );
    }
    None
}

/// For each `CHILD_OF` edge embedded in `table_type`, dereferences the parent's own
/// type and applies [`contains`] against `sub_type`. Returns `(witness, parent)` on
/// the first (or, with `match_all`, the last) successful parent.
pub fn components_contains(
    ctx: &impl WorldContext,
    table_type: Type,
    sub: &[Entity],
    match_all: bool,
) -> Option<(Entity, Entity)> {
    for &element in table_type.as_slice() {
        if !element.is_child_of() {
            continue;
        }
        let parent = element.target();
        let Some(parent_type) = ctx.get_type(parent) else {
            continue;
        };
        if let Some(witness) = contains(ctx, parent_type, sub, match_all, true) {
            return Some((witness, parent));
        }
    }
    None
}
