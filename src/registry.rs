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

//! Holds the set of live queries and re-matches them as new tables appear.

use slotmap::{new_key_type, SlotMap};

use crate::archetype::ArchetypeId;
use crate::error::Result;
use crate::query::{Query, Signature};
use crate::world::WorldContext;

new_key_type! {
    /// Handle to a registered [`Query`].
    ///
    /// Backed by `slotmap` rather than a bare `Vec` index for the same reason the
    /// entity allocator uses generations: `free_query` must not hand a still-valid id
    /// to a reused slot out from under another caller holding the old one.
    pub struct QueryId;
}

/// The set of queries a [`crate::world::World`] maintains, re-matched against new
/// tables as they appear.
#[derive(Default)]
pub struct Registry {
    queries: SlotMap<QueryId, Query>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            queries: SlotMap::with_key(),
        }
    }

    /// Register `signature` as a new query, eagerly matching it against every table
    /// that already exists. `disabled_tag`/`prefab_tag` are the world's reserved
    /// marker entities, applied before the eager match so the opt-in filters in
    /// `Query::match_table` see them from the start.
    pub fn new_query(
        &mut self,
        ctx: &mut impl WorldContext,
        signature: Signature,
        disabled_tag: crate::entity::Entity,
        prefab_tag: crate::entity::Entity,
    ) -> Result<QueryId> {
        let mut query = Query::new(signature);
        query.set_reserved_tags(disabled_tag, prefab_tag);
        let tables: Vec<_> = ctx
            .archetypes()
            .iter()
            .enumerate()
            .map(|(id, archetype)| (id, archetype.type_()))
            .collect();
        for (id, type_) in tables {
            query.add_table(ctx, id, type_)?;
        }
        Ok(self.queries.insert(query))
    }

    /// Drop a query. Its id is never reused, so stale references to it are simply
    /// inert rather than silently aliasing an unrelated query.
    pub fn free_query(&mut self, id: QueryId) -> Option<Query> {
        self.queries.remove(id)
    }

    pub fn get(&self, id: QueryId) -> Option<&Query> {
        self.queries.get(id)
    }

    pub fn get_mut(&mut self, id: QueryId) -> Option<&mut Query> {
        self.queries.get_mut(id)
    }

    /// Called by the world whenever a brand-new archetype is created: every live
    /// query gets a chance to match (and build a plan for) the table.
    pub fn on_new_table(&mut self, ctx: &mut impl WorldContext, table: ArchetypeId) -> Result<()> {
        let Some(type_) = ctx.archetype_type(table) else {
            return Ok(());
        };
        for (_, query) in self.queries.iter_mut() {
            query.add_table(ctx, table, type_)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
