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

//! Signatures, their compiled summary, the table-match predicate, and the per-table
//! plan builder — the heart of this crate.

use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::archetype::ArchetypeId;
use crate::entity::{Entity, INVALID_ENTITY};
use crate::error::{EcsError, Result};
use crate::types::{self, Type};
use crate::world::WorldContext;

/// Where a signature term draws its component from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromKind {
    /// The matched entity's own table.
    Self_,
    /// Like `Self_`, but never satisfied through prefab inheritance.
    Owned,
    /// Satisfied only through prefab inheritance, never directly owned.
    Shared,
    /// A `CHILD_OF` parent's table.
    Container,
    /// A specific entity named in the term itself.
    EntitySrc,
    /// The query's associated system entity.
    System,
    /// No component at all — a handle-only term.
    Empty,
    /// Like `Container`, but its column index is recorded for downstream ordering.
    Cascade,
}

/// How a term's truth value combines with the rest of the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    And,
    Or,
    Optional,
    Not,
}

/// A term's payload: a single component, or (for `Or`) a whole type to search for any
/// member of.
#[derive(Debug, Clone, Copy)]
pub enum Payload {
    Component(Entity),
    Type(Type),
}

impl Payload {
    fn as_component(&self) -> Option<Entity> {
        match self {
            Payload::Component(e) => Some(*e),
            Payload::Type(_) => None,
        }
    }

    fn as_type(&self) -> Option<Type> {
        match self {
            Payload::Type(t) => Some(*t),
            Payload::Component(_) => None,
        }
    }
}

/// One term of a query.
#[derive(Debug, Clone, Copy)]
pub struct SignatureColumn {
    pub from: FromKind,
    pub op: OpKind,
    pub payload: Payload,
    /// Only meaningful when `from == FromKind::EntitySrc`.
    pub source: Option<Entity>,
}

impl SignatureColumn {
    pub fn new(from: FromKind, op: OpKind, payload: Payload) -> Self {
        Self {
            from,
            op,
            payload,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Entity) -> Self {
        self.source = Some(source);
        self
    }
}

/// A compiled query expression: an ordered list of terms.
///
/// Constructed programmatically by the caller; this crate never parses a textual
/// query DSL.
#[derive(Debug, Clone, Default)]
pub struct Signature(pub Vec<SignatureColumn>);

impl Signature {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, column: SignatureColumn) -> &mut Self {
        self.0.push(column);
        self
    }
}

/// The per-column outcome of matching a table against a signature: a tri-state
/// encoding of where column `c`'s data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPlan {
    /// Stored directly in this table at the given zero-based column index.
    Direct(u32),
    /// A tag, an `Empty` handle-only term, or a missing `Optional`.
    Tag,
    /// Resolved indirectly through `references[_]`.
    Ref(u32),
}

impl ColumnPlan {
    /// The `i32` tri-state encoding used at the public/property-test boundary:
    /// `>0` direct (offset is value − 1), `0` tag, `<0` reference
    /// (`references[-(value) - 1]`).
    pub fn as_i32(self) -> i32 {
        match self {
            ColumnPlan::Direct(idx) => idx as i32 + 1,
            ColumnPlan::Tag => 0,
            ColumnPlan::Ref(idx) => -(idx as i32) - 1,
        }
    }
}

/// A plan entry naming an external entity a column's data must be fetched from.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub entity: Entity,
    pub component: Entity,
    pub cached_ptr: Option<NonNull<u8>>,
    /// The owning archetype's generation at the time `cached_ptr` was resolved; used
    /// to detect that the column has since reallocated and the pointer must be
    /// re-fetched via `WorldContext::get_ptr`.
    pub cached_generation: u64,
}

/// The record of one table matching a query.
#[derive(Debug, Clone)]
pub struct MatchedTable {
    pub archetype: ArchetypeId,
    pub columns: Vec<ColumnPlan>,
    pub components: Vec<Option<Entity>>,
    pub references: Vec<Reference>,
}

/// Per-kind accumulators produced once from a [`Signature`] by [`Query::postprocess`],
/// used to reject non-matching tables cheaply without re-walking every term.
#[derive(Debug, Clone, Default)]
pub struct QuerySummary {
    pub and_from_self: SmallVec<[Entity; 4]>,
    pub and_from_owned: SmallVec<[Entity; 4]>,
    pub and_from_shared: SmallVec<[Entity; 4]>,
    pub and_from_system: SmallVec<[Entity; 4]>,
    pub not_from_self: SmallVec<[Entity; 4]>,
    pub not_from_owned: SmallVec<[Entity; 4]>,
    pub not_from_shared: SmallVec<[Entity; 4]>,
    pub not_from_component: SmallVec<[Entity; 4]>,
    /// 1-based index of the last `Cascade` term, or `0` if there is none.
    pub cascade_by: usize,
}

/// A live query: its signature, compiled summary, and the tables it currently
/// matches.
pub struct Query {
    signature: Signature,
    summary: QuerySummary,
    system: Option<Entity>,
    disabled_tag: Entity,
    prefab_tag: Entity,
    match_disabled: bool,
    match_prefabs: bool,
    has_refs: bool,
    matched: Vec<MatchedTable>,
    matched_archetypes: std::collections::HashSet<ArchetypeId>,
}

impl Query {
    pub fn new(signature: Signature) -> Self {
        let mut query = Self {
            signature,
            summary: QuerySummary::default(),
            system: None,
            disabled_tag: INVALID_ENTITY,
            prefab_tag: INVALID_ENTITY,
            match_disabled: false,
            match_prefabs: false,
            has_refs: false,
            matched: Vec::new(),
            matched_archetypes: std::collections::HashSet::new(),
        };
        query.postprocess();
        query
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn summary(&self) -> &QuerySummary {
        &self.summary
    }

    pub fn has_refs(&self) -> bool {
        self.has_refs
    }

    pub fn matched_tables(&self) -> &[MatchedTable] {
        &self.matched
    }

    pub fn set_system(&mut self, system: Entity) {
        self.system = Some(system);
    }

    pub fn set_reserved_tags(&mut self, disabled_tag: Entity, prefab_tag: Entity) {
        self.disabled_tag = disabled_tag;
        self.prefab_tag = prefab_tag;
    }

    pub fn match_disabled(&mut self, yes: bool) {
        self.match_disabled = yes;
    }

    pub fn match_prefabs(&mut self, yes: bool) {
        self.match_prefabs = yes;
    }

    /// Reduce the signature into [`QuerySummary`] accumulators. Run once at
    /// construction.
    fn postprocess(&mut self) {
        let mut cascade_by = 0usize;
        for (i, column) in self.signature.0.iter().enumerate() {
            match (column.op, column.from) {
                (OpKind::And, FromKind::Self_) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.and_from_self.push(c);
                    }
                }
                (OpKind::And, FromKind::Owned) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.and_from_owned.push(c);
                    }
                }
                (OpKind::And, FromKind::Shared) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.and_from_shared.push(c);
                    }
                }
                (OpKind::And, FromKind::System) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.and_from_system.push(c);
                    }
                }
                (OpKind::Not, FromKind::Self_) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.not_from_self.push(c);
                    }
                }
                (OpKind::Not, FromKind::Owned) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.not_from_owned.push(c);
                    }
                }
                (OpKind::Not, FromKind::Shared) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.not_from_shared.push(c);
                    }
                }
                (OpKind::Not, FromKind::Container) => {
                    if let Some(c) = column.payload.as_component() {
                        self.summary.not_from_component.push(c);
                    }
                }
                _ => {}
            }
            if matches!(column.from, FromKind::Cascade) {
                // 1-based; "last wins" when more than one Cascade term is present.
                cascade_by = i + 1;
            }
        }
        self.summary.cascade_by = cascade_by;
    }

    /// Does `table_type` satisfy this query? Checks run in cheapest-reject order.
    pub fn match_table(&self, ctx: &impl WorldContext, table_type: Type) -> bool {
        // 1. Disabled / prefab filters.
        if !self.match_disabled
            && !self.disabled_tag.is_invalid()
            && types::index_of(table_type, self.disabled_tag).is_some()
        {
            return false;
        }
        if !self.match_prefabs
            && !self.prefab_tag.is_invalid()
            && types::index_of(table_type, self.prefab_tag).is_some()
        {
            return false;
        }

        // 2. AND bulks.
        if !self.summary.and_from_self.is_empty()
            && types::contains(ctx, table_type, &self.summary.and_from_self, true, true).is_none()
        {
            return false;
        }
        if !self.summary.and_from_owned.is_empty()
            && types::contains(ctx, table_type, &self.summary.and_from_owned, true, false)
                .is_none()
        {
            return false;
        }
        if !self.summary.and_from_shared.is_empty() {
            let owned =
                types::contains(ctx, table_type, &self.summary.and_from_shared, true, false)
                    .is_some();
            let inheritable =
                types::contains(ctx, table_type, &self.summary.and_from_shared, true, true)
                    .is_some();
            if owned || !inheritable {
                return false;
            }
        }

        // 3. NOT bulks.
        if !self.summary.not_from_self.is_empty()
            && types::contains(ctx, table_type, &self.summary.not_from_self, false, true)
                .is_some()
        {
            return false;
        }
        if !self.summary.not_from_owned.is_empty()
            && types::contains(ctx, table_type, &self.summary.not_from_owned, false, false)
                .is_some()
        {
            return false;
        }
        if !self.summary.not_from_shared.is_empty() {
            let owned =
                types::contains(ctx, table_type, &self.summary.not_from_shared, false, false)
                    .is_some();
            let inheritable =
                types::contains(ctx, table_type, &self.summary.not_from_shared, false, true)
                    .is_some();
            if !owned && inheritable {
                return false;
            }
        }
        if !self.summary.not_from_component.is_empty()
            && types::components_contains(
                ctx,
                table_type,
                &self.summary.not_from_component,
                false,
            )
            .is_some()
        {
            return false;
        }

        // 4. Per-term checks for constructs the summary does not cover.
        for column in &self.signature.0 {
            let ok = match (column.op, column.from) {
                (OpKind::And, FromKind::Container) => column
                    .payload
                    .as_component()
                    .map(|c| {
                        types::components_contains(ctx, table_type, std::slice::from_ref(&c), true)
                            .is_some()
                    })
                    .unwrap_or(true),
                (OpKind::And, FromKind::EntitySrc) => match (column.payload.as_component(), column.source) {
                    (Some(c), Some(source)) => ctx
                        .get_type(source)
                        .is_some_and(|t| types::index_of(t, c).is_some()),
                    _ => false,
                },
                (OpKind::Or, FromKind::Self_) => column
                    .payload
                    .as_type()
                    .map(|t| types::contains(ctx, table_type, &t, false, true).is_some())
                    .unwrap_or(true),
                (OpKind::Or, FromKind::Container) => column
                    .payload
                    .as_type()
                    .map(|t| {
                        types::components_contains(ctx, table_type, &t, false).is_some()
                    })
                    .unwrap_or(true),
                (OpKind::Not, FromKind::EntitySrc) => match (column.payload.as_component(), column.source) {
                    (Some(c), Some(source)) => ctx
                        .get_type(source)
                        .is_none_or(|t| types::index_of(t, c).is_none()),
                    _ => true,
                },
                _ => true,
            };
            if !ok {
                return false;
            }
        }

        true
    }

    /// Build the per-column plan for a table already known to match, appending it to
    /// the matched-tables list. Returns `Ok(false)` if `archetype` is already present
    /// (queries never hold a table twice).
    pub fn add_table(
        &mut self,
        ctx: &mut impl WorldContext,
        archetype: ArchetypeId,
        table_type: Type,
    ) -> Result<bool> {
        if !self.match_table(ctx, table_type) {
            return Ok(false);
        }
        if !self.matched_archetypes.insert(archetype) {
            return Ok(false);
        }

        let mut columns = Vec::with_capacity(self.signature.0.len());
        let mut components = Vec::with_capacity(self.signature.0.len());
        let mut references = Vec::new();

        for column in self.signature.0.clone().iter() {
            let is_cascade = matches!(column.from, FromKind::Cascade);
            let mut component = column.payload.as_component();
            let mut entity: Option<Entity> = None;

            match (column.from, column.op) {
                (FromKind::Empty, _) => {
                    columns.push(ColumnPlan::Tag);
                    components.push(None);
                    continue;
                }
                (from, OpKind::Not) => {
                    // `source` is only meaningful for `EntitySrc`; a Not term that sets
                    // it anywhere else is a malformed signature, not a benign negative.
                    if column.source.is_some() && from != FromKind::EntitySrc {
                        return Err(EcsError::InvalidRelationSource);
                    }
                    // A `Not` term is satisfied by the component's absence (checked by
                    // `match_table` before this ever runs); it never owns data to route
                    // to, so it always collapses to a handle-only entry.
                    columns.push(ColumnPlan::Tag);
                    components.push(component);
                    continue;
                }
                (FromKind::Self_, OpKind::Or) => {
                    component = column
                        .payload
                        .as_type()
                        .and_then(|t| types::contains(ctx, table_type, &t, false, true));
                }
                (FromKind::Container, OpKind::Or) => {
                    if let Some((witness, parent)) = column
                        .payload
                        .as_type()
                        .and_then(|t| types::components_contains(ctx, table_type, &t, false))
                    {
                        component = Some(witness);
                        entity = Some(parent);
                    }
                }
                (FromKind::Container, _) | (FromKind::Cascade, _) => {
                    if let Some(c) = component {
                        entity = types::components_contains(ctx, table_type, std::slice::from_ref(&c), true)
                            .map(|(_, parent)| parent);
                    }
                }
                (FromKind::EntitySrc, _) => {
                    entity = column.source;
                }
                (FromKind::System, _) => {
                    entity = self.system;
                }
                _ => {}
            }

            let mut plan = ColumnPlan::Tag;
            if entity.is_none() {
                if let Some(c) = component {
                    let is_tag = ctx.component_size(c).is_none_or(|size| size == 0);
                    match types::index_of(table_type, c) {
                        Some(idx) if !is_tag => plan = ColumnPlan::Direct(idx as u32),
                        Some(_) => plan = ColumnPlan::Tag,
                        None => plan = ColumnPlan::Ref(u32::MAX), // placeholder, resolved below
                    }
                }
            }

            // Optional collapse: a missing Optional component never becomes a
            // reference, it is simply absent.
            if matches!(column.op, OpKind::Optional)
                && entity.is_none()
                && component.is_some_and(|c| types::index_of(table_type, c).is_none())
            {
                columns.push(ColumnPlan::Tag);
                components.push(component);
                continue;
            }

            let needs_reference =
                entity.is_some() || matches!(plan, ColumnPlan::Ref(_)) || is_cascade;

            if needs_reference {
                if let Some(c) = component {
                    let sized = !ctx.component_size(c).is_none_or(|size| size == 0);
                    if sized {
                        let owner = if matches!(column.from, FromKind::EntitySrc | FromKind::Cascade)
                        {
                            entity
                        } else {
                            types::find_owning_entity(ctx, entity, table_type, c)
                        };
                        let owner = match owner {
                            Some(o) => o,
                            None if is_cascade => INVALID_ENTITY,
                            None => return Err(EcsError::DanglingReference),
                        };

                        let record = if owner.is_invalid() {
                            None
                        } else {
                            ctx.get_record(owner)
                        };
                        let cached_ptr = record
                            .and_then(|r| ctx.archetypes().get(r.archetype).map(|a| (a, r.row)))
                            .and_then(|(a, row)| a.get_ptr(c, row));
                        let cached_generation = record
                            .and_then(|r| ctx.archetypes().get(r.archetype))
                            .map(|a| a.generation())
                            .unwrap_or(0);

                        if !owner.is_invalid() {
                            ctx.set_watch(owner);
                        }

                        references.push(Reference {
                            entity: owner,
                            component: c,
                            cached_ptr,
                            cached_generation,
                        });
                        plan = ColumnPlan::Ref((references.len() - 1) as u32);
                        self.has_refs = true;
                    } else {
                        plan = ColumnPlan::Tag;
                    }
                }
            }

            columns.push(plan);
            components.push(component);
        }

        self.matched.push(MatchedTable {
            archetype,
            columns,
            components,
            references,
        });
        Ok(true)
    }
}
