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

//! Relation-edge bookkeeping: `CHILD_OF` (container) and `INSTANCE_OF` (prefab) links
//! are embedded directly as flagged elements inside an entity's [`crate::types::Type`]
//! rather than stored as separate components. This module guards the one invariant
//! `World` owns at the edge-introduction boundary: the inheritance/containment graph
//! never gets a cycle.
//!
//! The lookups that *consume* these edges once they exist (`find_owning_entity`,
//! `components_contains`) live in [`crate::types`] next to the rest of the type
//! algebra they are built from.

use crate::entity::Entity;
use crate::world::WorldContext;

/// Would adding a `CHILD_OF`/`INSTANCE_OF` edge from `child` to `target` close a cycle?
///
/// Walks every relation element reachable from `target`'s own type; if `child` is ever
/// reached, the new edge would make `child` its own (possibly indirect) ancestor.
pub fn would_cycle(ctx: &impl WorldContext, child: Entity, target: Entity) -> bool {
    if child == target {
        return true;
    }
    let mut frontier = vec![target];
    let mut seen = std::collections::HashSet::new();
    while let Some(candidate) = frontier.pop() {
        if !seen.insert(candidate) {
            continue;
        }
        if candidate == child {
            return true;
        }
        if let Some(type_) = ctx.get_type(candidate) {
            frontier.extend(
                type_
                    .as_slice()
                    .iter()
                    .filter(|e| e.is_relation())
                    .map(|e| e.target()),
            );
        }
    }
    false
}

/// A table may carry at most one `INSTANCE_OF` element whose target is itself tagged
/// `Prefab`. Returns `true` if `type_` already has one.
pub fn has_prefab_marker(
    ctx: &impl WorldContext,
    type_: crate::types::Type,
    prefab_tag: Entity,
) -> bool {
    type_
        .as_slice()
        .iter()
        .filter(|e| e.is_instance_of())
        .any(|e| ctx.has(e.target(), prefab_tag))
}
