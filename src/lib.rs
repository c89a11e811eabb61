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

//! Archetype ECS query-matching core.
//!
//! Given a declarative query signature, this crate maintains the set of archetype
//! tables that satisfy it and, for each, a per-column access plan: a direct column
//! offset, a tag marker, or a reference into a component owned by another entity
//! (prefab ancestor, container parent, explicit entity, system singleton).

pub mod archetype;
pub mod bitset;
pub mod component;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod query;
pub mod registry;
pub mod types;
pub mod world;

#[cfg(feature = "profiling")]
pub mod profiling;

pub mod prelude;

pub use archetype::{Archetype, ArchetypeId, ComponentColumn};
pub use component::{ComponentRecord, ComponentRegistry};
pub use entity::{Entity, EntityAllocator, EntityRecord};
pub use error::{EcsError, Result};
pub use query::{
    ColumnPlan, FromKind, MatchedTable, OpKind, Payload, Query, Reference, Signature,
    SignatureColumn,
};
pub use registry::{QueryId, Registry};
pub use types::{Type, TypeStore};
pub use world::{World, WorldContext};
