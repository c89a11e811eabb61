//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_query_core::prelude::*;
//! ```

pub use crate::archetype::{Archetype, ArchetypeId, ComponentColumn};
pub use crate::component::{ComponentRecord, ComponentRegistry};
pub use crate::entity::{Entity, EntityAllocator, EntityRecord, CHILD_OF_FLAG, INSTANCE_OF_FLAG};
pub use crate::error::{EcsError, Result};
pub use crate::query::{
    ColumnPlan, FromKind, MatchedTable, OpKind, Payload, Query, Reference, Signature,
    SignatureColumn,
};
pub use crate::registry::{QueryId, Registry};
pub use crate::types::{Type, TypeStore};
pub use crate::world::{World, WorldContext};

#[cfg(feature = "profiling")]
pub use crate::profiling::init_tracing;
