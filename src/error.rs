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

//! Error types.

use std::fmt;

use crate::entity::Entity;

/// ECS error type.
///
/// Benign negatives — an optional component missing, a container parent without the
/// requested component, a component resolved as a reference rather than a direct
/// column — are not represented here; they are handled locally by producing a tag-like
/// `columns[c] == 0` or a reference entry, and never reach the caller as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// Looked up an entity that is not currently alive.
    EntityNotFound(Entity),

    /// A table's type carries more than one `INSTANCE_OF` element targeting a prefab.
    MultiplePrefabs,

    /// A `Not` term set `source` while `from` was not `EntitySrc`, where `source` is
    /// never read. Also raised when introducing a `CHILD_OF`/`INSTANCE_OF` edge would
    /// close a cycle.
    InvalidRelationSource,

    /// A non-`Cascade` reference resolved to no owning entity.
    DanglingReference,

    /// The entity allocator's 32-bit index space is exhausted.
    OutOfCapacity,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound(entity) => write!(f, "entity not found: {entity:?}"),
            EcsError::MultiplePrefabs => {
                write!(f, "table carries more than one prefab marker")
            }
            EcsError::InvalidRelationSource => {
                write!(f, "Not term has an invalid relation source")
            }
            EcsError::DanglingReference => {
                write!(f, "reference resolved to no owning entity")
            }
            EcsError::OutOfCapacity => write!(f, "entity index space exhausted"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias.
pub type Result<T> = std::result::Result<T, EcsError>;
