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

//! Tracing setup for the `profiling` feature.
//!
//! `World::add_component` is instrumented with `#[instrument]`; this module wires a
//! subscriber for hosts that want to collect those spans to a file instead of stdout,
//! following the same non-blocking file-appender setup the teacher's own
//! `bin/profile_spawn.rs` uses for its spawn benchmarks.

use std::fs::File;
use std::path::Path;

use tracing_subscriber::prelude::*;

/// Install a process-global subscriber that writes JSON-formatted spans to `path`
/// through a non-blocking appender. Returns the worker guard; tracing output stops
/// flushing once it is dropped.
pub fn init_tracing(path: impl AsRef<Path>) -> tracing_appender::non_blocking::WorkerGuard {
    let file = File::create(path).expect("failed to create trace output file");
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking),
    );
    tracing::subscriber::set_global_default(subscriber)
        .expect("a global tracing subscriber is already set");
    guard
}
