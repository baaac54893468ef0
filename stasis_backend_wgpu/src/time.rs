// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clock reads.

use std::sync::OnceLock;
use std::time::Instant;

use stasis_core::time::HostTime;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Returns the current monotonic host time in nanoseconds since the first
/// call in this process.
#[must_use]
pub fn now() -> HostTime {
    let epoch = *EPOCH.get_or_init(Instant::now);
    let nanos = Instant::now().saturating_duration_since(epoch).as_nanos();
    HostTime(u64::try_from(nanos).unwrap_or(u64::MAX))
}
