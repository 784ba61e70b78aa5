// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by the collision system.

use thiserror::Error;

use crate::types::BodyHandle;

/// Errors from [`System`](crate::System) mutators that target a specific body.
///
/// Lookups and queries report "nothing there" with `Option` or an empty
/// result instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The handle's body was removed, or the handle came from another system.
    #[error("body handle {0:?} does not refer to a live body")]
    StaleHandle(BodyHandle),
}
