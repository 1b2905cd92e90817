// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for verdict.
//!
//! Configuration is read from `.config/verdict.toml` in the project root, layered on top of an
//! embedded default config. Settings are grouped into profiles (`[profile.<name>]`); the
//! `default` profile is always present, and other profiles inherit any key they don't set from
//! it.

mod imp;
mod transport;

pub use imp::*;
pub use transport::*;
