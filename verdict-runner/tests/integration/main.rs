// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that spawn a shell standing in for the PHP test runner.

#![cfg(unix)]

mod basic;
mod fixtures;
