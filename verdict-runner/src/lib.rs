// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for verdict: reconciling what a PHP test runner says while it runs with
//! what it reports once it is done.
//!
//! The basic flow of a run is:
//!
//! 1. A [`TestTree`](tree::TestTree) is built from the discovery collaborator's JSON.
//! 2. A [`RunController`](runner::RunController) spawns the runner and feeds its output to the
//!    [`StreamingClassifier`](classifier::StreamingClassifier), which resolves identifiers
//!    through the [`NameIndex`](name_index::NameIndex) into the
//!    [`RunResultTable`](run_table::RunResultTable).
//! 3. After the process exits, the [`Reconciler`](report::Reconciler) applies the JUnit report,
//!    [`fatal_error::extract`] looks for an aborting error, and the
//!    [`Aggregator`](aggregator::Aggregator) folds leaf outcomes into verdicts.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod fatal_error;
pub mod helpers;
pub mod name_index;
pub mod report;
pub mod reporter;
pub mod run_table;
pub mod runner;
pub mod state;
mod time;
pub mod tree;
