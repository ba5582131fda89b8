//! Detection and remediation of the `vaccine`/`leukocyte` Maya script worm.
//!
//! The worm rewrites `userSetup.py`, plants self-replicating script nodes in
//! `.ma`/`.mb` scenes and registers script jobs that re-infect every scene
//! opened afterwards. This crate finds those artifacts and removes them,
//! snapshotting every file before it is touched. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (signatures, text classification,
//!   job parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, backups, configuration,
//!   scene runtimes, reporting).
//!
//! Orchestration modules ([`engine`], [`text`], [`scene`], [`modes`]) combine
//! core logic with I/O to implement the CLI commands. Every outcome is
//! recorded in the [`ledger`].

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod ledger;
pub mod logging;
pub mod modes;
pub mod scene;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod text;
