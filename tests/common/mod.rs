//! Shared test utilities for feedtally integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. The fake store runs in-process, so harnesses need no
//! network beyond loopback.

pub mod assertions;
pub mod builders;
pub mod fake_store;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fake_store::FakeStore;
pub use fixtures::*;
