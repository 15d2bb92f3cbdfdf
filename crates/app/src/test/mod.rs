//! Shared test fixtures.

pub(crate) mod helpers;

pub(crate) use context::TestContext;
