//! Crate-level behaviour tests and shared test doubles.

pub(crate) mod support;
