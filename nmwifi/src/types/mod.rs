//! Shared types and constants.

pub(crate) mod constants;
