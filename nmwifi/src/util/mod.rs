//! Internal helpers.

#[macro_use]
pub(crate) mod utils;
