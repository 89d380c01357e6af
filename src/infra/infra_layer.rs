// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

pub mod database;

#[path = "permissions/mod.rs"]
pub mod permissions;

#[path = "isolation/mod.rs"]
pub mod isolation;
