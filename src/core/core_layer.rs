// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "permissions/mod.rs"]
pub mod permissions;

#[path = "isolation/mod.rs"]
pub mod isolation;

#[path = "modlog/mod.rs"]
pub mod modlog;

#[path = "notify/mod.rs"]
pub mod notify;
