// Core permissions module - overrides, guild settings and authorization.

pub mod authorization;
pub mod permission_cache;
pub mod permission_models;
pub mod permission_service;

pub use authorization::*;
pub use permission_models::*;
pub use permission_service::{PermissionError, PermissionService, PermissionStore};
