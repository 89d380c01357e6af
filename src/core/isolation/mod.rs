// Core isolation module - role stripping, restoring and rejoin handling.

pub mod isolation_models;
pub mod isolation_service;

pub use isolation_models::*;
pub use isolation_service::*;
