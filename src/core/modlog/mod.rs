// Core modlog module - moderator action records and where they are posted.

pub mod modlog_models;
pub mod modlog_service;

pub use modlog_models::*;
pub use modlog_service::*;
