// Core notify module - operator escalation with retry.

pub mod operator_notifier;

pub use operator_notifier::*;
