pub mod sqlite_permission_store;

pub use sqlite_permission_store::SqlitePermissionStore;
