pub mod sqlite_role_store;

pub use sqlite_role_store::SqliteRoleStore;
