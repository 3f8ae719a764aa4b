pub use super::issued_version::Entity as IssuedVersion;
pub use super::rollback_migration::Entity as RollbackMigration;
pub use super::schema_migration::Entity as SchemaMigration;
