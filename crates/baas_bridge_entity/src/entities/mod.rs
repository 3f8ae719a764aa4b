pub mod prelude;

pub mod issued_version;
pub mod rollback_migration;
pub mod schema_migration;
pub mod sea_orm_active_enums;
