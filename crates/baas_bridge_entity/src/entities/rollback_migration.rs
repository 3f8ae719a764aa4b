use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 回滚账本，保存通过可回滚路径创建的迁移的 down SQL
///
/// 迁移被回滚后此处的记录仍然保留，用于审计和重放。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rollback_migrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub version: String,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub down_sql: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
