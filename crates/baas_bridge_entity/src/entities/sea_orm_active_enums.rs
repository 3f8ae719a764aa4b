use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 迁移状态
///
/// `Pending -> Applied` 表示执行成功，`Pending -> Failed` 表示执行出错；
/// 已应用的迁移只能通过回滚（删除历史行）离开 `Applied`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MigrationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "applied")]
    Applied,
    #[sea_orm(string_value = "failed")]
    Failed,
}
