//! 迁移版本与回滚相关的操作

use serde_json::{json, Value};

use super::{optional_str, required_str, required_u64, ToolContext, ToolDefinition, ToolResponse, ToolResult};
use crate::migrate::BulkRollback;

pub fn get_migration_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_migration",
            description: "Apply a forward-only schema migration and record it in the migration history",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Human readable migration name" },
                    "sql": { "type": "string", "description": "Forward SQL to apply" }
                },
                "required": ["name", "sql"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_reversible_migration",
            description: "Apply a schema migration and store its down SQL for later rollback",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Human readable migration name" },
                    "up_sql": { "type": "string", "description": "Forward SQL to apply" },
                    "down_sql": { "type": "string", "description": "SQL that undoes the forward SQL" }
                },
                "required": ["name", "up_sql", "down_sql"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_migrations",
            description: "List all recorded migrations, newest first",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_migration_status",
            description: "Get the recorded status of a single migration",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "version": { "type": "string", "description": "Migration version (YYYYMMDDHHMMSS)" }
                },
                "required": ["version"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "rollback_migration",
            description: "Roll back one migration; runs down_sql when given, otherwise only removes the history row",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "version": { "type": "string", "description": "Migration version (YYYYMMDDHHMMSS)" },
                    "down_sql": { "type": "string", "description": "Optional SQL that undoes the migration" }
                },
                "required": ["version"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "rollback_migration_with_stored_down",
            description: "Roll back one migration using the down SQL stored when it was created",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "version": { "type": "string", "description": "Migration version (YYYYMMDDHHMMSS)" }
                },
                "required": ["version"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "rollback_to_version",
            description: "Remove every migration newer than the target version from the history (no SQL is run)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "target_version": { "type": "string", "description": "Version to keep as the newest" }
                },
                "required": ["target_version"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "rollback_last_n",
            description: "Remove the newest N migrations from the history (no SQL is run)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer", "minimum": 1, "description": "Number of migrations to roll back" }
                },
                "required": ["count"],
                "additionalProperties": false
            }),
        },
    ]
}

pub async fn create_migration(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let name = required_str(args, "name")?;
    let sql = required_str(args, "sql")?;
    let migration = ctx.engine.create_forward_only(name, sql).await?;
    let message = format!("Migration {} applied", migration.version);
    Ok(ToolResponse::ok(serde_json::to_value(&migration)?, message))
}

pub async fn create_reversible_migration(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let name = required_str(args, "name")?;
    let up_sql = required_str(args, "up_sql")?;
    let down_sql = required_str(args, "down_sql")?;
    let migration = ctx.engine.create_reversible(name, up_sql, down_sql).await?;
    let message = format!("Migration {} applied with stored down SQL", migration.version);
    Ok(ToolResponse::ok(serde_json::to_value(&migration)?, message))
}

pub async fn list_migrations(ctx: &ToolContext) -> ToolResult {
    let migrations = ctx.engine.list_migrations().await?;
    let message = format!("Found {} migrations", migrations.len());
    Ok(ToolResponse::ok(json!({ "migrations": migrations }), message))
}

pub async fn get_migration_status(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let version = required_str(args, "version")?;
    let migration = ctx.engine.get_status(version).await?;
    let message = format!("Migration {} is {}", migration.version, migration.status);
    Ok(ToolResponse::ok(serde_json::to_value(&migration)?, message))
}

pub async fn rollback_migration(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let version = required_str(args, "version")?;
    let down_sql = optional_str(args, "down_sql")?;
    let outcome = ctx.engine.rollback_migration(version, down_sql).await?;
    let message = format!("Migration {} rolled back", outcome.version);
    Ok(ToolResponse::ok(serde_json::to_value(&outcome)?, message))
}

pub async fn rollback_migration_with_stored_down(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let version = required_str(args, "version")?;
    let outcome = ctx.engine.rollback_migration_with_stored_down(version).await?;
    let message = format!("Migration {} rolled back with stored down SQL", outcome.version);
    Ok(ToolResponse::ok(serde_json::to_value(&outcome)?, message))
}

pub async fn rollback_to_version(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let target = required_str(args, "target_version")?;
    let bulk = ctx.engine.rollback_to_version(target).await?;
    bulk_response(bulk)
}

pub async fn rollback_last_n(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let count = required_u64(args, "count")?;
    let bulk = ctx.engine.rollback_last_n(count).await?;
    bulk_response(bulk)
}

/// 批量回滚中途失败时 `success` 为 false，但仍返回已回滚的版本
fn bulk_response(bulk: BulkRollback) -> ToolResult {
    let data = serde_json::to_value(&bulk)?;
    match &bulk.failure {
        None => {
            let message = format!("Rolled back {} migrations", bulk.rolled_back.len());
            Ok(ToolResponse::ok(data, message))
        }
        Some(e) => {
            let mut response = ToolResponse::failure(e.to_string(), Some(data));
            response.message = Some(format!(
                "Rolled back {} migrations before failing",
                bulk.rolled_back.len()
            ));
            Ok(response)
        }
    }
}
