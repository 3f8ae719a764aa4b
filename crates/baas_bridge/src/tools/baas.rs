//! BaaS 实例与其命令行工具的转发操作

use std::str::FromStr;

use serde_json::{json, Value};
use strum::IntoEnumIterator;

use super::{optional_bool, param, required_str, ToolContext, ToolDefinition, ToolError, ToolResponse, ToolResult};
use crate::cli::CliCommand;

pub fn get_baas_tools() -> Vec<ToolDefinition> {
    let cli_commands: Vec<String> = CliCommand::iter().map(|c| c.to_string()).collect();
    vec![
        ToolDefinition {
            name: "execute_sql",
            description: "Run arbitrary SQL through the BaaS SQL endpoint (not recorded as a migration)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL to execute" }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_buckets",
            description: "List storage buckets",
            input_schema: json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        },
        ToolDefinition {
            name: "create_bucket",
            description: "Create a storage bucket",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "Bucket id" },
                    "public": { "type": "boolean", "description": "Whether objects are publicly readable", "default": false }
                },
                "required": ["id"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_bucket",
            description: "Delete an empty storage bucket",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "Bucket id" }
                },
                "required": ["id"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "invoke_edge_function",
            description: "Invoke a deployed edge function with an optional JSON body",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Function name" },
                    "body": { "description": "JSON body passed to the function" }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_auth_settings",
            description: "Get the auth service settings",
            input_schema: json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        },
        ToolDefinition {
            name: "check_health",
            description: "Probe the auth, rest and storage services and report which are up",
            input_schema: json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        },
        ToolDefinition {
            name: "run_cli",
            description: "Run an allow-listed BaaS CLI command and capture its output",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "enum": cli_commands },
                    "args": { "type": "array", "items": { "type": "string" }, "description": "Extra arguments" }
                },
                "required": ["command"],
                "additionalProperties": false
            }),
        },
    ]
}

pub async fn execute_sql(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let query = required_str(args, "query")?;
    let rows = ctx.baas()?.execute_sql(query).await?;
    Ok(ToolResponse::ok(rows, "Query executed"))
}

pub async fn list_buckets(ctx: &ToolContext) -> ToolResult {
    let buckets = ctx.baas()?.list_buckets().await?;
    let message = format!("Found {} buckets", buckets.len());
    Ok(ToolResponse::ok(json!({ "buckets": buckets }), message))
}

pub async fn create_bucket(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let id = required_str(args, "id")?;
    let public = optional_bool(args, "public")?.unwrap_or(false);
    let result = ctx.baas()?.create_bucket(id, public).await?;
    Ok(ToolResponse::ok(result, format!("Bucket {} created", id)))
}

pub async fn delete_bucket(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let id = required_str(args, "id")?;
    let result = ctx.baas()?.delete_bucket(id).await?;
    Ok(ToolResponse::ok(result, format!("Bucket {} deleted", id)))
}

pub async fn invoke_edge_function(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let name = required_str(args, "name")?;
    let body = param(args, "body")?.cloned();
    let result = ctx.baas()?.invoke_edge_function(name, body).await?;
    Ok(ToolResponse::ok(result, format!("Function {} invoked", name)))
}

pub async fn get_auth_settings(ctx: &ToolContext) -> ToolResult {
    let settings = ctx.baas()?.get_auth_settings().await?;
    Ok(ToolResponse::ok(settings, "Auth settings retrieved"))
}

/// 探测结果本身就是数据，部分服务不可用不算调用失败
pub async fn check_health(ctx: &ToolContext) -> ToolResult {
    let report = ctx.baas()?.check_health().await;
    let message = if report.healthy {
        "All services are healthy".to_string()
    } else {
        let down: Vec<&str> = report
            .services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| s.service.as_str())
            .collect();
        format!("Unhealthy services: {}", down.join(", "))
    };
    Ok(ToolResponse::ok(serde_json::to_value(&report)?, message))
}

pub async fn run_cli(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let raw = required_str(args, "command")?;
    let command = CliCommand::from_str(raw)
        .map_err(|_| ToolError::InvalidArguments(format!("command {:?} is not allowed", raw)))?;
    let extra = cli_args(args)?;
    let output = ctx.cli.run(command, &extra).await?;
    let data = serde_json::to_value(&output)?;
    if output.success {
        Ok(ToolResponse::ok(data, format!("{} finished", output.command)))
    } else {
        Ok(ToolResponse::failure(
            format!("{} exited with {:?}", output.command, output.exit_code),
            Some(data),
        ))
    }
}

fn cli_args(args: &Option<Value>) -> Result<Vec<String>, ToolError> {
    match param(args, "args")? {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::InvalidArguments("args must be an array of strings".to_string()))
            })
            .collect(),
        Some(_) => Err(ToolError::InvalidArguments("args must be an array of strings".to_string())),
    }
}
