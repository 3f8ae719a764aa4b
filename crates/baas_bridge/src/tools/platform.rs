//! 部署平台的转发操作

use std::str::FromStr;

use serde_json::{json, Value};

use super::{optional_u64, required_str, ToolContext, ToolDefinition, ToolError, ToolResponse, ToolResult};
use crate::platform::LifecycleAction;

fn uuid_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "uuid": { "type": "string", "description": "Application uuid" }
        },
        "required": ["uuid"],
        "additionalProperties": false
    })
}

pub fn get_platform_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_applications",
            description: "List applications on the deployment platform",
            input_schema: json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        },
        ToolDefinition {
            name: "get_application",
            description: "Get details of an application",
            input_schema: uuid_schema(),
        },
        ToolDefinition {
            name: "start_application",
            description: "Start (deploy) an application",
            input_schema: uuid_schema(),
        },
        ToolDefinition {
            name: "stop_application",
            description: "Stop an application",
            input_schema: uuid_schema(),
        },
        ToolDefinition {
            name: "restart_application",
            description: "Restart an application",
            input_schema: uuid_schema(),
        },
        ToolDefinition {
            name: "get_application_logs",
            description: "Get the most recent log lines of an application",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "uuid": { "type": "string", "description": "Application uuid" },
                    "lines": { "type": "integer", "minimum": 1, "description": "Number of lines, default 100" }
                },
                "required": ["uuid"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_application_envs",
            description: "List environment variables of an application",
            input_schema: uuid_schema(),
        },
        ToolDefinition {
            name: "update_application_env",
            description: "Update one environment variable of an application; takes effect on next deploy",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "uuid": { "type": "string", "description": "Application uuid" },
                    "key": { "type": "string" },
                    "value": { "type": "string" }
                },
                "required": ["uuid", "key", "value"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_services",
            description: "List services on the deployment platform",
            input_schema: json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        },
    ]
}

pub async fn list_applications(ctx: &ToolContext) -> ToolResult {
    let applications = ctx.platform()?.list_applications().await?;
    let message = format!("Found {} applications", applications.len());
    Ok(ToolResponse::ok(json!({ "applications": applications }), message))
}

pub async fn get_application(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let uuid = required_str(args, "uuid")?;
    let application = ctx.platform()?.get_application(uuid).await?;
    Ok(ToolResponse::ok(application, format!("Application {} retrieved", uuid)))
}

/// `start_application` / `stop_application` / `restart_application`
pub async fn application_lifecycle(tool: &str, args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let action = lifecycle_action(tool)?;
    let uuid = required_str(args, "uuid")?;
    let result = ctx.platform()?.application_lifecycle(uuid, action).await?;
    Ok(ToolResponse::ok(result, format!("Application {} {} requested", uuid, action)))
}

fn lifecycle_action(tool: &str) -> Result<LifecycleAction, ToolError> {
    tool.strip_suffix("_application")
        .and_then(|action| LifecycleAction::from_str(action).ok())
        .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))
}

pub async fn get_application_logs(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let uuid = required_str(args, "uuid")?;
    let lines = match optional_u64(args, "lines")? {
        None => None,
        Some(0) => return Err(ToolError::InvalidArguments("lines must be at least 1".to_string())),
        Some(n) => Some(u32::try_from(n).map_err(|_| ToolError::InvalidArguments(format!("lines {} is too large", n)))?),
    };
    let logs = ctx.platform()?.get_application_logs(uuid, lines).await?;
    Ok(ToolResponse::ok(logs, format!("Logs of application {} retrieved", uuid)))
}

pub async fn list_application_envs(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let uuid = required_str(args, "uuid")?;
    let envs = ctx.platform()?.list_application_envs(uuid).await?;
    Ok(ToolResponse::ok(envs, format!("Environment of application {} retrieved", uuid)))
}

pub async fn update_application_env(args: &Option<Value>, ctx: &ToolContext) -> ToolResult {
    let uuid = required_str(args, "uuid")?;
    let key = required_str(args, "key")?;
    let value = required_str(args, "value")?;
    let result = ctx.platform()?.update_application_env(uuid, key, value).await?;
    Ok(ToolResponse::ok(result, format!("Variable {} of application {} updated", key, uuid)))
}

pub async fn list_services(ctx: &ToolContext) -> ToolResult {
    let services = ctx.platform()?.list_services().await?;
    Ok(ToolResponse::ok(services, "Services retrieved"))
}
