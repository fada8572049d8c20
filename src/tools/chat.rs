//! Conversational search through chat workspaces.

use serde_json::{Value, json};

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::chat::DEFAULT_CHAT_MODEL;
use crate::client::{ChatMessage, Pagination};
use crate::context::ServerContext;
use crate::{Error, Result};

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "create-chat-completion",
        category: "chat",
        description: "Create a conversational chat completion using Meilisearch's chat feature",
        fields: &[
            FieldSpec::required("workspace_uid", ArgType::String, "Unique identifier of the chat workspace"),
            FieldSpec::required(
                "messages",
                ArgType::ObjectList,
                "Chat history as [{\"role\": \"user\", \"content\": \"...\"}]",
            ),
            FieldSpec::optional("model", ArgType::String, "Model to use (default: gpt-3.5-turbo)"),
            FieldSpec::optional("stream", ArgType::Boolean, "Stream the response (default: true)"),
        ],
        handler: create_chat_completion,
    },
    OperationSpec {
        name: "get-chat-workspaces",
        category: "chat",
        description: "Get list of available chat workspaces",
        fields: &[
            FieldSpec::optional("offset", ArgType::Integer, "Number of workspaces to skip"),
            FieldSpec::optional("limit", ArgType::Integer, "Maximum number of workspaces to return"),
        ],
        handler: get_chat_workspaces,
    },
    OperationSpec {
        name: "get-chat-workspace-settings",
        category: "chat",
        description: "Get settings for a specific chat workspace",
        fields: &[FieldSpec::required(
            "workspace_uid",
            ArgType::String,
            "Unique identifier of the chat workspace",
        )],
        handler: get_chat_workspace_settings,
    },
    OperationSpec {
        name: "update-chat-workspace-settings",
        category: "chat",
        description: "Update settings for a specific chat workspace",
        fields: &[
            FieldSpec::required("workspace_uid", ArgType::String, "Unique identifier of the chat workspace"),
            FieldSpec::required("settings", ArgType::Object, "Settings to update for the workspace"),
        ],
        handler: update_chat_workspace_settings,
    },
];

fn messages(values: &[Value]) -> Result<Vec<ChatMessage>> {
    values
        .iter()
        .map(|value| {
            value
                .as_object()
                .ok_or_else(|| Error::invalid_arguments("each message must be an object"))
                .and_then(ChatMessage::from_object)
        })
        .collect()
}

fn create_chat_completion(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let workspace = args.require_str("workspace_uid")?;
        let messages = messages(args.require_objects("messages")?)?;
        let model = args.str("model").unwrap_or(DEFAULT_CHAT_MODEL);
        let stream = args.bool("stream").unwrap_or(true);

        let reply = ctx
            .chat_client()
            .await?
            .completion(workspace, model, &messages, stream)
            .await?;
        Ok(OperationPayload::new(
            format!("Chat completion response:\n{}", reply),
            json!({ "workspace": workspace, "model": model, "content": reply }),
        ))
    })
}

fn get_chat_workspaces(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let page = Pagination::new(args.u64("offset"), args.u64("limit"));
        let workspaces = ctx.chat_client().await?.workspaces(page).await?;
        Ok(OperationPayload::new("Chat workspaces:", workspaces))
    })
}

fn get_chat_workspace_settings(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let workspace = args.require_str("workspace_uid")?;
        let settings = ctx.chat_client().await?.workspace_settings(workspace).await?;
        Ok(OperationPayload::new(
            format!("Workspace settings for '{}':", workspace),
            settings,
        ))
    })
}

fn update_chat_workspace_settings(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let workspace = args.require_str("workspace_uid")?;
        let settings = args.require_object("settings")?;
        let updated = ctx
            .chat_client()
            .await?
            .update_workspace_settings(workspace, settings)
            .await?;
        Ok(OperationPayload::new(
            format!("Updated workspace settings for '{}':", workspace),
            updated,
        ))
    })
}
