//! Viewing and changing the engine connection at runtime.

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::context::{ConnectionUpdate, ServerContext};

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get-connection-settings",
        category: "connection",
        description: "Get current Meilisearch connection settings",
        fields: &[],
        handler: get_connection_settings,
    },
    OperationSpec {
        name: "update-connection-settings",
        category: "connection",
        description: "Update Meilisearch connection settings",
        fields: &[
            FieldSpec::optional("url", ArgType::String, "New Meilisearch server URL"),
            FieldSpec::optional(
                "api_key",
                ArgType::String,
                "New API key for authentication; an empty string clears it",
            ),
        ],
        handler: update_connection_settings,
    },
];

fn get_connection_settings(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let settings = ctx.connection_settings().await;
        Ok(OperationPayload::new(
            format!("Current connection settings:\n{}", settings),
            serde_json::to_value(&settings)?,
        ))
    })
}

fn update_connection_settings(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let update = ConnectionUpdate {
            url: args.str("url").map(str::to_string),
            api_key: args.str("api_key").map(str::to_string),
        };
        let settings = ctx.update_connection_settings(update).await?;
        Ok(OperationPayload::new(
            format!("Successfully updated connection settings to URL: {}", settings.url),
            serde_json::to_value(&settings)?,
        ))
    })
}
