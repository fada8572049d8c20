use secrecy::SecretString;
use serde_json::json;

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::{CreateKeyRequest, Pagination};
use crate::context::ServerContext;
use crate::security::{preview, redact_message};

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get-keys",
        category: "keys",
        description: "Get list of API keys",
        fields: &[
            FieldSpec::optional("offset", ArgType::Integer, "Number of keys to skip"),
            FieldSpec::optional("limit", ArgType::Integer, "Maximum number of keys to return"),
        ],
        handler: get_keys,
    },
    OperationSpec {
        name: "create-key",
        category: "keys",
        description: "Create a new API key",
        fields: &[
            FieldSpec::required(
                "actions",
                ArgType::StringList,
                "Allowed actions, e.g. [\"search\", \"documents.add\"]",
            ),
            FieldSpec::required("indexes", ArgType::StringList, "Accessible indexes ([\"*\"] for all)"),
            FieldSpec::optional("name", ArgType::String, "Human-readable name for the key"),
            FieldSpec::optional("description", ArgType::String, "Description for the key"),
            FieldSpec::optional("expiresAt", ArgType::String, "Expiration date (RFC 3339); never expires if omitted"),
            FieldSpec::optional("uid", ArgType::String, "UUID to use as the key's uid"),
        ],
        handler: create_key,
    },
    OperationSpec {
        name: "delete-key",
        category: "keys",
        description: "Delete an API key",
        fields: &[FieldSpec::required("key", ArgType::String, "The API key or key uid to delete")],
        handler: delete_key,
    },
];

fn get_keys(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let page = Pagination::new(args.u64("offset"), args.u64("limit"));
        let keys = ctx.engine_client().await?.get_keys(page).await?;
        Ok(OperationPayload::new("API keys:", keys))
    })
}

fn create_key(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let owned = |name: &str| args.str(name).map(str::to_string);
        let request = CreateKeyRequest {
            expires_at: owned("expiresAt"),
            name: owned("name"),
            description: owned("description"),
            uid: owned("uid"),
            ..CreateKeyRequest::new(args.require_strings("actions")?, args.require_strings("indexes")?)
        };
        let key = ctx.engine_client().await?.create_key(&request).await?;
        Ok(OperationPayload::new("Created API key:", key))
    })
}

fn delete_key(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let key = args.require_str("key")?;
        // The argument may be the key itself: only a prefix is ever echoed.
        let secret = SecretString::from(key.to_string());
        ctx.engine_client()
            .await?
            .delete_key(key)
            .await
            .map_err(|e| e.map_message(|m| redact_message(m, Some(&secret))))?;
        let shown = preview(key, 8);
        Ok(OperationPayload::new(
            format!("Successfully deleted API key: {}", shown),
            json!({ "deleted": shown }),
        ))
    })
}
