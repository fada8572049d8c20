use serde_json::json;

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::{IndexUid, Pagination};
use crate::context::ServerContext;

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "create-index",
        category: "indexes",
        description: "Create a new Meilisearch index",
        fields: &[
            FieldSpec::required("uid", ArgType::String, "Unique identifier for the index"),
            FieldSpec::optional(
                "primaryKey",
                ArgType::String,
                "Primary key field name for documents",
            ),
        ],
        handler: create_index,
    },
    OperationSpec {
        name: "list-indexes",
        category: "indexes",
        description: "List all Meilisearch indexes",
        fields: &[
            FieldSpec::optional("offset", ArgType::Integer, "Number of indexes to skip (default: 0)"),
            FieldSpec::optional("limit", ArgType::Integer, "Maximum number of indexes to return (default: 20)"),
        ],
        handler: list_indexes,
    },
    OperationSpec {
        name: "delete-index",
        category: "indexes",
        description: "Delete a Meilisearch index",
        fields: &[FieldSpec::required(
            "uid",
            ArgType::String,
            "Unique identifier of the index to delete",
        )],
        handler: delete_index,
    },
];

fn create_index(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("uid")?)?;
        let task = ctx
            .engine_client()
            .await?
            .create_index(&uid, args.str("primaryKey"))
            .await?;
        Ok(OperationPayload::new(format!("Created index: {}", uid), task))
    })
}

fn list_indexes(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let page = Pagination::new(args.u64("offset"), args.u64("limit"));
        let indexes = ctx.engine_client().await?.list_indexes(page).await?;
        Ok(OperationPayload::new("Indexes:", indexes))
    })
}

fn delete_index(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("uid")?)?;
        let task = ctx.engine_client().await?.delete_index(&uid).await?;
        let data = if task.is_null() { json!({ "uid": uid }) } else { task };
        Ok(OperationPayload::new(
            format!("Successfully deleted index: {}", uid),
            data,
        ))
    })
}
