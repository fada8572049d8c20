use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::IndexUid;
use crate::context::ServerContext;

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get-settings",
        category: "settings",
        description: "Get current settings for an index",
        fields: &[FieldSpec::required(
            "indexUid",
            ArgType::String,
            "The unique identifier of the index",
        )],
        handler: get_settings,
    },
    OperationSpec {
        name: "update-settings",
        category: "settings",
        description: "Update settings for an index",
        fields: &[
            FieldSpec::required("indexUid", ArgType::String, "The unique identifier of the index"),
            FieldSpec::required(
                "settings",
                ArgType::Object,
                "Settings to update, e.g. {\"searchableAttributes\": [\"title\"]}",
            ),
        ],
        handler: update_settings,
    },
];

fn get_settings(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("indexUid")?)?;
        let settings = ctx.engine_client().await?.get_settings(&uid).await?;
        Ok(OperationPayload::new(format!("Current settings for '{}':", uid), settings))
    })
}

fn update_settings(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("indexUid")?)?;
        let settings = args.require_object("settings")?;
        let task = ctx
            .engine_client()
            .await?
            .update_settings(&uid, settings)
            .await?;
        Ok(OperationPayload::new(format!("Settings update for '{}' enqueued:", uid), task))
    })
}
