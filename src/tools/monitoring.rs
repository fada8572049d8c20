//! Health, version and statistics.

use serde_json::json;

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::IndexUid;
use crate::context::ServerContext;

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "health-check",
        category: "monitoring",
        description: "Check Meilisearch server health",
        fields: &[],
        handler: health_check,
    },
    OperationSpec {
        name: "get-version",
        category: "monitoring",
        description: "Get Meilisearch version information",
        fields: &[],
        handler: get_version,
    },
    OperationSpec {
        name: "get-stats",
        category: "monitoring",
        description: "Get database statistics",
        fields: &[],
        handler: get_stats,
    },
    OperationSpec {
        name: "get-health-status",
        category: "monitoring",
        description: "Get comprehensive health status of Meilisearch",
        fields: &[],
        handler: get_health_status,
    },
    OperationSpec {
        name: "get-index-metrics",
        category: "monitoring",
        description: "Get detailed metrics for an index",
        fields: &[FieldSpec::required(
            "indexUid",
            ArgType::String,
            "The unique identifier of the index",
        )],
        handler: get_index_metrics,
    },
    OperationSpec {
        name: "get-system-info",
        category: "monitoring",
        description: "Get system-level information",
        fields: &[],
        handler: get_system_info,
    },
];

fn health_check(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let healthy = ctx.engine_client().await?.health().await;
        let status = if healthy { "available" } else { "unavailable" };
        Ok(OperationPayload::new(
            format!("Meilisearch is {}", status),
            json!({ "healthy": healthy, "status": status }),
        ))
    })
}

fn get_version(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let version = ctx.engine_client().await?.version().await?;
        Ok(OperationPayload::new("Version info:", version))
    })
}

fn get_stats(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let stats = ctx.engine_client().await?.stats().await?;
        Ok(OperationPayload::new("Database stats:", stats))
    })
}

fn get_health_status(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let status = ctx.engine_client().await?.health_status().await?;
        tracing::info!(indexes = %status["indexesCount"], "Health status checked");
        Ok(OperationPayload::new("Health status:", status))
    })
}

fn get_index_metrics(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("indexUid")?)?;
        let metrics = ctx.engine_client().await?.index_metrics(&uid).await?;
        Ok(OperationPayload::new(format!("Index metrics for '{}':", uid), metrics))
    })
}

fn get_system_info(ctx: &ServerContext, _args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let info = ctx.engine_client().await?.system_info().await?;
        Ok(OperationPayload::new("System information:", info))
    })
}
