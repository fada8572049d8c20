//! Asynchronous task inspection and cancellation.

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::TaskFilter;
use crate::context::ServerContext;

const DATE_HELP: &str = "RFC 3339 date, e.g. 2024-01-31T00:00:00Z";

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get-task",
        category: "tasks",
        description: "Get information about a specific task",
        fields: &[FieldSpec::required(
            "taskUid",
            ArgType::Integer,
            "The unique identifier of the task",
        )],
        handler: get_task,
    },
    OperationSpec {
        name: "get-tasks",
        category: "tasks",
        description: "Get list of tasks with optional filters",
        fields: &[
            FieldSpec::optional("limit", ArgType::Integer, "Maximum number of tasks to return"),
            FieldSpec::optional("from", ArgType::Integer, "Task uid to start from"),
            FieldSpec::optional("reverse", ArgType::Boolean, "Return oldest tasks first"),
            FieldSpec::optional("batchUids", ArgType::IntegerList, "Filter by batch uids"),
            FieldSpec::optional("uids", ArgType::IntegerList, "Filter by task uids"),
            FieldSpec::optional("canceledBy", ArgType::IntegerList, "Filter by canceling task uids"),
            FieldSpec::optional("types", ArgType::StringList, "Filter by task types"),
            FieldSpec::optional("statuses", ArgType::StringList, "Filter by task statuses"),
            FieldSpec::optional("indexUids", ArgType::StringList, "Filter by index uids"),
            FieldSpec::optional("afterEnqueuedAt", ArgType::String, DATE_HELP),
            FieldSpec::optional("beforeEnqueuedAt", ArgType::String, DATE_HELP),
            FieldSpec::optional("afterStartedAt", ArgType::String, DATE_HELP),
            FieldSpec::optional("beforeStartedAt", ArgType::String, DATE_HELP),
            FieldSpec::optional("afterFinishedAt", ArgType::String, DATE_HELP),
            FieldSpec::optional("beforeFinishedAt", ArgType::String, DATE_HELP),
        ],
        handler: get_tasks,
    },
    OperationSpec {
        name: "cancel-tasks",
        category: "tasks",
        description: "Cancel tasks matching the given filters; at least one filter is required",
        fields: &[
            FieldSpec::optional("uids", ArgType::IntegerList, "Task uids to cancel"),
            FieldSpec::optional("indexUids", ArgType::StringList, "Cancel tasks of these indexes"),
            FieldSpec::optional("types", ArgType::StringList, "Cancel tasks of these types"),
            FieldSpec::optional("statuses", ArgType::StringList, "Cancel tasks with these statuses"),
        ],
        handler: cancel_tasks,
    },
];

fn task_filter(args: &Arguments) -> TaskFilter {
    let date = |name: &str| args.str(name).map(str::to_string);
    TaskFilter {
        limit: args.u64("limit"),
        from: args.u64("from"),
        reverse: args.bool("reverse"),
        uids: args.u64s("uids").unwrap_or_default(),
        batch_uids: args.u64s("batchUids").unwrap_or_default(),
        canceled_by: args.u64s("canceledBy").unwrap_or_default(),
        types: args.strings("types").unwrap_or_default(),
        statuses: args.strings("statuses").unwrap_or_default(),
        index_uids: args.strings("indexUids").unwrap_or_default(),
        after_enqueued_at: date("afterEnqueuedAt"),
        before_enqueued_at: date("beforeEnqueuedAt"),
        after_started_at: date("afterStartedAt"),
        before_started_at: date("beforeStartedAt"),
        after_finished_at: date("afterFinishedAt"),
        before_finished_at: date("beforeFinishedAt"),
    }
}

fn get_task(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let task_uid = args.require_u64("taskUid")?;
        let task = ctx.engine_client().await?.get_task(task_uid).await?;
        Ok(OperationPayload::new("Task information:", task))
    })
}

fn get_tasks(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let tasks = ctx.engine_client().await?.get_tasks(&task_filter(&args)).await?;
        Ok(OperationPayload::new("Tasks:", tasks))
    })
}

fn cancel_tasks(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let filter = task_filter(&args);
        let task = ctx.engine_client().await?.cancel_tasks(&filter).await?;
        Ok(OperationPayload::new("Tasks cancelled:", task))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_filter_from_arguments() {
        let args = Arguments::validate(
            OPERATIONS[1].fields,
            json!({"limit": 10, "from": 99, "reverse": true, "statuses": ["failed"], "beforeEnqueuedAt": "2024-01-31T00:00:00Z"}),
        )
        .unwrap();
        let filter = task_filter(&args);
        assert_eq!(filter.limit, Some(10));
        assert_eq!(filter.from, Some(99));
        assert_eq!(filter.reverse, Some(true));
        assert_eq!(filter.statuses, vec!["failed".to_string()]);
        assert_eq!(filter.before_enqueued_at.as_deref(), Some("2024-01-31T00:00:00Z"));
        assert!(filter.uids.is_empty());
    }
}
