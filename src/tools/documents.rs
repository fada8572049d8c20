use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use crate::client::{IndexUid, Pagination};
use crate::context::ServerContext;
use crate::Error;

pub(super) static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get-documents",
        category: "documents",
        description: "Get documents from an index",
        fields: &[
            FieldSpec::required("indexUid", ArgType::String, "The unique identifier of the index"),
            FieldSpec::optional("offset", ArgType::Integer, "Number of documents to skip (default: 0)"),
            FieldSpec::optional("limit", ArgType::Integer, "Maximum number of documents to return (default: 20)"),
            FieldSpec::optional("fields", ArgType::StringList, "Document attributes to return"),
        ],
        handler: get_documents,
    },
    OperationSpec {
        name: "add-documents",
        category: "documents",
        description: "Add documents to an index",
        fields: &[
            FieldSpec::required("indexUid", ArgType::String, "The unique identifier of the index"),
            FieldSpec::required("documents", ArgType::ObjectList, "Document objects to add"),
            FieldSpec::optional("primaryKey", ArgType::String, "Primary key field name"),
        ],
        handler: add_documents,
    },
];

fn get_documents(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("indexUid")?)?;
        let page = Pagination::new(args.u64("offset"), args.u64("limit"));
        let fields = args.strings("fields");
        let documents = ctx
            .engine_client()
            .await?
            .get_documents(&uid, page, fields.as_deref())
            .await?;
        Ok(OperationPayload::new("Documents:", documents))
    })
}

fn add_documents(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let uid = IndexUid::new(args.require_str("indexUid")?)?;
        let documents = args.require_objects("documents")?;
        if documents.is_empty() {
            return Err(Error::invalid_arguments("documents must not be empty"));
        }
        let task = ctx
            .engine_client()
            .await?
            .add_documents(&uid, documents, args.str("primaryKey"))
            .await?;
        Ok(OperationPayload::new(
            format!("Added {} documents to '{}':", documents.len(), uid),
            task,
        ))
    })
}
