//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to [`StorageError`]. Throttling and server-side
//! failures map to the transient variants so the retry layer picks them up.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;

use tablekit_core::storage::StorageError;

/// Map a GetItem SDK error to StorageError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StorageError {
    map_sdk_error(err, |service_err| match service_err {
        GetItemError::ProvisionedThroughputExceededException(_)
        | GetItemError::RequestLimitExceeded(_) => Some(throttled("GetItem")),
        GetItemError::InternalServerError(_) => Some(internal("GetItem")),
        GetItemError::ResourceNotFoundException(_) => Some(table_not_found()),
        _ => None,
    })
}

/// Map a PutItem SDK error to StorageError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> StorageError {
    map_sdk_error(err, |service_err| match service_err {
        PutItemError::ProvisionedThroughputExceededException(_)
        | PutItemError::RequestLimitExceeded(_) => Some(throttled("PutItem")),
        PutItemError::TransactionConflictException(_) => Some(StorageError::Throttled(
            "PutItem: transaction conflict".to_string(),
        )),
        PutItemError::InternalServerError(_) => Some(internal("PutItem")),
        PutItemError::ResourceNotFoundException(_) => Some(table_not_found()),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => Some(
            StorageError::InvalidRequest("Item collection size limit exceeded".to_string()),
        ),
        _ => None,
    })
}

/// Map a Query SDK error to StorageError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StorageError {
    map_sdk_error(err, |service_err| match service_err {
        QueryError::ProvisionedThroughputExceededException(_)
        | QueryError::RequestLimitExceeded(_) => Some(throttled("Query")),
        QueryError::InternalServerError(_) => Some(internal("Query")),
        QueryError::ResourceNotFoundException(_) => Some(table_not_found()),
        _ => None,
    })
}

/// Maps errors that carry no modeled variant by their error code.
///
/// Access denial arrives as an unmodeled `AccessDeniedException`, e.g. when an
/// IAM policy restricts `dynamodb:LeadingKeys` to the caller's tenant prefix.
pub fn classify_code(code: Option<&str>, message: String) -> StorageError {
    match code {
        Some("AccessDeniedException") | Some("UnrecognizedClientException") => {
            StorageError::AccessDenied(message)
        }
        Some("ThrottlingException") | Some("LimitExceededException") => {
            StorageError::Throttled(message)
        }
        Some("ServiceUnavailable") | Some("InternalFailure") => StorageError::Unavailable(message),
        _ => StorageError::InvalidRequest(message),
    }
}

fn map_sdk_error<E, R>(
    err: SdkError<E, R>,
    classify: impl FnOnce(&E) -> Option<StorageError>,
) -> StorageError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ServiceError(context) => {
            let service_err = context.into_err();
            classify(&service_err).unwrap_or_else(|| classify_code(service_err.code(), message))
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageError::Unavailable(message)
        }
        _ => StorageError::InvalidRequest(message),
    }
}

fn throttled(operation: &str) -> StorageError {
    StorageError::Throttled(format!("{operation}: throughput exceeded, please retry"))
}

fn internal(operation: &str) -> StorageError {
    StorageError::Unavailable(format!("{operation}: DynamoDB internal server error"))
}

fn table_not_found() -> StorageError {
    StorageError::InvalidRequest("Table or index not found".to_string())
}
