//! Single calls with timeout, cancellation and exponential backoff.

use super::types::{CallJob, StatusBoard};
use crate::config::ExecutorParams;
use crate::ports::completion_client::{CompletionClient, CompletionError};
use agora_domain::{ExecutionResult, SubQueryStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One call raced against `timeout` and `cancel`.
pub(crate) async fn call_once(
    client: &dyn CompletionClient,
    cancel: &CancellationToken,
    system: &str,
    user: &str,
    context: &str,
    timeout: Duration,
) -> Result<String, CompletionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CompletionError::Cancelled),
        result = tokio::time::timeout(timeout, client.call(system, user, context)) => match result {
            Ok(Ok(text)) if text.trim().is_empty() => Err(CompletionError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(timeout)),
        },
    }
}

/// Run `job` until it succeeds, exhausts its retries or is cancelled.
///
/// Retries are sequential; retry `n` waits `backoff_base * 2^n` first.
pub(crate) async fn call_with_retry(
    client: &dyn CompletionClient,
    params: &ExecutorParams,
    cancel: &CancellationToken,
    board: &StatusBoard,
    job: &CallJob,
) -> ExecutionResult {
    let id = job.sub_query.id.as_str();
    let mut attempts: u32 = 0;

    loop {
        board.set(id, SubQueryStatus::Executing);
        attempts += 1;

        let error = match call_once(client, cancel, &job.system, &job.user, &job.context, job.timeout).await {
            Ok(text) => {
                board.set(id, SubQueryStatus::Succeeded);
                debug!("Sub-query {} succeeded after {} attempt(s)", id, attempts);
                return ExecutionResult::succeeded(&job.sub_query, job.source.clone(), text, attempts);
            }
            Err(CompletionError::Cancelled) => {
                board.set(id, SubQueryStatus::FailedFinal);
                return ExecutionResult::failed(&job.sub_query, job.source.clone(), "cancelled", attempts);
            }
            Err(e) => e,
        };

        let retry = attempts - 1;
        if retry >= params.max_retries {
            warn!("Sub-query {} failed after {} attempt(s): {}", id, attempts, error);
            board.set(id, SubQueryStatus::FailedFinal);
            return ExecutionResult::failed(&job.sub_query, job.source.clone(), error.to_string(), attempts);
        }

        let delay = params.backoff_for(retry);
        warn!(
            "Sub-query {} attempt {} failed: {}; retrying in {:?}",
            id, attempts, error, delay
        );
        board.set(id, SubQueryStatus::FailedRetry);

        tokio::select! {
            _ = cancel.cancelled() => {
                board.set(id, SubQueryStatus::FailedFinal);
                return ExecutionResult::failed(
                    &job.sub_query,
                    job.source.clone(),
                    "cancelled while waiting to retry",
                    attempts,
                );
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
