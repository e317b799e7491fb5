use std::collections::BTreeMap;

use sonic_rs::{JsonContainerTrait, JsonValueTrait, Value};
use tracing::{debug, instrument, warn};

use crate::{
    context::FusionExecutionContext,
    execution::{
        compose::merge_selection_results, error::ExecutionError, error_trie::ErrorTrie,
        state::WorkItem, variables::extract_variables,
    },
    executors::{common::SubgraphExecutionRequest, error::SubgraphExecutorError},
    operation::value::ValueLiteral,
    plan::ExecutionNode,
    response::{graphql_error::GraphQLError, subgraph_response::SubgraphResponse},
};

pub const DOWNSTREAM_SERVICE_ERROR: &str = "DOWNSTREAM_SERVICE_ERROR";

#[derive(Debug)]
pub enum FetchOutcome {
    Response(SubgraphResponse),
    Failed(SubgraphExecutorError),
}

/// Builds the subgraph request of `node` for one work item, or `None` when the
/// item did not produce every variable the node requires.
pub fn build_request<'a>(
    ctx: &FusionExecutionContext<'_>,
    node: &'a ExecutionNode,
    item: &WorkItem,
) -> Option<SubgraphExecutionRequest<'a>> {
    let mut variables = BTreeMap::new();
    for key in &node.requires {
        let value = item.variable_values.get(key)?;
        variables.insert(key.clone(), value.clone());
    }

    for name in &node.forwarded_variables {
        if let Some(value) = ctx.variable_values.get(name) {
            variables.insert(name.clone(), ValueLiteral::from_json(value));
        }
    }

    Some(SubgraphExecutionRequest {
        query: &node.document,
        operation_name: node.operation_name.as_deref(),
        variables,
        extensions: None,
    })
}

/// Sends one request, racing it against the operation's cancellation.
#[instrument(level = "debug", skip_all, fields(node = %node.id, subgraph = %node.subgraph))]
pub async fn fetch(
    ctx: &FusionExecutionContext<'_>,
    node: &ExecutionNode,
    request: SubgraphExecutionRequest<'_>,
) -> Result<FetchOutcome, ExecutionError> {
    tokio::select! {
        biased;
        error = ctx.cancellation.cancelled() => Err(error.into()),
        result = ctx.execute(&node.subgraph, request) => Ok(match result {
            Ok(response) => FetchOutcome::Response(response),
            Err(error) => FetchOutcome::Failed(error),
        }),
    }
}

/// Folds the outcome of `node`'s fetch into `item`: data is spliced into the
/// per-selection results, errors end up in the item's error trie or, when they
/// cannot be positioned inside the item, directly in the response.
pub fn merge_outcome(
    ctx: &mut FusionExecutionContext<'_>,
    node: &ExecutionNode,
    item: &mut WorkItem,
    outcome: FetchOutcome,
) -> Result<(), ExecutionError> {
    let operation = ctx.operation;
    let selection_set = operation.selection_set(node.selection_set)?;

    let mut response = match outcome {
        FetchOutcome::Response(response) => response,
        FetchOutcome::Failed(error) => {
            warn!(
                subgraph = %node.subgraph,
                node = %node.id,
                error = %error,
                "subgraph request failed"
            );
            let graphql_error = error.to_graphql_error(
                &node.subgraph,
                ctx.error_settings.include_subgraph_name,
            );
            let error_trie = if node.response_names.is_empty() {
                ErrorTrie::from_selections(&graphql_error, selection_set.response_names())
            } else {
                ErrorTrie::from_selections(
                    &graphql_error,
                    node.response_names.iter().map(String::as_str),
                )
            };
            item.merge_error_trie(error_trie);
            return Ok(());
        }
    };

    let include_subgraph_name = ctx.error_settings.include_subgraph_name;
    let errors = response.take_errors();
    if !errors.is_empty() {
        debug!(
            subgraph = %node.subgraph,
            count = errors.len(),
            "subgraph responded with errors"
        );
        let errors = errors.into_iter().map(|error| {
            let error = error.with_code(DOWNSTREAM_SERVICE_ERROR);
            if include_subgraph_name {
                error.add_subgraph_name(&node.subgraph)
            } else {
                error
            }
        });
        let (error_trie, unattributed) = ErrorTrie::from_errors(errors).split_at_path(&node.path);
        for error in unattributed {
            ctx.result.add_error(attach_item_path(error, item));
        }
        item.merge_error_trie(error_trie);
    }

    let Some(object) = lookup_object(response.data(), &node.path) else {
        debug!(node = %node.id, "subgraph returned no data for the selection set");
        return Ok(());
    };

    merge_selection_results(
        selection_set,
        &node.subgraph,
        object,
        &mut item.selection_results,
    );
    if item.has_unbound_exports() {
        extract_variables(
            ctx.plan,
            node.selection_set,
            [object],
            &mut item.variable_values,
        );
    }

    Ok(())
}

fn attach_item_path(mut error: GraphQLError, item: &WorkItem) -> GraphQLError {
    if item.path.is_empty() {
        error.path = None;
        error
    } else {
        error.with_path(item.path.clone())
    }
}

fn lookup_object<'v>(data: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter()
        .try_fold(data, |current, segment| match current.as_array() {
            Some(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            None => current.get(segment.as_str()),
        })
        .filter(|value| value.is_object())
}
