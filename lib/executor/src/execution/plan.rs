use std::future::Future;

use ahash::HashSet;
use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use crate::{
    context::FusionExecutionContext,
    execution::{
        compose::{compose_selection_set, merge_selection_results},
        error::ExecutionError,
        fetch::{build_request, fetch, merge_outcome, FetchOutcome},
        state::WorkItem,
        variables::extract_variables,
    },
    operation::SelectionSetId,
    plan::{ExecutionNode, NodeId},
};

/// Runs the plan to completion and returns the serialized GraphQL response.
///
/// Nodes are dispatched in batches: every node whose dependencies completed is
/// fetched concurrently, once per pending object of its selection set. A
/// selection set is composed as soon as all nodes that populate it completed.
#[instrument(level = "debug", skip_all, fields(nodes = ctx.plan.len()))]
pub async fn execute_operation(
    mut ctx: FusionExecutionContext<'_>,
) -> Result<Vec<u8>, ExecutionError> {
    let operation = ctx.operation;
    let plan = ctx.plan;
    for node in &plan.nodes {
        for dependency in &node.dependencies {
            plan.node(*dependency)?;
        }
    }

    let root = operation.root()?;
    let target = ctx
        .result
        .create_root(&root.type_name, root.selections.len());
    let root_item = WorkItem::new(root.id, root.selections.len(), target, Vec::new())
        .with_export_keys(plan.get_export_keys(root.id));

    if !ctx.needs_more_data(root.id) {
        trace!("operation needs no subgraph data");
        compose_selection_set(
            &mut ctx,
            root.id,
            &root_item.selection_results,
            target,
            &root_item.path,
            None,
        )?;
        return ctx.into_response();
    }
    ctx.state.register_state(root_item)?;

    let mut completed: HashSet<NodeId> = HashSet::default();
    let mut in_flight: IndexMap<SelectionSetId, Vec<WorkItem>> = IndexMap::new();

    loop {
        ctx.cancellation.bail_if_cancelled()?;
        compose_completed(&mut ctx, &completed, &mut in_flight)?;

        let batch: Vec<&ExecutionNode> = plan.get_next_nodes(&completed).collect();
        if batch.is_empty() {
            let remaining = plan.len() - completed.len();
            if remaining > 0 || !in_flight.is_empty() {
                return Err(ExecutionError::PlanStalled(remaining));
            }
            break;
        }

        for node in &batch {
            take_state(&ctx, node.selection_set, &mut in_flight)?;
        }

        let dispatched: Vec<NodeId> = batch.iter().map(|node| node.id).collect();
        debug!(nodes = ?dispatched, "dispatching batch");
        let results = dispatch_batch(&ctx, &batch, &in_flight).await?;
        for (job, outcome) in results {
            let node = batch[job.node];
            if let Some(item) = in_flight
                .get_mut(&node.selection_set)
                .and_then(|items| items.get_mut(job.item))
            {
                merge_outcome(&mut ctx, node, item, outcome)?;
            }
        }

        completed.extend(dispatched);
    }

    ctx.into_response()
}

/// Composes every in-flight selection set whose nodes all completed, in the
/// order the sets were taken.
fn compose_completed(
    ctx: &mut FusionExecutionContext<'_>,
    completed: &HashSet<NodeId>,
    in_flight: &mut IndexMap<SelectionSetId, Vec<WorkItem>>,
) -> Result<(), ExecutionError> {
    let plan = ctx.plan;
    let ready: Vec<SelectionSetId> = in_flight
        .keys()
        .copied()
        .filter(|selection_set| {
            plan.get_nodes(*selection_set)
                .all(|node| completed.contains(&node.id))
        })
        .collect();

    for selection_set in ready {
        let Some(items) = in_flight.shift_remove(&selection_set) else {
            continue;
        };
        trace!(
            selection_set = %selection_set,
            items = items.len(),
            "composing selection set"
        );
        for item in items {
            ctx.cancellation.bail_if_cancelled()?;
            compose_selection_set(
                ctx,
                selection_set,
                &item.selection_results,
                item.target,
                &item.path,
                item.error_trie.as_ref(),
            )?;
        }
    }

    Ok(())
}

/// Moves the pending work of `selection_set` into `in_flight`, sealing it.
/// Seed data already known for an item is spliced into its selection results.
fn take_state(
    ctx: &FusionExecutionContext<'_>,
    selection_set: SelectionSetId,
    in_flight: &mut IndexMap<SelectionSetId, Vec<WorkItem>>,
) -> Result<(), ExecutionError> {
    if in_flight.contains_key(&selection_set) {
        return Ok(());
    }

    let Some(mut items) = ctx.state.try_get_state(selection_set) else {
        trace!(selection_set = %selection_set, "no pending work");
        return Ok(());
    };

    let selection_set_def = ctx.operation.selection_set(selection_set)?;
    for item in &mut items {
        let Some(seed) = item.seed.take() else {
            continue;
        };
        for fragment in seed.fragments() {
            merge_selection_results(
                selection_set_def,
                &fragment.subgraph,
                &fragment.value,
                &mut item.selection_results,
            );
        }
        if item.has_unbound_exports() {
            extract_variables(
                ctx.plan,
                selection_set,
                seed.fragments().iter().map(|fragment| &fragment.value),
                &mut item.variable_values,
            );
        }
    }

    in_flight.insert(selection_set, items);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct FetchJob {
    node: usize,
    item: usize,
}

async fn dispatch_batch<'b>(
    ctx: &'b FusionExecutionContext<'_>,
    batch: &[&'b ExecutionNode],
    in_flight: &'b IndexMap<SelectionSetId, Vec<WorkItem>>,
) -> Result<Vec<(FetchJob, FetchOutcome)>, ExecutionError> {
    let mut scope = ConcurrencyScope::new();

    for (node_index, node) in batch.iter().copied().enumerate() {
        let Some(items) = in_flight.get(&node.selection_set) else {
            continue;
        };
        for (item_index, item) in items.iter().enumerate() {
            let Some(request) = build_request(ctx, node, item) else {
                let missing: Vec<&String> = node
                    .requires
                    .iter()
                    .filter(|key| !item.variable_values.contains_key(*key))
                    .collect();
                debug!(
                    node = %node.id,
                    missing = ?missing,
                    "skipping fetch, required variables are not available"
                );
                continue;
            };
            let job = FetchJob {
                node: node_index,
                item: item_index,
            };
            scope.spawn(async move { (job, fetch(ctx, node, request).await) });
        }
    }

    scope
        .join_all()
        .await
        .into_iter()
        .map(|(job, outcome)| outcome.map(|outcome| (job, outcome)))
        .collect()
}

/// Runs futures concurrently and hands their outputs back in spawn order,
/// whatever order they complete in.
struct ConcurrencyScope<'exec, T> {
    jobs: FuturesUnordered<BoxFuture<'exec, (usize, T)>>,
    spawned: usize,
}

impl<'exec, T: Send + 'exec> ConcurrencyScope<'exec, T> {
    fn new() -> Self {
        Self {
            jobs: FuturesUnordered::new(),
            spawned: 0,
        }
    }

    fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = T> + Send + 'exec,
    {
        let index = self.spawned;
        self.spawned += 1;
        self.jobs.push(Box::pin(async move { (index, future.await) }));
    }

    async fn join_all(mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.jobs.len());
        while let Some(result) = self.jobs.next().await {
            results.push(result);
        }
        results.sort_unstable_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
