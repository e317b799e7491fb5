//! Turns the raw subgraph fragments collected for a selection set into result
//! containers, applying GraphQL's type branching and null propagation.
use sonic_rs::{JsonValueTrait, Value, ValueRef};
use tracing::{debug, trace};

use crate::{
    context::FusionExecutionContext,
    execution::{
        error::ExecutionError,
        error_trie::ErrorTrie,
        selection_data::SelectionData,
        state::{ResponsePath, WorkItem},
    },
    operation::{Selection, SelectionSet, SelectionSetId, TypeKind, TypeRef},
    response::{
        graphql_error::{GraphQLError, GraphQLErrorPathSegment},
        result::{ObjectResultId, ResultParent, ResultRef, ResultValue},
    },
};

enum Composed {
    Value(ResultValue),
    Null,
    /// Null, with the error explaining it already recorded.
    Failed,
}

/// Composes `selection_results` (index-aligned with the selections of
/// `selection_set_id`) into `target`.
///
/// Composition stops at the first non-null violation, since the violation
/// nullifies `target` or one of its ancestors anyway.
pub fn compose_selection_set(
    ctx: &mut FusionExecutionContext<'_>,
    selection_set_id: SelectionSetId,
    selection_results: &[SelectionData],
    target: ObjectResultId,
    path: &ResponsePath,
    error_trie: Option<&ErrorTrie>,
) -> Result<(), ExecutionError> {
    if ctx.result.is_invalidated(ResultRef::Object(target)) {
        return Ok(());
    }

    let operation = ctx.operation;
    let selection_set = operation.selection_set(selection_set_id)?;
    let empty = SelectionData::default();

    for (index, selection) in selection_set.selections.iter().enumerate() {
        if !selection.is_included(ctx.variable_values) {
            continue;
        }

        let response_name = selection.response_name.as_str();
        let nullable = selection.is_nullable();

        if selection.is_typename() {
            let type_name = Value::from(selection_set.type_name.as_str());
            ctx.result.set_field(
                target,
                index,
                response_name,
                ResultValue::Leaf(type_name),
                nullable,
            );
            continue;
        }

        let field_path = child_path(
            path,
            GraphQLErrorPathSegment::String(response_name.to_string()),
        );
        let data = selection_results.get(index).unwrap_or(&empty);

        if !data.has_value() {
            // the field may be missing because a region below it failed
            let reported = match error_trie.and_then(|t| t.first_error_below_path(&[response_name]))
            {
                Some(error) => {
                    report_error(ctx, error, &field_path);
                    true
                }
                None => false,
            };

            ctx.result
                .set_field(target, index, response_name, ResultValue::Null, nullable);
            if nullable {
                continue;
            }
            if !reported {
                report_non_null_violation(ctx, &selection_set.type_name, selection, &field_path);
            }
            trace!(path = %format_path(&field_path), "non-null field without data");
            ctx.result.propagate_null(ResultRef::Object(target));
            break;
        }

        let field_trie = error_trie.and_then(|t| t.child(response_name));
        let reported = report_anchored_errors(ctx, field_trie, &field_path);

        // placeholder, so a null bubbling up from below finds this slot
        ctx.result
            .set_field(target, index, response_name, ResultValue::Null, nullable);

        let composed = compose_value(
            ctx,
            &selection.field_type,
            selection,
            &selection_set.type_name,
            data,
            field_trie,
            &field_path,
            ResultParent::Field {
                object: target,
                index,
            },
        )?;

        match composed {
            Composed::Value(value) => {
                if let Some(container) = value.container() {
                    if ctx.result.is_invalidated(container) {
                        if ctx.result.is_invalidated(ResultRef::Object(target)) {
                            break;
                        }
                        continue;
                    }
                }
                ctx.result
                    .set_field(target, index, response_name, value, nullable);
            }
            Composed::Null => {
                // errors below a nulled field surface at the field
                let reported = reported || report_first_error(ctx, field_trie, &field_path);
                if nullable {
                    continue;
                }
                if !reported {
                    report_non_null_violation(ctx, &selection_set.type_name, selection, &field_path);
                }
                ctx.result.propagate_null(ResultRef::Object(target));
                break;
            }
            Composed::Failed => {
                if nullable {
                    continue;
                }
                ctx.result.propagate_null(ResultRef::Object(target));
                break;
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compose_value(
    ctx: &mut FusionExecutionContext<'_>,
    field_type: &TypeRef,
    selection: &Selection,
    owner_type: &str,
    data: &SelectionData,
    error_trie: Option<&ErrorTrie>,
    path: &ResponsePath,
    parent: ResultParent,
) -> Result<Composed, ExecutionError> {
    if data.is_null() {
        return Ok(Composed::Null);
    }

    if let Some(element_type) = field_type.list_element() {
        return compose_list(
            ctx,
            element_type,
            selection,
            owner_type,
            data,
            error_trie,
            path,
            parent,
        );
    }

    match selection.type_kind {
        TypeKind::Scalar => Ok(compose_leaf(ctx, selection, owner_type, data, path, true)),
        TypeKind::Enum => Ok(compose_leaf(ctx, selection, owner_type, data, path, false)),
        TypeKind::Object | TypeKind::Interface | TypeKind::Union => {
            compose_object(ctx, selection, data, error_trie, path, parent)
        }
    }
}

fn compose_leaf(
    ctx: &mut FusionExecutionContext<'_>,
    selection: &Selection,
    owner_type: &str,
    data: &SelectionData,
    path: &ResponsePath,
    allow_reencode: bool,
) -> Composed {
    let Some(fragment) = data.first_value() else {
        return Composed::Null;
    };

    if allow_reencode && selection.needs_id_reencode {
        return match ctx
            .id_serializer
            .reencode(&fragment.subgraph, owner_type, &fragment.value)
        {
            Ok(id) => Composed::Value(ResultValue::Leaf(id)),
            Err(error) => {
                debug!(path = %format_path(path), %error, "id could not be re-encoded");
                ctx.result
                    .add_error(GraphQLError::from(error.to_string()).with_path(path.clone()));
                Composed::Failed
            }
        };
    }

    Composed::Value(ResultValue::Leaf(fragment.value.clone()))
}

fn compose_object(
    ctx: &mut FusionExecutionContext<'_>,
    selection: &Selection,
    data: &SelectionData,
    error_trie: Option<&ErrorTrie>,
    path: &ResponsePath,
    parent: ResultParent,
) -> Result<Composed, ExecutionError> {
    let schema_metadata = ctx.schema_metadata;
    let type_name = if selection.type_kind.is_abstract() {
        let type_name = data.type_name().ok_or_else(|| {
            ExecutionError::MissingTypeName(selection.field_type.named_type().to_string())
        })?;
        schema_metadata.gateway_type_name(data.subgraph().unwrap_or_default(), type_name)
    } else {
        selection.field_type.named_type()
    };

    let operation = ctx.operation;
    let selection_set_id = selection.selection_set_for(type_name)?;
    let selection_set = operation.selection_set(selection_set_id)?;
    let object = ctx.result.create_object(
        &selection_set.type_name,
        selection_set.selections.len(),
        parent,
    );

    if ctx.needs_more_data(selection_set_id) {
        debug!(
            selection_set = %selection_set_id,
            path = %format_path(path),
            "deferring composition until the selection set is fetched"
        );
        let item = WorkItem::new(
            selection_set_id,
            selection_set.selections.len(),
            object,
            path.clone(),
        )
        .with_seed(data.clone())
        .with_export_keys(ctx.plan.get_export_keys(selection_set_id))
        .with_error_trie(error_trie.cloned());
        ctx.state.register_state(item)?;
    } else {
        let selection_results = extract_selection_results(selection_set, data);
        compose_selection_set(
            ctx,
            selection_set_id,
            &selection_results,
            object,
            path,
            error_trie,
        )?;
    }

    Ok(Composed::Value(ResultValue::Object(object)))
}

#[allow(clippy::too_many_arguments)]
fn compose_list(
    ctx: &mut FusionExecutionContext<'_>,
    element_type: &TypeRef,
    selection: &Selection,
    owner_type: &str,
    data: &SelectionData,
    error_trie: Option<&ErrorTrie>,
    path: &ResponsePath,
    parent: ResultParent,
) -> Result<Composed, ExecutionError> {
    // several subgraphs may contribute to the same list, their items are zipped
    let mut sources: Vec<(&str, Vec<&Value>)> = Vec::new();
    for fragment in data.fragments() {
        match fragment.value.as_ref() {
            ValueRef::Null => continue,
            ValueRef::Array(items) => {
                sources.push((fragment.subgraph.as_str(), items.iter().collect()));
            }
            _ => {
                return Err(ExecutionError::InvalidResponseShape {
                    path: format_path(path),
                    expected: "a list",
                })
            }
        }
    }

    let len = sources.first().map_or(0, |(_, items)| items.len());
    let element_nullable = element_type.is_nullable();
    let list = ctx.result.create_list(len, element_nullable, parent);

    for index in 0..len {
        let item_path = child_path(path, GraphQLErrorPathSegment::Index(index));
        let item_trie = error_trie.and_then(|t| t.child(&index.to_string()));
        let item_data = sources
            .iter()
            .fold(SelectionData::default(), |item_data, (subgraph, items)| {
                match items.get(index) {
                    Some(value) => item_data.add_result(subgraph, (*value).clone()),
                    None => item_data,
                }
            });

        ctx.result.set_item(list, index, ResultValue::Null);
        let reported = report_anchored_errors(ctx, item_trie, &item_path);

        let composed = if item_data.has_value() {
            compose_value(
                ctx,
                element_type,
                selection,
                owner_type,
                &item_data,
                item_trie,
                &item_path,
                ResultParent::Item { list, index },
            )?
        } else {
            Composed::Null
        };

        match composed {
            Composed::Value(value) => {
                if let Some(container) = value.container() {
                    if ctx.result.is_invalidated(container) {
                        if ctx.result.is_invalidated(ResultRef::List(list)) {
                            break;
                        }
                        continue;
                    }
                }
                ctx.result.set_item(list, index, value);
            }
            Composed::Null => {
                let reported = reported || report_first_error(ctx, item_trie, &item_path);
                if element_nullable {
                    continue;
                }
                if !reported {
                    report_non_null_violation(ctx, owner_type, selection, &item_path);
                }
                ctx.result.propagate_null(ResultRef::List(list));
                break;
            }
            Composed::Failed => {
                if element_nullable {
                    continue;
                }
                ctx.result.propagate_null(ResultRef::List(list));
                break;
            }
        }
    }

    Ok(Composed::Value(ResultValue::List(list)))
}

/// Collects, for every selection of `selection_set`, the values the given
/// fragments carry under its response name.
pub fn extract_selection_results(
    selection_set: &SelectionSet,
    data: &SelectionData,
) -> Vec<SelectionData> {
    let mut selection_results = vec![SelectionData::default(); selection_set.selections.len()];
    for fragment in data.fragments() {
        merge_selection_results(
            selection_set,
            &fragment.subgraph,
            &fragment.value,
            &mut selection_results,
        );
    }
    selection_results
}

/// Appends the properties of one raw object to `selection_results`. Missing
/// properties contribute nothing, subgraphs only return the fields they own.
pub fn merge_selection_results(
    selection_set: &SelectionSet,
    subgraph: &str,
    value: &Value,
    selection_results: &mut [SelectionData],
) {
    if !value.is_object() {
        return;
    }

    for (selection, selection_data) in selection_set
        .selections
        .iter()
        .zip(selection_results.iter_mut())
    {
        if let Some(field) = value.get(selection.response_name.as_str()) {
            *selection_data = std::mem::take(selection_data).add_result(subgraph, field.clone());
        }
    }
}

fn report_anchored_errors(
    ctx: &mut FusionExecutionContext<'_>,
    error_trie: Option<&ErrorTrie>,
    path: &ResponsePath,
) -> bool {
    let errors = error_trie.map(ErrorTrie::errors).unwrap_or_default();
    for error in errors {
        report_error(ctx, error, path);
    }
    !errors.is_empty()
}

/// Reports the first error found at or below `path`, if any.
fn report_first_error(
    ctx: &mut FusionExecutionContext<'_>,
    error_trie: Option<&ErrorTrie>,
    path: &ResponsePath,
) -> bool {
    match error_trie.and_then(ErrorTrie::first_error) {
        Some(error) => {
            report_error(ctx, error, path);
            true
        }
        None => false,
    }
}

fn report_error(ctx: &mut FusionExecutionContext<'_>, error: &GraphQLError, path: &ResponsePath) {
    ctx.result.add_error(error.clone().with_path(path.clone()));
}

fn report_non_null_violation(
    ctx: &mut FusionExecutionContext<'_>,
    owner_type: &str,
    selection: &Selection,
    path: &ResponsePath,
) {
    let error = GraphQLError::from(format!(
        "Cannot return null for non-nullable field {}.{}.",
        owner_type, selection.field_name
    ));
    ctx.result.add_error(error.with_path(path.clone()));
}

pub(crate) fn child_path(path: &ResponsePath, segment: GraphQLErrorPathSegment) -> ResponsePath {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment);
    child
}

pub(crate) fn format_path(path: &ResponsePath) -> String {
    path.iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
