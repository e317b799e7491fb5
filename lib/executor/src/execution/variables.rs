use std::collections::BTreeMap;

use sonic_rs::{JsonValueTrait, Value};
use tracing::trace;

use crate::{
    operation::{value::ValueLiteral, SelectionSetId},
    plan::QueryPlan,
};

/// Binds every export key of `selection_set` that is not bound yet and can be
/// found in one of the given values. The first value that has the key wins.
pub fn extract_variables<'v, I>(
    plan: &QueryPlan,
    selection_set: SelectionSetId,
    values: I,
    variables: &mut BTreeMap<String, ValueLiteral>,
) where
    I: IntoIterator<Item = &'v Value>,
    I::IntoIter: Clone,
{
    let values = values.into_iter();
    for key in plan.get_export_keys(selection_set) {
        if variables.contains_key(key) {
            continue;
        }

        let path = plan.get_export_path(selection_set, key);
        if let Some(value) = values.clone().find_map(|value| lookup_path(value, &path)) {
            trace!(key = %key, "bound export variable");
            variables.insert(key.clone(), ValueLiteral::from_json(value));
        }
    }
}

fn lookup_path<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter()
        .try_fold(value, |current, segment| current.get(*segment))
}
