use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use ahash::{HashMap, HashSet};

use crate::{
    execution::{error::ExecutionError, error_trie::ErrorTrie, selection_data::SelectionData},
    operation::{value::ValueLiteral, SelectionSetId},
    response::{graphql_error::GraphQLErrorPathSegment, result::ObjectResultId},
};

pub type ResponsePath = Vec<GraphQLErrorPathSegment>;

/// One object of a selection set that still waits for subgraph data before
/// it can be composed.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub selection_set: SelectionSetId,
    /// Index-aligned with the selections of `selection_set`.
    pub selection_results: Vec<SelectionData>,
    pub target: ObjectResultId,
    pub path: ResponsePath,
    /// Data already known for this object, usually from the parent's response.
    pub seed: Option<SelectionData>,
    pub variable_values: BTreeMap<String, ValueLiteral>,
    pub export_keys: Vec<String>,
    pub error_trie: Option<ErrorTrie>,
}

impl WorkItem {
    pub fn new(
        selection_set: SelectionSetId,
        size: usize,
        target: ObjectResultId,
        path: ResponsePath,
    ) -> Self {
        WorkItem {
            selection_set,
            selection_results: vec![SelectionData::default(); size],
            target,
            path,
            seed: None,
            variable_values: BTreeMap::new(),
            export_keys: Vec::new(),
            error_trie: None,
        }
    }

    pub fn with_seed(mut self, seed: SelectionData) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_export_keys(mut self, export_keys: &[String]) -> Self {
        self.export_keys = export_keys.to_vec();
        self
    }

    /// True while some export key of the selection set has no bound value yet.
    pub fn has_unbound_exports(&self) -> bool {
        self.export_keys
            .iter()
            .any(|key| !self.variable_values.contains_key(key))
    }

    pub fn with_error_trie(mut self, error_trie: Option<ErrorTrie>) -> Self {
        self.error_trie = error_trie;
        self
    }

    pub fn merge_error_trie(&mut self, error_trie: ErrorTrie) {
        if error_trie.is_empty() {
            return;
        }
        match &mut self.error_trie {
            Some(existing) => existing.merge(error_trie),
            None => self.error_trie = Some(error_trie),
        }
    }
}

#[derive(Debug, Default)]
struct PendingWork {
    items: Vec<WorkItem>,
    sealed: bool,
}

#[derive(Debug, Default)]
struct StateRegistry {
    pending: HashMap<SelectionSetId, Arc<Mutex<PendingWork>>>,
    immutable: HashSet<SelectionSetId>,
}

/// Pending work shared between fetch continuations.
///
/// The registry lock only guards the map itself; items are appended under the
/// per selection set lock. Reading the state of a selection set seals it, after
/// which no more work can be registered for it.
#[derive(Debug, Default)]
pub struct ExecutionState {
    registry: Mutex<StateRegistry>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the pending work of `selection_set` and seals it, even when nothing
    /// was registered.
    pub fn try_get_state(&self, selection_set: SelectionSetId) -> Option<Vec<WorkItem>> {
        let pending = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.immutable.insert(selection_set);
            registry.pending.get(&selection_set).cloned()
        }?;

        let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.sealed = true;
        if pending.items.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut pending.items))
        }
    }

    pub fn register_state(&self, item: WorkItem) -> Result<(), ExecutionError> {
        let selection_set = item.selection_set;
        match self.push(item) {
            true => Ok(()),
            false => Err(ExecutionError::ImmutableSelectionSet(selection_set)),
        }
    }

    /// Like [`ExecutionState::register_state`], but drops the item when the
    /// selection set was already consumed. Returns whether it was registered.
    pub fn try_register_state(&self, item: WorkItem) -> bool {
        self.push(item)
    }

    pub fn is_immutable(&self, selection_set: SelectionSetId) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .immutable
            .contains(&selection_set)
    }

    pub fn contains_state(&self, selection_set: SelectionSetId) -> bool {
        let pending = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .get(&selection_set)
            .cloned();

        pending.is_some_and(|pending| {
            !pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .items
                .is_empty()
        })
    }

    fn push(&self, item: WorkItem) -> bool {
        let pending = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            if registry.immutable.contains(&item.selection_set) {
                return false;
            }
            registry
                .pending
                .entry(item.selection_set)
                .or_default()
                .clone()
        };

        let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
        // sealed between releasing the registry lock and getting here
        if pending.sealed {
            return false;
        }
        pending.items.push(item);
        true
    }
}
