//! The query plan consumed by the executor: a DAG of fetch nodes, each bound to the
//! selection set it populates, plus the export keys that thread data from one
//! fetch into the variables of another.
use std::fmt;

use ahash::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::{execution::error::ExecutionError, operation::SelectionSetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNode {
    pub id: NodeId,
    pub subgraph: String,
    pub selection_set: SelectionSetId,
    pub document: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    /// Location of the selection set's object inside the subgraph's `data`.
    #[serde(default)]
    pub path: Vec<String>,
    /// Export keys bound as variables of this request.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Operation variables passed through to the subgraph unchanged.
    #[serde(default)]
    pub forwarded_variables: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    /// Response names of the selections this node resolves. Empty means all of them.
    #[serde(default)]
    pub response_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDefinition {
    /// The selection set whose data carries the value.
    pub selection_set: SelectionSetId,
    pub key: String,
    #[serde(default)]
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "QueryPlanDefinition")]
pub struct QueryPlan {
    pub nodes: Vec<ExecutionNode>,
    pub exports: Vec<ExportDefinition>,
    #[serde(skip)]
    export_keys: HashMap<SelectionSetId, Vec<String>>,
}

#[derive(Deserialize)]
struct QueryPlanDefinition {
    nodes: Vec<ExecutionNode>,
    #[serde(default)]
    exports: Vec<ExportDefinition>,
}

impl From<QueryPlanDefinition> for QueryPlan {
    fn from(definition: QueryPlanDefinition) -> Self {
        QueryPlan::new(definition.nodes, definition.exports)
    }
}

impl QueryPlan {
    pub fn new(nodes: Vec<ExecutionNode>, exports: Vec<ExportDefinition>) -> Self {
        let mut export_keys: HashMap<SelectionSetId, Vec<String>> = HashMap::default();
        for export in &exports {
            export_keys
                .entry(export.selection_set)
                .or_default()
                .push(export.key.clone());
        }

        QueryPlan {
            nodes,
            exports,
            export_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&ExecutionNode, ExecutionError> {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .ok_or(ExecutionError::UnknownNode(id))
    }

    pub fn get_nodes(
        &self,
        selection_set: SelectionSetId,
    ) -> impl Iterator<Item = &ExecutionNode> + '_ {
        self.nodes
            .iter()
            .filter(move |node| node.selection_set == selection_set)
    }

    /// Nodes not yet completed whose dependencies are all completed.
    pub fn get_next_nodes<'a>(
        &'a self,
        completed: &'a HashSet<NodeId>,
    ) -> impl Iterator<Item = &'a ExecutionNode> + 'a {
        self.nodes.iter().filter(move |node| {
            !completed.contains(&node.id)
                && node
                    .dependencies
                    .iter()
                    .all(|dependency| completed.contains(dependency))
        })
    }

    pub fn has_nodes(&self, selection_set: SelectionSetId) -> bool {
        self.get_nodes(selection_set).next().is_some()
    }

    pub fn get_export_keys(&self, selection_set: SelectionSetId) -> &[String] {
        self.export_keys
            .get(&selection_set)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Path of an export key inside the selection set's data, `[key]` when not configured.
    pub fn get_export_path<'a>(
        &'a self,
        selection_set: SelectionSetId,
        key: &'a str,
    ) -> Vec<&'a str> {
        self.exports
            .iter()
            .find(|export| export.selection_set == selection_set && export.key == key)
            .filter(|export| !export.path.is_empty())
            .map(|export| export.path.iter().map(String::as_str).collect())
            .unwrap_or_else(|| vec![key])
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "QueryPlan {{")?;
        for node in &self.nodes {
            write!(
                f,
                "  Fetch(id: {}, service: {:?}, selectionSet: {}",
                node.id, node.subgraph, node.selection_set
            )?;
            if !node.dependencies.is_empty() {
                let dependencies: Vec<String> =
                    node.dependencies.iter().map(|d| d.to_string()).collect();
                write!(f, ", dependsOn: [{}]", dependencies.join(", "))?;
            }
            if !node.requires.is_empty() {
                write!(f, ", requires: [{}]", node.requires.join(", "))?;
            }
            writeln!(f, ")")?;
        }
        write!(f, "}}")
    }
}
