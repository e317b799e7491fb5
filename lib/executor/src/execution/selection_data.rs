use sonic_rs::{JsonValueTrait, Value};

use crate::utils::consts::TYPENAME_FIELD_NAME;

/// A raw JSON value together with the subgraph that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonFragment {
    pub subgraph: String,
    pub value: Value,
}

impl JsonFragment {
    pub fn new(subgraph: &str, value: Value) -> Self {
        JsonFragment {
            subgraph: subgraph.to_string(),
            value,
        }
    }
}

/// Everything the subgraphs returned for one selection at one response position.
///
/// Several subgraphs may contribute to the same position, in which case the
/// fragments are kept in arrival order and the first non-null one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionData {
    #[default]
    Empty,
    Single(JsonFragment),
    Multiple(Vec<JsonFragment>),
}

impl SelectionData {
    pub fn new(subgraph: &str, value: Value) -> Self {
        SelectionData::Single(JsonFragment::new(subgraph, value))
    }

    pub fn has_value(&self) -> bool {
        !matches!(self, SelectionData::Empty)
    }

    /// Returns the aggregate with one more fragment appended.
    #[must_use]
    pub fn add_result(self, subgraph: &str, value: Value) -> Self {
        let fragment = JsonFragment::new(subgraph, value);
        match self {
            SelectionData::Empty => SelectionData::Single(fragment),
            SelectionData::Single(first) => SelectionData::Multiple(vec![first, fragment]),
            SelectionData::Multiple(mut fragments) => {
                fragments.push(fragment);
                SelectionData::Multiple(fragments)
            }
        }
    }

    pub fn fragments(&self) -> &[JsonFragment] {
        match self {
            SelectionData::Empty => &[],
            SelectionData::Single(fragment) => std::slice::from_ref(fragment),
            SelectionData::Multiple(fragments) => fragments,
        }
    }

    /// True when every contributing fragment is `null`.
    pub fn is_null(&self) -> bool {
        self.fragments()
            .iter()
            .all(|fragment| fragment.value.is_null())
    }

    /// The first fragment carrying a non-null value.
    pub fn first_value(&self) -> Option<&JsonFragment> {
        self.fragments()
            .iter()
            .find(|fragment| !fragment.value.is_null())
    }

    /// `__typename` as reported by the first non-null fragment.
    pub fn type_name(&self) -> Option<&str> {
        self.first_value()
            .and_then(|fragment| fragment.value.get(TYPENAME_FIELD_NAME))
            .and_then(|type_name| type_name.as_str())
    }

    pub fn subgraph(&self) -> Option<&str> {
        self.first_value().map(|fragment| fragment.subgraph.as_str())
    }
}
