use indexmap::IndexMap;

use crate::response::graphql_error::GraphQLError;

/// Subgraph errors indexed by their response path.
///
/// Field names and list indices are both stored as string keys, so `["a", 0]`
/// and `["a", "0"]` address the same node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorTrie {
    children: IndexMap<String, ErrorTrie>,
    errors: Vec<GraphQLError>,
}

impl ErrorTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a trie from a flat error list. Errors without a path are anchored at the root.
    pub fn from_errors<I>(errors: I) -> Self
    where
        I: IntoIterator<Item = GraphQLError>,
    {
        let mut trie = ErrorTrie::new();
        for error in errors {
            trie.insert(error);
        }
        trie
    }

    /// One identical error for every given response name, used when a whole
    /// subgraph call failed.
    pub fn from_selections<'a, I>(error: &GraphQLError, response_names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut trie = ErrorTrie::new();
        for response_name in response_names {
            trie.children
                .entry(response_name.to_string())
                .or_default()
                .errors
                .push(error.clone());
        }
        trie
    }

    pub fn insert(&mut self, error: GraphQLError) {
        let mut node = self;
        if let Some(path) = &error.path {
            for segment in path {
                node = node.children.entry(segment.as_trie_key()).or_default();
            }
        }
        node.errors.push(error);
    }

    pub fn child(&self, key: &str) -> Option<&ErrorTrie> {
        self.children.get(key)
    }

    /// Errors anchored exactly at this node.
    pub fn errors(&self) -> &[GraphQLError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.children.values().all(ErrorTrie::is_empty)
    }

    /// Any error at or below this node.
    pub fn first_error(&self) -> Option<&GraphQLError> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Some(error) = node.errors.first() {
                return Some(error);
            }
            stack.extend(node.children.values().rev());
        }
        None
    }

    /// Walks `path` and returns the error of the nearest node on the way that has
    /// errors of its own. Falls back to the errors anchored at this node when no
    /// node along the (possibly partial) walk has any.
    pub fn first_error_on_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&GraphQLError> {
        let mut node = self;
        for segment in path {
            match node.children.get(segment.as_ref()) {
                Some(child) => {
                    if let Some(error) = child.errors.first() {
                        return Some(error);
                    }
                    node = child;
                }
                None => break,
            }
        }
        self.errors.first()
    }

    /// Walks the full `path` and searches everything below its end.
    /// Returns `None` when the path does not exist in the trie.
    pub fn first_error_below_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&GraphQLError> {
        let mut node = self;
        for segment in path {
            node = node.children.get(segment.as_ref())?;
        }
        node.first_error()
    }

    pub fn merge(&mut self, other: ErrorTrie) {
        self.errors.extend(other.errors);
        for (key, child) in other.children {
            self.children.entry(key).or_default().merge(child);
        }
    }

    /// Splits off the subtree at `path`. Errors that cannot be attributed to a
    /// position inside that subtree (anchored above it, on sibling branches or
    /// at the subtree root itself) are returned separately.
    pub fn split_at_path<S: AsRef<str>>(mut self, path: &[S]) -> (ErrorTrie, Vec<GraphQLError>) {
        let mut unattributed = Vec::new();
        for segment in path {
            let child = self.children.shift_remove(segment.as_ref());
            self.drain_into(&mut unattributed);
            match child {
                Some(child) => self = child,
                None => return (ErrorTrie::new(), unattributed),
            }
        }
        unattributed.append(&mut self.errors);
        (self, unattributed)
    }

    fn drain_into(self, errors: &mut Vec<GraphQLError>) {
        let mut stack = vec![self];
        while let Some(mut node) = stack.pop() {
            errors.append(&mut node.errors);
            stack.extend(node.children.into_values().rev());
        }
    }
}
