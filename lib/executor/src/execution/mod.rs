pub mod compose;
pub mod error;
pub mod error_trie;
pub mod fetch;
pub mod plan;
pub mod selection_data;
pub mod state;
pub mod variables;
