use std::collections::HashMap;

use fusion_config::TypeMappingConfig;

/// Type names as known by the gateway, keyed by the subgraph that uses them.
///
/// Subgraphs may expose a gateway type under a different name. Types without
/// an explicit mapping are assumed to share the gateway name.
#[derive(Debug, Default, Clone)]
pub struct SchemaMetadata {
    type_mappings: HashMap<String, HashMap<String, String>>,
}

impl SchemaMetadata {
    pub fn new(type_mappings: HashMap<String, HashMap<String, String>>) -> Self {
        SchemaMetadata { type_mappings }
    }

    pub fn from_type_mappings(type_mappings: &[TypeMappingConfig]) -> Self {
        let mut metadata = SchemaMetadata::default();
        for mapping in type_mappings {
            metadata.add_type_mapping(
                &mapping.subgraph,
                &mapping.subgraph_type,
                &mapping.gateway_type,
            );
        }
        metadata
    }

    pub fn add_type_mapping(&mut self, subgraph: &str, subgraph_type: &str, gateway_type: &str) {
        self.type_mappings
            .entry(subgraph.to_string())
            .or_default()
            .insert(subgraph_type.to_string(), gateway_type.to_string());
    }

    pub fn gateway_type_name<'a>(&'a self, subgraph: &str, subgraph_type: &'a str) -> &'a str {
        self.type_mappings
            .get(subgraph)
            .and_then(|types| types.get(subgraph_type))
            .map(String::as_str)
            .unwrap_or(subgraph_type)
    }

    pub fn subgraph_type_name<'a>(&'a self, subgraph: &str, gateway_type: &'a str) -> &'a str {
        self.type_mappings
            .get(subgraph)
            .and_then(|types| {
                types
                    .iter()
                    .find(|(_, gateway)| gateway.as_str() == gateway_type)
                    .map(|(subgraph_type, _)| subgraph_type.as_str())
            })
            .unwrap_or(gateway_type)
    }
}
