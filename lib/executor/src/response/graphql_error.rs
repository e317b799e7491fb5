use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sonic_rs::Value;
use std::{collections::BTreeMap, fmt};

pub type GraphQLErrorExtensions = BTreeMap<String, Value>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<GraphQLErrorPathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<GraphQLErrorExtensions>,
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

impl GraphQLError {
    pub fn with_path(mut self, path: Vec<GraphQLErrorPathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_code(self, code: &str) -> Self {
        self.with_extension_if_absent("code", code)
    }

    pub fn add_subgraph_name(self, subgraph_name: &str) -> Self {
        self.with_extension_if_absent("serviceName", subgraph_name)
    }

    fn with_extension_if_absent(mut self, key: &str, value: &str) -> Self {
        let extensions = self.extensions.get_or_insert_with(BTreeMap::new);
        if !extensions.contains_key(key) {
            extensions.insert(key.to_string(), Value::from(value));
        }
        self
    }

    pub fn code(&self) -> Option<&str> {
        use sonic_rs::JsonValueTrait;

        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(|code| code.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

impl GraphQLErrorPathSegment {
    /// The key of this segment inside an `ErrorTrie`.
    pub fn as_trie_key(&self) -> String {
        match self {
            GraphQLErrorPathSegment::String(name) => name.clone(),
            GraphQLErrorPathSegment::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for GraphQLErrorPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphQLErrorPathSegment::String(name) => write!(f, "{}", name),
            GraphQLErrorPathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl Serialize for GraphQLErrorPathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            GraphQLErrorPathSegment::String(name) => serializer.serialize_str(name),
            GraphQLErrorPathSegment::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl<'de> Deserialize<'de> for GraphQLErrorPathSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathSegmentVisitor;

        impl<'de> de::Visitor<'de> for PathSegmentVisitor {
            type Value = GraphQLErrorPathSegment;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or an integer for a GraphQL path segment")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(E::custom(format!(
                        "path segment must be a non-negative integer, but got {}",
                        value
                    )));
                }
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }
        }

        deserializer.deserialize_any(PathSegmentVisitor)
    }
}
