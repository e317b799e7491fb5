//! The executable operation as handed over by the planner: a flat table of selection
//! sets, each addressed by a stable [`SelectionSetId`].
use std::{collections::HashMap, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sonic_rs::{JsonValueTrait, Value};

use crate::{execution::error::ExecutionError, utils::consts::TYPENAME_FIELD_NAME};

pub mod value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSetId(pub u32);

impl fmt::Display for SelectionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: OperationKind,
    pub root_selection_set: SelectionSetId,
    pub selection_sets: Vec<SelectionSet>,
}

impl Operation {
    pub fn selection_set(&self, id: SelectionSetId) -> Result<&SelectionSet, ExecutionError> {
        self.selection_sets
            .get(id.0 as usize)
            .filter(|selection_set| selection_set.id == id)
            .or_else(|| self.selection_sets.iter().find(|s| s.id == id))
            .ok_or(ExecutionError::UnknownSelectionSet(id))
    }

    pub fn root(&self) -> Result<&SelectionSet, ExecutionError> {
        self.selection_set(self.root_selection_set)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSet {
    pub id: SelectionSetId,
    /// The concrete object type this selection set is evaluated against.
    pub type_name: String,
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    pub fn response_names(&self) -> impl Iterator<Item = &str> {
        self.selections.iter().map(|s| s.response_name.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Scalar,
    Enum,
    Object,
    Interface,
    Union,
}

impl TypeKind {
    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Union)
    }
}

/// A field type in GraphQL notation, serialized as e.g. `"[User!]!"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }

    pub fn non_null(self) -> Self {
        TypeRef::NonNull(Box::new(self))
    }

    pub fn list(self) -> Self {
        TypeRef::List(Box::new(self))
    }

    pub fn is_nullable(&self) -> bool {
        !matches!(self, TypeRef::NonNull(_))
    }

    pub fn nullable_type(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => &**inner,
            other => other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable_type(), TypeRef::List(_))
    }

    /// The element type of a (possibly non-null) list type.
    pub fn list_element(&self) -> Option<&TypeRef> {
        match self.nullable_type() {
            TypeRef::List(inner) => Some(&**inner),
            _ => None,
        }
    }

    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name.as_str(),
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('!') {
            let inner = inner.parse::<TypeRef>()?;
            return match inner {
                TypeRef::NonNull(_) => Err(format!("Invalid type \"{}\"", s)),
                inner => Ok(inner.non_null()),
            };
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Ok(inner.parse::<TypeRef>()?.list());
        }
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("Invalid type \"{}\"", s));
        }
        Ok(TypeRef::named(s))
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Literal(bool),
    Variable(String),
}

impl ConditionValue {
    fn evaluate(&self, variables: &HashMap<String, Value>) -> bool {
        match self {
            ConditionValue::Literal(value) => *value,
            ConditionValue::Variable(name) => variables
                .get(name)
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
        }
    }
}

/// `@skip` / `@include` attached to a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeCondition {
    #[serde(default)]
    pub skip: Option<ConditionValue>,
    #[serde(default)]
    pub include: Option<ConditionValue>,
}

impl IncludeCondition {
    pub fn is_included(&self, variables: &HashMap<String, Value>) -> bool {
        if let Some(skip) = &self.skip {
            if skip.evaluate(variables) {
                return false;
            }
        }

        match &self.include {
            Some(include) => include.evaluate(variables),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub response_name: String,
    pub field_name: String,
    pub field_type: TypeRef,
    pub type_kind: TypeKind,
    #[serde(default)]
    pub include: Option<IncludeCondition>,
    /// The value is a subgraph-local identifier that has to be turned into a gateway ID.
    #[serde(default)]
    pub needs_id_reencode: bool,
    /// Concrete type name -> selection set evaluated for values of that type.
    #[serde(default)]
    pub selection_sets: IndexMap<String, SelectionSetId>,
}

impl Selection {
    pub fn is_typename(&self) -> bool {
        self.field_name == TYPENAME_FIELD_NAME
    }

    pub fn is_included(&self, variables: &HashMap<String, Value>) -> bool {
        self.include
            .as_ref()
            .map_or(true, |condition| condition.is_included(variables))
    }

    pub fn is_nullable(&self) -> bool {
        self.field_type.is_nullable()
    }

    pub fn selection_set_for(&self, type_name: &str) -> Result<SelectionSetId, ExecutionError> {
        self.selection_sets.get(type_name).copied().ok_or_else(|| {
            ExecutionError::MissingSelectionSetForType {
                response_name: self.response_name.clone(),
                type_name: type_name.to_string(),
            }
        })
    }
}
