use bytes::BufMut;
use sonic_rs::Value;
use tracing::trace;

use crate::{
    json_writer::{write_and_escape_string, write_json_value},
    response::graphql_error::GraphQLError,
    utils::consts::{
        CLOSE_BRACE, CLOSE_BRACKET, COLON, COMMA, NULL, OPEN_BRACE, OPEN_BRACKET, QUOTE,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectResultId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListResultId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRef {
    Object(ObjectResultId),
    List(ListResultId),
}

/// The content of one positional slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultValue {
    /// Never written, for example because the selection was excluded. Omitted from the output.
    #[default]
    Unset,
    Null,
    Leaf(Value),
    Object(ObjectResultId),
    List(ListResultId),
}

impl ResultValue {
    pub fn container(&self) -> Option<ResultRef> {
        match self {
            ResultValue::Object(id) => Some(ResultRef::Object(*id)),
            ResultValue::List(id) => Some(ResultRef::List(*id)),
            _ => None,
        }
    }
}

/// Where a container is placed inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultParent {
    Root,
    Field { object: ObjectResultId, index: usize },
    Item { list: ListResultId, index: usize },
}

#[derive(Debug, Clone, Default)]
struct FieldResult {
    response_name: String,
    value: ResultValue,
    nullable: bool,
}

#[derive(Debug)]
struct ObjectResult {
    type_name: String,
    fields: Vec<FieldResult>,
    parent: ResultParent,
    invalidated: bool,
}

#[derive(Debug)]
struct ListResult {
    items: Vec<ResultValue>,
    item_nullable: bool,
    parent: ResultParent,
    invalidated: bool,
}

/// Arena of pre-sized result containers that composition writes into positionally.
///
/// Containers remember their parent slot, so a non-null violation discovered while
/// composing a subtree in a later fetch cycle can still nullify the nearest nullable
/// ancestor.
#[derive(Debug, Default)]
pub struct ResultBuilder {
    objects: Vec<ObjectResult>,
    lists: Vec<ListResult>,
    root: Option<ObjectResultId>,
    data_is_null: bool,
    errors: Vec<GraphQLError>,
}

impl ResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root(&mut self, type_name: &str, size: usize) -> ObjectResultId {
        let root = self.create_object(type_name, size, ResultParent::Root);
        self.root = Some(root);
        root
    }

    pub fn root(&self) -> Option<ObjectResultId> {
        self.root
    }

    pub fn create_object(
        &mut self,
        type_name: &str,
        size: usize,
        parent: ResultParent,
    ) -> ObjectResultId {
        let id = ObjectResultId(self.objects.len());
        self.objects.push(ObjectResult {
            type_name: type_name.to_string(),
            fields: vec![FieldResult::default(); size],
            parent,
            invalidated: false,
        });
        id
    }

    pub fn create_list(
        &mut self,
        len: usize,
        item_nullable: bool,
        parent: ResultParent,
    ) -> ListResultId {
        let id = ListResultId(self.lists.len());
        self.lists.push(ListResult {
            items: vec![ResultValue::Unset; len],
            item_nullable,
            parent,
            invalidated: false,
        });
        id
    }

    pub fn set_field(
        &mut self,
        object: ObjectResultId,
        index: usize,
        response_name: &str,
        value: ResultValue,
        nullable: bool,
    ) {
        let field = &mut self.objects[object.0].fields[index];
        if field.response_name != response_name {
            field.response_name = response_name.to_string();
        }
        field.value = value;
        field.nullable = nullable;
    }

    pub fn field_value(&self, object: ObjectResultId, index: usize) -> &ResultValue {
        &self.objects[object.0].fields[index].value
    }

    pub fn set_item(&mut self, list: ListResultId, index: usize, value: ResultValue) {
        self.lists[list.0].items[index] = value;
    }

    pub fn is_invalidated(&self, result: ResultRef) -> bool {
        match result {
            ResultRef::Object(id) => self.objects[id.0].invalidated,
            ResultRef::List(id) => self.lists[id.0].invalidated,
        }
    }

    pub fn is_data_null(&self) -> bool {
        self.data_is_null
    }

    /// Nullifies `from` and walks up until a nullable slot absorbs the null.
    /// Reaching the root turns the whole `data` into `null`.
    pub fn propagate_null(&mut self, from: ResultRef) {
        let mut current = from;
        loop {
            let parent = match current {
                ResultRef::Object(id) => {
                    let object = &mut self.objects[id.0];
                    object.invalidated = true;
                    object.parent
                }
                ResultRef::List(id) => {
                    let list = &mut self.lists[id.0];
                    list.invalidated = true;
                    list.parent
                }
            };

            match parent {
                ResultParent::Root => {
                    self.data_is_null = true;
                    return;
                }
                ResultParent::Field { object, index } => {
                    let parent = &mut self.objects[object.0];
                    let field = &mut parent.fields[index];
                    if field.nullable {
                        trace!(
                            type_name = %parent.type_name,
                            field = %field.response_name,
                            "null absorbed by nullable field"
                        );
                        field.value = ResultValue::Null;
                        return;
                    }
                    current = ResultRef::Object(object);
                }
                ResultParent::Item { list, index } => {
                    let list_result = &mut self.lists[list.0];
                    if list_result.item_nullable {
                        list_result.items[index] = ResultValue::Null;
                        return;
                    }
                    current = ResultRef::List(list);
                }
            }
        }
    }

    pub fn add_error(&mut self, error: GraphQLError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[GraphQLError] {
        &self.errors
    }

    /// Serializes the composed tree as a GraphQL response body.
    pub fn into_response(self) -> Result<Vec<u8>, sonic_rs::Error> {
        let mut buffer = Vec::with_capacity(1024);
        buffer.put(OPEN_BRACE);
        buffer.put(QUOTE);
        buffer.put("data".as_bytes());
        buffer.put(QUOTE);
        buffer.put(COLON);

        match self.root {
            Some(root) if !self.data_is_null => self.write_object(&mut buffer, root),
            _ => buffer.put(NULL),
        }

        if !self.errors.is_empty() {
            buffer.put(COMMA);
            buffer.put(QUOTE);
            buffer.put("errors".as_bytes());
            buffer.put(QUOTE);
            buffer.put(COLON);
            buffer.put_slice(&sonic_rs::to_vec(&self.errors)?);
        }

        buffer.put(CLOSE_BRACE);
        Ok(buffer)
    }

    fn write_object(&self, buffer: &mut Vec<u8>, id: ObjectResultId) {
        let object = &self.objects[id.0];
        if object.invalidated {
            buffer.put(NULL);
            return;
        }

        buffer.put(OPEN_BRACE);
        let mut first = true;
        for field in &object.fields {
            if field.value == ResultValue::Unset {
                continue;
            }
            if !first {
                buffer.put(COMMA);
            }
            first = false;
            write_and_escape_string(buffer, &field.response_name);
            buffer.put(COLON);
            self.write_value(buffer, &field.value);
        }
        buffer.put(CLOSE_BRACE);
    }

    fn write_list(&self, buffer: &mut Vec<u8>, id: ListResultId) {
        let list = &self.lists[id.0];
        if list.invalidated {
            buffer.put(NULL);
            return;
        }

        buffer.put(OPEN_BRACKET);
        for (index, item) in list.items.iter().enumerate() {
            if index > 0 {
                buffer.put(COMMA);
            }
            self.write_value(buffer, item);
        }
        buffer.put(CLOSE_BRACKET);
    }

    fn write_value(&self, buffer: &mut Vec<u8>, value: &ResultValue) {
        match value {
            ResultValue::Unset | ResultValue::Null => buffer.put(NULL),
            ResultValue::Leaf(value) => write_json_value(buffer, value),
            ResultValue::Object(id) => self.write_object(buffer, *id),
            ResultValue::List(id) => self.write_list(buffer, *id),
        }
    }
}
