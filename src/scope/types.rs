use crate::node::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_variable_types {
    ( $( ($variant:ident, $tag:literal) ),* $(,)? ) => {
        /// Data type of a referenceable variable, as the backend spells it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum VariableType {
            $( $variant, )*
            /// The type could not be determined.
            Any,
        }

        impl VariableType {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( VariableType::$variant => $tag, )*
                    VariableType::Any => "any",
                }
            }

            /// Parses a backend type tag; anything unrecognised is `Any`.
            pub fn parse(tag: &str) -> VariableType {
                match tag.trim() {
                    $( $tag => VariableType::$variant, )*
                    _ => VariableType::Any,
                }
            }
        }
    };
}

define_variable_types! {
    (String, "string"),
    (Number, "number"),
    (Boolean, "boolean"),
    (Object, "object"),
    (File, "file"),
    (ArrayString, "array[string]"),
    (ArrayNumber, "array[number]"),
    (ArrayBoolean, "array[boolean]"),
    (ArrayObject, "array[object]"),
    (ArrayFile, "array[file]"),
    (ArrayNest, "array_nest"),
}

impl VariableType {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            VariableType::ArrayString
                | VariableType::ArrayNumber
                | VariableType::ArrayBoolean
                | VariableType::ArrayObject
                | VariableType::ArrayFile
                | VariableType::ArrayNest
        )
    }

    /// The type of one element, one array level down.
    pub fn element_type(&self) -> VariableType {
        match self {
            VariableType::ArrayString => VariableType::String,
            VariableType::ArrayNumber => VariableType::Number,
            VariableType::ArrayBoolean => VariableType::Boolean,
            VariableType::ArrayObject => VariableType::Object,
            VariableType::ArrayFile => VariableType::File,
            _ => VariableType::Any,
        }
    }
}

impl From<String> for VariableType {
    fn from(tag: String) -> Self {
        VariableType::parse(&tag)
    }
}

impl From<VariableType> for String {
    fn from(ty: VariableType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The node a variable comes from, for grouping in the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: String,
    pub name: String,
    /// `None` for conversation variables, which belong to no node.
    #[serde(rename = "type")]
    pub kind: Option<NodeKind>,
}

/// One entry of the variable picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub key: String,
    pub label: String,
    #[serde(rename = "dataType")]
    pub data_type: VariableType,
    /// Dotted reference inserted into templates, e.g. `llm_1.output`.
    pub value: String,
    #[serde(rename = "nodeData")]
    pub node: NodeRef,
}

impl Variable {
    pub fn new(namespace: &str, field: &str, data_type: VariableType, node: NodeRef) -> Self {
        Self {
            key: format!("{}_{}", namespace, field),
            label: field.to_string(),
            data_type,
            value: format!("{}.{}", namespace, field),
            node,
        }
    }
}

/// Normalises a template selector such as `{{ llm_1.output }}` to `llm_1.output`.
///
/// Returns `None` when the text is not a dotted reference.
pub fn parse_selector(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed);
    let (namespace, field) = inner.split_once('.')?;
    let well_formed =
        !namespace.is_empty() && !field.is_empty() && !inner.contains(char::is_whitespace);
    well_formed.then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_unwraps_one_level() {
        assert_eq!(VariableType::ArrayObject.element_type(), VariableType::Object);
        assert_eq!(VariableType::ArrayNest.element_type(), VariableType::Any);
        assert_eq!(VariableType::String.element_type(), VariableType::Any);
    }

    #[test]
    fn unknown_type_tag_is_any() {
        assert_eq!(VariableType::parse("array[string]"), VariableType::ArrayString);
        assert_eq!(VariableType::parse("tensor"), VariableType::Any);
    }

    #[test]
    fn selectors_are_normalised() {
        assert_eq!(parse_selector("{{ llm_1.output }}"), Some("llm_1.output"));
        assert_eq!(parse_selector("{{sys.message}}"), Some("sys.message"));
        assert_eq!(parse_selector("conv.topic"), Some("conv.topic"));
        assert_eq!(parse_selector("hello world"), None);
        assert_eq!(parse_selector("{{ .x }}"), None);
    }
}
