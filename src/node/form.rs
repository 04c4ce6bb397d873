use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A single property-editor field, in the `{ "defaultValue": ... }` shape the forms bind to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "defaultValue")]
    pub default_value: Value,
}

#[derive(Serialize)]
struct FieldRef<'a> {
    #[serde(rename = "defaultValue")]
    default_value: &'a Value,
}

/// The UI-shaped configuration of a node, keyed by field name in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeForm {
    fields: Map<String, Value>,
}

impl Serialize for NodeForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.fields
                .iter()
                .map(|(key, value)| (key, FieldRef { default_value: value })),
        )
    }
}

impl<'de> Deserialize<'de> for NodeForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut fields = Map::new();
        for (key, value) in raw {
            let field: FormField = serde_json::from_value(value).map_err(D::Error::custom)?;
            fields.insert(key, field.default_value);
        }
        Ok(Self { fields })
    }
}

impl NodeForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps every entry of a plain config map into a form field.
    pub fn from_config(config: Map<String, Value>) -> Self {
        Self { fields: config }
    }

    /// Unwraps the form back into a plain config map.
    pub fn to_config(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Length of an array-valued field, zero when absent or not an array.
    pub fn array_len(&self, key: &str) -> usize {
        self.get(key)
            .and_then(Value::as_array)
            .map_or(0, |items| items.len())
    }

    /// Reads a string nested one object level down, e.g. `error_handle.method`.
    pub fn nested_str(&self, key: &str, field: &str) -> Option<&str> {
        self.get(key)?.get(field)?.as_str()
    }
}
