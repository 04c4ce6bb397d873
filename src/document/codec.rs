//! Per-kind reshaping between the backend's flat node config and the editor's form fields.
//!
//! Each [`ConfigCodec`] owns one field convention. `decode` runs on load, `encode` is its
//! exact inverse and runs on save. Which codecs apply is decided by an exhaustive match on
//! [`NodeKind`], so adding a kind forces a decision here.

use crate::node::{NodeForm, NodeKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

/// A reversible transform over a node's config map.
pub trait ConfigCodec {
    /// Backend shape to form shape.
    fn decode(&self, config: &mut Map<String, Value>);
    /// Form shape to backend shape.
    fn encode(&self, config: &mut Map<String, Value>);
    /// Fills in what an edited form needs for `decode` to invert `encode`.
    fn complete(&self, _form: &mut Map<String, Value>) {}
}

/// Splits the trailing memory prompt out of `messages` while memory is enabled.
pub struct MemoryCodec;

impl ConfigCodec for MemoryCodec {
    fn decode(&self, config: &mut Map<String, Value>) {
        if !memory_enabled(config) {
            return;
        }
        let Some(last) = config
            .get_mut("messages")
            .and_then(Value::as_array_mut)
            .and_then(Vec::pop)
        else {
            return;
        };
        if let Some(memory) = config.get_mut("memory").and_then(Value::as_object_mut) {
            memory.insert("messages".to_string(), last);
        }
    }

    fn encode(&self, config: &mut Map<String, Value>) {
        if !memory_enabled(config) {
            return;
        }
        let Some(last) = config
            .get_mut("memory")
            .and_then(Value::as_object_mut)
            .and_then(|memory| memory.remove("messages"))
        else {
            return;
        };
        match config.get_mut("messages").and_then(Value::as_array_mut) {
            Some(messages) => messages.push(last),
            None => {
                config.insert("messages".to_string(), Value::Array(vec![last]));
            }
        }
    }

    fn complete(&self, form: &mut Map<String, Value>) {
        if !memory_enabled(form) {
            return;
        }
        if !form.get("messages").is_some_and(Value::is_array) {
            form.insert("messages".to_string(), Value::Array(Vec::new()));
        }
        if let Some(memory) = form.get_mut("memory").and_then(Value::as_object_mut) {
            memory
                .entry("messages")
                .or_insert_with(|| json!({ "role": "user", "content": MEMORY_PROMPT }));
        }
    }
}

/// The prompt a freshly enabled memory starts with.
pub const MEMORY_PROMPT: &str = "{{ sys.message }}";

fn memory_enabled(config: &Map<String, Value>) -> bool {
    config
        .get("memory")
        .and_then(|m| m.get("enable"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Gathers every retrieval setting except `query` under `knowledge_retrieval`.
pub struct KnowledgeCodec;

const KNOWLEDGE_KEY: &str = "knowledge_retrieval";

impl ConfigCodec for KnowledgeCodec {
    fn decode(&self, config: &mut Map<String, Value>) {
        let keys: Vec<String> = config
            .keys()
            .filter(|k| k.as_str() != "query" && k.as_str() != KNOWLEDGE_KEY)
            .cloned()
            .collect();
        let mut nested = Map::new();
        for key in keys {
            if let Some(value) = config.remove(&key) {
                nested.insert(key, value);
            }
        }
        config.insert(KNOWLEDGE_KEY.to_string(), Value::Object(nested));
    }

    fn encode(&self, config: &mut Map<String, Value>) {
        if let Some(Value::Object(nested)) = config.remove(KNOWLEDGE_KEY) {
            for (key, value) in nested {
                config.insert(key, value);
            }
        }
    }
}

/// In group mode `group_variables` is `{ name: [refs] }` on the wire and `[{ key, value }]`
/// in the form.
pub struct GroupVariablesCodec;

impl ConfigCodec for GroupVariablesCodec {
    fn decode(&self, config: &mut Map<String, Value>) {
        if !group_mode(config) {
            return;
        }
        if let Some(Value::Object(groups)) = config.get("group_variables") {
            let pairs = groups
                .iter()
                .map(|(key, value)| json!({ "key": key, "value": value }))
                .collect();
            config.insert("group_variables".to_string(), Value::Array(pairs));
        }
    }

    fn encode(&self, config: &mut Map<String, Value>) {
        if !group_mode(config) {
            return;
        }
        if let Some(Value::Array(pairs)) = config.get("group_variables") {
            let groups = pairs_to_object(pairs, "key");
            config.insert("group_variables".to_string(), Value::Object(groups));
        }
    }
}

fn group_mode(config: &Map<String, Value>) -> bool {
    config.get("group").and_then(Value::as_bool).unwrap_or(false)
}

/// An object map on the wire, an ordered `[{ name, value }]` list in the form.
pub struct KeyValueCodec {
    pub key: &'static str,
}

impl ConfigCodec for KeyValueCodec {
    fn decode(&self, config: &mut Map<String, Value>) {
        if let Some(Value::Object(entries)) = config.get(self.key) {
            let pairs = entries
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            config.insert(self.key.to_string(), Value::Array(pairs));
        }
    }

    fn encode(&self, config: &mut Map<String, Value>) {
        if let Some(Value::Array(pairs)) = config.get(self.key) {
            let entries = pairs_to_object(pairs, "name");
            config.insert(self.key.to_string(), Value::Object(entries));
        }
    }
}

fn pairs_to_object(pairs: &[Value], name_field: &str) -> Map<String, Value> {
    pairs
        .iter()
        .filter_map(|pair| {
            let name = pair.get(name_field)?.as_str()?;
            let value = pair.get("value").cloned().unwrap_or(Value::Null);
            Some((name.to_string(), value))
        })
        .collect()
}

/// Source code travels base64-encoded. Undecodable input is kept as it is.
pub struct Base64Codec {
    pub key: &'static str,
}

impl ConfigCodec for Base64Codec {
    fn decode(&self, config: &mut Map<String, Value>) {
        let Some(Value::String(raw)) = config.get(self.key) else {
            return;
        };
        let decoded = STANDARD
            .decode(raw.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        match decoded {
            Some(text) => {
                config.insert(self.key.to_string(), Value::String(text));
            }
            None => {
                tracing::warn!(
                    field = self.key,
                    "config field is not valid base64, keeping raw value"
                );
            }
        }
    }

    fn encode(&self, config: &mut Map<String, Value>) {
        if let Some(Value::String(text)) = config.get(self.key) {
            let encoded = STANDARD.encode(text.as_bytes());
            config.insert(self.key.to_string(), Value::String(encoded));
        }
    }
}

/// The codecs that apply to `kind`, in decode order.
pub fn codecs_for(kind: &NodeKind) -> Vec<Box<dyn ConfigCodec>> {
    match kind {
        NodeKind::Llm => vec![Box::new(MemoryCodec)],
        NodeKind::KnowledgeRetrieval => vec![Box::new(KnowledgeCodec)],
        NodeKind::VarAggregator => vec![Box::new(GroupVariablesCodec)],
        NodeKind::HttpRequest => vec![
            Box::new(KeyValueCodec { key: "headers" }),
            Box::new(KeyValueCodec { key: "params" }),
        ],
        NodeKind::Code => vec![Box::new(Base64Codec { key: "code" })],
        NodeKind::Start
        | NodeKind::End
        | NodeKind::Answer
        | NodeKind::IfElse
        | NodeKind::JinjaRender
        | NodeKind::QuestionClassifier
        | NodeKind::Tool
        | NodeKind::Agent
        | NodeKind::Assigner
        | NodeKind::ParameterExtractor
        | NodeKind::Loop
        | NodeKind::Iteration
        | NodeKind::CycleStart
        | NodeKind::Break
        | NodeKind::MemoryRead
        | NodeKind::MemoryWrite
        | NodeKind::AddNode
        | NodeKind::Other(_) => Vec::new(),
    }
}

/// Turns a backend config into form fields.
pub fn decode_node_config(kind: &NodeKind, mut config: Map<String, Value>) -> NodeForm {
    for codec in codecs_for(kind) {
        codec.decode(&mut config);
    }
    NodeForm::from_config(config)
}

/// Brings a form edited field by field into the shape [`encode_node_config`] can invert.
pub fn complete_node_form(kind: &NodeKind, form: &mut NodeForm) {
    let codecs = codecs_for(kind);
    if codecs.is_empty() {
        return;
    }
    let mut fields = form.to_config();
    for codec in &codecs {
        codec.complete(&mut fields);
    }
    *form = NodeForm::from_config(fields);
}

/// Turns form fields back into the backend config.
pub fn encode_node_config(kind: &NodeKind, form: &NodeForm) -> Map<String, Value> {
    let mut config = form.to_config();
    for codec in codecs_for(kind).iter().rev() {
        codec.encode(&mut config);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn memory_prompt_moves_into_memory() {
        let wire = map(json!({
            "messages": [
                { "role": "system", "content": "s" },
                { "role": "user", "content": "{{sys.message}}" }
            ],
            "memory": { "enable": true, "window_size": 20 }
        }));
        let form = decode_node_config(&NodeKind::Llm, wire.clone());
        assert_eq!(form.array_len("messages"), 1);
        assert_eq!(
            form.get("memory").unwrap()["messages"]["content"],
            json!("{{sys.message}}")
        );
        assert_eq!(encode_node_config(&NodeKind::Llm, &form), wire);
    }

    #[test]
    fn disabled_memory_leaves_messages_alone() {
        let wire = map(json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "memory": { "enable": false }
        }));
        let form = decode_node_config(&NodeKind::Llm, wire.clone());
        assert_eq!(form.array_len("messages"), 1);
        assert_eq!(encode_node_config(&NodeKind::Llm, &form), wire);
    }

    #[test]
    fn knowledge_settings_nest_beside_query() {
        let wire = map(json!({
            "query": "{{sys.message}}",
            "knowledge_bases": [{ "id": "kb" }],
            "reranker_top_k": 4
        }));
        let form = decode_node_config(&NodeKind::KnowledgeRetrieval, wire.clone());
        assert_eq!(form.len(), 2);
        assert_eq!(form.get("knowledge_retrieval").unwrap()["reranker_top_k"], json!(4));
        assert_eq!(encode_node_config(&NodeKind::KnowledgeRetrieval, &form), wire);
    }

    #[test]
    fn group_variables_expand_only_in_group_mode() {
        let grouped = map(json!({
            "group": true,
            "group_variables": { "a": ["{{x.y}}"], "b": [] }
        }));
        let form = decode_node_config(&NodeKind::VarAggregator, grouped.clone());
        assert_eq!(
            form.get("group_variables").unwrap(),
            &json!([{ "key": "a", "value": ["{{x.y}}"] }, { "key": "b", "value": [] }])
        );
        assert_eq!(encode_node_config(&NodeKind::VarAggregator, &form), grouped);

        let flat = map(json!({ "group": false, "group_variables": ["{{x.y}}"] }));
        let form = decode_node_config(&NodeKind::VarAggregator, flat.clone());
        assert_eq!(form.get("group_variables").unwrap(), &json!(["{{x.y}}"]));
    }

    #[test]
    fn http_headers_become_name_value_rows() {
        let wire = map(json!({ "headers": { "Accept": "json" }, "params": {} }));
        let form = decode_node_config(&NodeKind::HttpRequest, wire.clone());
        assert_eq!(form.get("headers").unwrap(), &json!([{ "name": "Accept", "value": "json" }]));
        assert_eq!(form.get("params").unwrap(), &json!([]));
        assert_eq!(encode_node_config(&NodeKind::HttpRequest, &form), wire);
    }

    #[test]
    fn code_is_base64_on_the_wire() {
        let wire = map(json!({ "code": STANDARD.encode("def main():\n    return {}") }));
        let form = decode_node_config(&NodeKind::Code, wire.clone());
        assert_eq!(form.get("code").unwrap(), &json!("def main():\n    return {}"));
        assert_eq!(encode_node_config(&NodeKind::Code, &form), wire);
    }

    #[test]
    fn broken_base64_passes_through() {
        let wire = map(json!({ "code": "print('hi')" }));
        let form = decode_node_config(&NodeKind::Code, wire);
        assert_eq!(form.get("code").unwrap(), &json!("print('hi')"));
    }
}
