use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{MessageRole, SerializableMessage};

/// Context for sharing data between step handlers in a dialogue session.
///
/// Holds a key/value map of typed session facts plus the ordered transcript
/// of turns. Cloning is cheap; clones share the same underlying data.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    messages: Arc<RwLock<Vec<SerializableMessage>>>,
}

/// Serializable image of a [`Context`], used by persistent session stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub data: HashMap<String, Value>,
    pub messages: Vec<SerializableMessage>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).expect("context value must serialize");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.value().clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Drop every stored fact. The transcript is left untouched.
    pub async fn clear_data(&self) {
        self.data.clear();
    }

    pub async fn add_human_message(&self, content: impl Into<String>) {
        self.push_message(SerializableMessage::human(content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.push_message(SerializableMessage::assistant(content));
    }

    pub async fn get_all_messages(&self) -> Vec<SerializableMessage> {
        self.messages.read().expect("transcript lock poisoned").clone()
    }

    pub async fn get_last_messages(&self, n: usize) -> Vec<SerializableMessage> {
        let messages = self.messages.read().expect("transcript lock poisoned");
        let start = messages.len().saturating_sub(n);
        messages[start..].to_vec()
    }

    /// Content of the most recent assistant turn, if any.
    pub async fn last_assistant_message(&self) -> Option<String> {
        let messages = self.messages.read().expect("transcript lock poisoned");
        messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
    }

    pub async fn set_messages(&self, turns: Vec<SerializableMessage>) {
        *self.messages.write().expect("transcript lock poisoned") = turns;
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            data: self
                .data
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            messages: self.messages.read().expect("transcript lock poisoned").clone(),
        }
    }

    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let data = DashMap::new();
        for (k, v) in snapshot.data {
            data.insert(k, v);
        }
        Self {
            data: Arc::new(data),
            messages: Arc::new(RwLock::new(snapshot.messages)),
        }
    }

    fn push_message(&self, message: SerializableMessage) {
        self.messages
            .write()
            .expect("transcript lock poisoned")
            .push(message);
    }
}
