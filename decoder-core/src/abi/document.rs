//! A structural view of a contract ABI document that does no post processing
//! and keeps the raw content of every descriptor.
//!
//! Stored ABIs stay opaque JSON trees across the persistence boundary; this
//! module is the typed lens the decoder uses to pick functions out of them.

use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

/// Contract ABI as a list of descriptors where each item can be a function,
/// constructor, event, fallback or receive entry.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AbiDocument(pub Vec<Item>);

impl AbiDocument {
    /// Iterate the function descriptors of the document.
    pub fn functions(&self) -> impl Iterator<Item = &Item> {
        self.0.iter().filter(|item| item.type_field == "function")
    }

    /// The fallback descriptor, if the contract declares one.
    pub fn fallback(&self) -> Option<&Item> {
        self.0.iter().find(|item| item.type_field == "fallback")
    }
}

impl IntoIterator for AbiDocument {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

struct AbiDocumentVisitor;

impl<'de> Visitor<'de> for AbiDocumentVisitor {
    type Value = AbiDocument;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence or map with `abi` key")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut vec = Vec::new();
        while let Some(element) = seq.next_element()? {
            vec.push(element);
        }
        Ok(AbiDocument(vec))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        // Explorers sometimes wrap the array as `{"abi": [..], ...}`
        let mut vec = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "abi" {
                vec = Some(AbiDocument(map.next_value::<Vec<Item>>()?));
            } else {
                map.next_value::<serde::de::IgnoredAny>()?;
            }
        }
        vec.ok_or_else(|| serde::de::Error::missing_field("abi"))
    }
}

impl<'de> Deserialize<'de> for AbiDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AbiDocumentVisitor)
    }
}

/// A single ABI descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub inputs: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<String>,
    #[serde(rename = "type")]
    pub type_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub outputs: Vec<Component>,
    // required to satisfy solidity events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

/// Either an input/output or a nested component of an input/output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "internalType", default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    /// Indexed flag, for solidity events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl Component {
    /// Plain component with no nested tuple members.
    pub fn new(name: impl Into<String>, type_field: impl Into<String>) -> Self {
        Self {
            internal_type: None,
            name: name.into(),
            type_field: type_field.into(),
            components: Vec::new(),
            indexed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_FRAGMENT: &str = r#"[
        {"constant":false,"inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
         "name":"transfer","outputs":[{"name":"","type":"bool"}],"payable":false,
         "stateMutability":"nonpayable","type":"function"},
        {"anonymous":false,"inputs":[{"indexed":true,"name":"from","type":"address"}],
         "name":"Transfer","type":"event"},
        {"stateMutability":"payable","type":"fallback"}
    ]"#;

    #[test]
    fn parses_descriptor_array() {
        let doc: AbiDocument = serde_json::from_str(ERC20_FRAGMENT).unwrap();
        assert_eq!(doc.0.len(), 3);
        assert_eq!(doc.functions().count(), 1);
        assert!(doc.fallback().is_some());
    }

    #[test]
    fn parses_wrapped_abi_object() {
        let wrapped = format!(r#"{{"contractName":"Token","abi":{ERC20_FRAGMENT}}}"#);
        let doc: AbiDocument = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(doc.0.len(), 3);
    }

    #[test]
    fn parses_tuple_components() {
        let s = r#"[{"type":"function","name":"fill","stateMutability":"nonpayable",
            "inputs":[{"name":"order","type":"tuple","components":[
                {"name":"maker","type":"address"},{"name":"amount","type":"uint256"}]}],
            "outputs":[]}]"#;
        let doc: AbiDocument = serde_json::from_str(s).unwrap();
        let item = doc.functions().next().unwrap();
        assert_eq!(item.inputs[0].components.len(), 2);
    }
}
