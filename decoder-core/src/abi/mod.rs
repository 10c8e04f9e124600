//! Typed view over ABI documents used by the decoding registry.
//!
//! ABI JSON stays an opaque document tree (see [`document`]) across the
//! storage boundary; [`AbiFunction`] is the tagged struct the decoder works
//! with: it knows its canonical signature, its 4-byte selector and how to
//! decode calldata arguments via [`ethabi`].

use crate::{utils, Selector};
use ethabi::{ParamType, Token};
use serde::{Deserialize, Serialize};

mod canonical;
mod document;
mod normalize;

pub use canonical::{abi_hash, canonical_json, ABI_HASH_LEN};
pub use document::{AbiDocument, Component, Item};
pub use normalize::normalize_token;

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("unsupported ABI type `{0}`")]
    UnsupportedType(String),
    #[error("calldata does not match the function arguments: {0}")]
    Decode(#[from] ethabi::Error),
}

/// A single function descriptor, decoupled from the document it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Component>,
    #[serde(default)]
    pub outputs: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<String>,
}

impl AbiFunction {
    /// Build from a document descriptor. Returns `None` for descriptors that
    /// are not functions (events, constructors, fallback, receive).
    pub fn from_item(item: &Item) -> Option<Self> {
        if item.type_field != "function" {
            return None;
        }
        Some(Self {
            name: item.name.clone()?,
            inputs: item.inputs.clone(),
            outputs: item.outputs.clone(),
            state_mutability: item.state_mutability.clone(),
        })
    }

    /// A minimal descriptor standing in for a contract's `fallback` entry.
    pub fn fallback() -> Self {
        Self {
            name: "fallback".to_owned(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            state_mutability: None,
        }
    }

    /// The method signature in the standard ABI format, with tuple components
    /// collapsed: `fill((address,uint256)[],bytes)`.
    pub fn abi_signature(&self) -> String {
        let inputs =
            self.inputs.iter().map(canonical_type).collect::<Vec<_>>().join(",");
        format!("{}({inputs})", self.name)
    }

    /// The Keccak-256 selector of the canonical signature.
    pub fn selector(&self) -> Selector {
        utils::id(self.abi_signature())
    }

    /// The `ethabi` parameter types of the inputs.
    pub fn param_types(&self) -> Result<Vec<ParamType>, AbiError> {
        self.inputs.iter().map(param_type).collect()
    }

    /// Decode the argument section of calldata (everything after the
    /// selector) into tokens.
    pub fn decode_input(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        let types = self.param_types()?;
        let tokens = ethabi::decode(&types, data)?;
        // `ethabi::decode` tolerates truncated tails for some type lists;
        // a token count mismatch still means undecodable input
        if tokens.len() != types.len() {
            return Err(AbiError::Decode(ethabi::Error::InvalidData));
        }
        Ok(tokens)
    }
}

/// Collapse a component to its canonical signature type, expanding tuples.
pub fn canonical_type(component: &Component) -> String {
    let (base, suffix) = split_array_suffix(&component.type_field);
    if base == "tuple" {
        let inner = component
            .components
            .iter()
            .map(canonical_type)
            .collect::<Vec<_>>()
            .join(",");
        format!("({inner}){suffix}")
    } else {
        component.type_field.clone()
    }
}

/// Split `"tuple[2][]"` into `("tuple", "[2][]")`.
fn split_array_suffix(type_field: &str) -> (&str, &str) {
    match type_field.find('[') {
        Some(idx) => type_field.split_at(idx),
        None => (type_field, ""),
    }
}

/// Resolve a component to an [`ethabi::ParamType`], using the nested
/// `components` for tuples.
pub fn param_type(component: &Component) -> Result<ParamType, AbiError> {
    param_type_of(&component.type_field, &component.components)
}

fn param_type_of(type_field: &str, components: &[Component]) -> Result<ParamType, AbiError> {
    // peel the outermost array layer off the right-hand side
    if let Some(stripped) = type_field.strip_suffix(']') {
        let open = stripped
            .rfind('[')
            .ok_or_else(|| AbiError::UnsupportedType(type_field.to_owned()))?;
        let inner = param_type_of(&stripped[..open], components)?;
        let size = &stripped[open + 1..];
        return if size.is_empty() {
            Ok(ParamType::Array(Box::new(inner)))
        } else {
            let len: usize = size
                .parse()
                .map_err(|_| AbiError::UnsupportedType(type_field.to_owned()))?;
            Ok(ParamType::FixedArray(Box::new(inner), len))
        };
    }

    match type_field {
        "address" => Ok(ParamType::Address),
        "bool" => Ok(ParamType::Bool),
        "string" => Ok(ParamType::String),
        "bytes" => Ok(ParamType::Bytes),
        "function" => Ok(ParamType::FixedBytes(24)),
        "tuple" => {
            let members =
                components.iter().map(param_type).collect::<Result<Vec<_>, _>>()?;
            Ok(ParamType::Tuple(members))
        }
        "uint" => Ok(ParamType::Uint(256)),
        "int" => Ok(ParamType::Int(256)),
        _ => {
            if let Some(bits) = type_field.strip_prefix("uint") {
                let bits = parse_bits(bits, type_field, 256)?;
                Ok(ParamType::Uint(bits))
            } else if let Some(bits) = type_field.strip_prefix("int") {
                let bits = parse_bits(bits, type_field, 256)?;
                Ok(ParamType::Int(bits))
            } else if let Some(len) = type_field.strip_prefix("bytes") {
                let len = parse_bits(len, type_field, 32)?;
                Ok(ParamType::FixedBytes(len))
            } else {
                Err(AbiError::UnsupportedType(type_field.to_owned()))
            }
        }
    }
}

fn parse_bits(s: &str, type_field: &str, max: usize) -> Result<usize, AbiError> {
    let value: usize =
        s.parse().map_err(|_| AbiError::UnsupportedType(type_field.to_owned()))?;
    if value == 0 || value > max {
        return Err(AbiError::UnsupportedType(type_field.to_owned()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(json: &str) -> AbiFunction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn signature_and_selector() {
        let transfer = function(
            r#"{"name":"transfer","inputs":[{"name":"to","type":"address"},
                {"name":"value","type":"uint256"}],"outputs":[]}"#,
        );
        assert_eq!(transfer.abi_signature(), "transfer(address,uint256)");
        assert_eq!(transfer.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn signature_expands_tuples() {
        let fill = function(
            r#"{"name":"fill","inputs":[
                {"name":"orders","type":"tuple[]","components":[
                    {"name":"maker","type":"address"},
                    {"name":"amounts","type":"uint256[2]"}]},
                {"name":"proof","type":"bytes"}],"outputs":[]}"#,
        );
        assert_eq!(fill.abi_signature(), "fill((address,uint256[2])[],bytes)");
    }

    #[test]
    fn converts_param_types() {
        let mut component = Component::new("orders", "tuple[]");
        component.components = vec![
            Component::new("maker", "address"),
            Component::new("amounts", "uint256[2]"),
        ];
        let ty = param_type(&component).unwrap();
        assert_eq!(
            ty,
            ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::FixedArray(Box::new(ParamType::Uint(256)), 2),
            ])))
        );
    }

    #[test]
    fn rejects_unknown_types() {
        let component = Component::new("x", "uint257");
        assert!(matches!(param_type(&component), Err(AbiError::UnsupportedType(_))));
        let component = Component::new("x", "fixed128x18");
        assert!(matches!(param_type(&component), Err(AbiError::UnsupportedType(_))));
    }

    #[test]
    fn decodes_inputs() {
        let add_owner = function(
            r#"{"name":"addOwnerWithThreshold","inputs":[
                {"name":"owner","type":"address"},
                {"name":"_threshold","type":"uint256"}],"outputs":[]}"#,
        );
        assert_eq!(add_owner.selector(), [0x0d, 0x58, 0x2f, 0x13]);

        let mut data = vec![0u8; 64];
        data[12..32]
            .copy_from_slice(&hex::decode("1b9a0da11a5cace4e7035993cbb2e4b1b3b164cf").unwrap());
        data[63] = 1;
        let tokens = add_owner.decode_input(&data).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], Token::Uint(1u64.into()));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let transfer = function(
            r#"{"name":"transfer","inputs":[{"name":"to","type":"address"},
                {"name":"value","type":"uint256"}],"outputs":[]}"#,
        );
        assert!(transfer.decode_input(&[0u8; 32]).is_err());
    }

    #[test]
    fn builds_from_document_items() {
        let doc: AbiDocument = serde_json::from_str(
            r#"[{"type":"function","name":"ping","inputs":[],"outputs":[],
                 "stateMutability":"view"},
                {"type":"event","name":"Ping","inputs":[]}]"#,
        )
        .unwrap();
        let functions: Vec<_> =
            doc.functions().filter_map(AbiFunction::from_item).collect();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "ping");
        assert_eq!(AbiFunction::fallback().name, "fallback");
    }
}
