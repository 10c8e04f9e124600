//! Normalization of decoded tokens into JSON values that survive
//! serialization in any consumer language: integers become decimal strings,
//! byte strings become `0x`-prefixed lowercase hex, addresses are checksummed
//! and containers are mapped recursively.

use crate::utils::to_checksum;
use ethabi::{Token, Uint};
use serde_json::Value;

/// Convert a decoded token into its normalized JSON representation.
pub fn normalize_token(token: &Token) -> Value {
    match token {
        Token::Address(addr) => Value::String(to_checksum(addr)),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Uint(value) => Value::String(value.to_string()),
        Token::Int(value) => Value::String(signed_decimal(value)),
        Token::Bool(true) => Value::String("True".to_owned()),
        Token::Bool(false) => Value::String("False".to_owned()),
        Token::String(s) => Value::String(s.clone()),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(normalize_token).collect())
        }
    }
}

/// Decimal rendering of a 256-bit two's-complement integer.
fn signed_decimal(value: &Uint) -> String {
    if value.bit(255) {
        let magnitude = (!*value).overflowing_add(Uint::one()).0;
        format!("-{magnitude}")
    } else {
        value.to_string()
    }
}
