//! Wire codec for MultiSend batches.
//!
//! The `transactions` argument of `multiSend(bytes)` packs sub-calls without
//! padding: `(operation: u8, to: address, value: u256, data_len: u256,
//! data: data_len bytes)` tuples back to back.

use crate::{Address, Selector};
use ethabi::{ParamType, Token, Uint};

/// Selector of `multiSend(bytes)`.
pub const MULTISEND_SELECTOR: Selector = [0x8d, 0x80, 0xff, 0x0a];

const HEADER_LEN: usize = 1 + 20 + 32 + 32;

#[derive(Debug, thiserror::Error)]
pub enum MultiSendError {
    #[error("calldata is not a multiSend call")]
    NotMultiSend,
    #[error("invalid multisend operation {0}")]
    InvalidOperation(u8),
    #[error("truncated multisend payload at offset {0}")]
    Truncated(usize),
    #[error("cannot decode multisend calldata: {0}")]
    Abi(#[from] ethabi::Error),
}

/// Kind of sub-call executed by MultiSend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = MultiSendError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(MultiSendError::InvalidOperation(other)),
        }
    }
}

/// A single sub-call of a MultiSend batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSendTx {
    pub operation: Operation,
    pub to: Address,
    pub value: Uint,
    pub data: Vec<u8>,
}

impl MultiSendTx {
    /// Parse the packed `transactions` bytes into the ordered list of
    /// sub-calls. Trailing or short bytes are an error, never ignored.
    pub fn from_packed(mut bytes: &[u8]) -> Result<Vec<Self>, MultiSendError> {
        let mut txs = Vec::new();
        let mut offset = 0usize;
        while !bytes.is_empty() {
            if bytes.len() < HEADER_LEN {
                return Err(MultiSendError::Truncated(offset));
            }
            let operation = Operation::try_from(bytes[0])?;
            let to = Address::from_slice(&bytes[1..21]);
            let value = Uint::from_big_endian(&bytes[21..53]);
            let data_len = Uint::from_big_endian(&bytes[53..85]);
            if data_len > Uint::from(bytes.len() - HEADER_LEN) {
                return Err(MultiSendError::Truncated(offset));
            }
            let data_len = data_len.as_usize();
            let data = bytes[HEADER_LEN..HEADER_LEN + data_len].to_vec();

            txs.push(Self { operation, to, value, data });
            bytes = &bytes[HEADER_LEN + data_len..];
            offset += HEADER_LEN + data_len;
        }
        Ok(txs)
    }

    /// Parse full `multiSend(bytes)` calldata into its sub-calls.
    pub fn from_transaction_data(data: &[u8]) -> Result<Vec<Self>, MultiSendError> {
        if data.len() < 4 || data[..4] != MULTISEND_SELECTOR {
            return Err(MultiSendError::NotMultiSend);
        }
        let tokens = ethabi::decode(&[ParamType::Bytes], &data[4..])?;
        match tokens.into_iter().next() {
            Some(Token::Bytes(packed)) => Self::from_packed(&packed),
            _ => Err(MultiSendError::NotMultiSend),
        }
    }

    /// Pack the sub-call into its wire form.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.push(self.operation as u8);
        out.extend_from_slice(self.to.as_bytes());
        let mut word = [0u8; 32];
        self.value.to_big_endian(&mut word);
        out.extend_from_slice(&word);
        Uint::from(self.data.len()).to_big_endian(&mut word);
        out.extend_from_slice(&word);
        out.extend_from_slice(&self.data);
        out
    }

    /// Encode a batch back into `multiSend(bytes)` calldata.
    pub fn encode_calldata(txs: &[Self]) -> Vec<u8> {
        let packed: Vec<u8> = txs.iter().flat_map(Self::to_packed).collect();
        let mut calldata = MULTISEND_SELECTOR.to_vec();
        calldata.extend(ethabi::encode(&[Token::Bytes(packed)]));
        calldata
    }
}

/// Addresses targeted by the batch, in order of first appearance, without
/// duplicates. Non-MultiSend calldata yields an empty list.
pub fn target_addresses(data: &[u8]) -> Vec<Address> {
    let txs = match MultiSendTx::from_transaction_data(data) {
        Ok(txs) => txs,
        Err(_) => return Vec::new(),
    };
    let mut seen = Vec::new();
    for tx in txs {
        if !seen.contains(&tx.to) {
            seen.push(tx.to);
        }
    }
    seen
}
