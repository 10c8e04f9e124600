//! Core primitives shared by the decoder service: the opaque ABI document
//! model, the content-addressing scheme for stored ABIs, the MultiSend wire
//! codec and address/selector utilities.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]

pub mod abi;
pub mod multisend;
pub mod utils;

pub use ethabi::{self, Address, Token};

/// A 4-byte function selector, the first word of calldata.
pub type Selector = [u8; 4];

/// Selector of the Safe `execTransaction` entry point.
pub const EXEC_TRANSACTION_SELECTOR: Selector = [0x6a, 0x76, 0x12, 0x02];
