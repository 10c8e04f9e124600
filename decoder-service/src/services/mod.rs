pub mod abis;
pub mod contract;
pub mod contract_metadata;
pub mod data_decoder;
pub mod events;
pub mod pagination;
pub mod safe_contracts;
