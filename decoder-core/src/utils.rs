//! Address and hashing utilities.

use crate::{Address, Selector};
use tiny_keccak::{Hasher, Keccak};

/// Compute the Keccak-256 hash of the given bytes.
pub fn keccak256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    let mut output = [0u8; 32];
    let mut hasher = Keccak::v256();
    hasher.update(bytes.as_ref());
    hasher.finalize(&mut output);
    output
}

/// Compute the function selector for a canonical signature like
/// `transfer(address,uint256)`.
pub fn id<S: AsRef<str>>(signature: S) -> Selector {
    let hash = keccak256(signature.as_ref().as_bytes());
    let mut selector = Selector::default();
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Encode an address as an EIP-55 checksummed string.
pub fn to_checksum(addr: &Address) -> String {
    let addr_hex = hex::encode(addr.as_bytes());
    let hash = hex::encode(keccak256(addr_hex.as_bytes()));

    addr_hex.as_bytes().iter().zip(hash.as_bytes()).fold(
        "0x".to_owned(),
        |mut encoded, (addr, hash)| {
            // `'8'` is 56: hex digits above 7 in the hash uppercase the nibble
            encoded.push(if *hash >= 56 {
                addr.to_ascii_uppercase() as char
            } else {
                addr.to_ascii_lowercase() as char
            });
            encoded
        },
    )
}

/// Parse a `0x`-prefixed or bare 40-hex-digit string into an [`Address`]
/// without enforcing the checksum.
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 40 {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Returns `true` when `s` is a valid EIP-55 checksummed address.
///
/// All-lowercase and all-uppercase spellings are rejected unless they happen
/// to match the checksum, mirroring how upstream services validate the `to`
/// field of incoming events.
pub fn is_checksum_address(s: &str) -> bool {
    match parse_address(s) {
        Some(addr) => to_checksum(&addr) == s,
        None => false,
    }
}

/// Parse `0x`-prefixed calldata into bytes. Accepts the empty payload `0x`.
pub fn parse_hex_data(s: &str) -> Option<Vec<u8>> {
    let stripped = s.strip_prefix("0x")?;
    if !stripped.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return None;
    }
    hex::decode(stripped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_selectors() {
        assert_eq!(id("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(id("multiSend(bytes)"), [0x8d, 0x80, 0xff, 0x0a]);
        assert_eq!(
            id("execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)"),
            crate::EXEC_TRANSACTION_SELECTOR
        );
    }

    #[test]
    fn checksums_addresses() {
        for addr in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0x1b9a0DA11a5caCE4e7035993Cbb2E4B1B3b164Cf",
        ] {
            let parsed = parse_address(addr).unwrap();
            assert_eq!(to_checksum(&parsed), addr);
            assert!(is_checksum_address(addr));
        }
    }

    #[test]
    fn rejects_bad_checksums() {
        assert!(!is_checksum_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_checksum_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAe"));
        assert!(!is_checksum_address("not an address"));
    }

    #[test]
    fn parses_hex_data() {
        assert_eq!(parse_hex_data("0x"), Some(vec![]));
        assert_eq!(parse_hex_data("0x00ff"), Some(vec![0x00, 0xff]));
        // uppercase digits and missing prefix are rejected
        assert_eq!(parse_hex_data("0x00FF"), None);
        assert_eq!(parse_hex_data("00ff"), None);
        assert_eq!(parse_hex_data("0xf"), None);
    }
}
