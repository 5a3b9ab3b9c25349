//! Key encoding and decoding utilities
//!
//! Scan-state keys use a single-byte prefix, the checker id, a zero
//! separator and the 20 address bytes. Every key of one checker therefore
//! shares a common prefix and sorts together in RocksDB.

use alloy_primitives::Address;
use anyhow::Result;

/// Encode the prefix shared by all keys of a checker.
///
/// Format: byte 'Q' (0x51) + checker id (utf-8) + 0x00
pub fn encode_checker_prefix(checker: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(checker.len() + 2);
    key.push(b'Q');
    key.extend_from_slice(checker.as_bytes());
    key.push(0);
    key
}

/// Encode a scan-state key.
///
/// Format: checker prefix + address (20 bytes)
pub fn encode_scan_key(checker: &str, addr: Address) -> Vec<u8> {
    let mut key = encode_checker_prefix(checker);
    key.extend_from_slice(addr.as_slice());
    key
}

/// Decode a scan-state key into (checker id, address).
pub fn decode_scan_key(key: &[u8]) -> Result<(String, Address)> {
    if key.len() < 23 || key[0] != b'Q' {
        anyhow::bail!("Invalid scan key: {}", hex::encode(key));
    }
    let (head, addr) = key.split_at(key.len() - 20);
    if head[head.len() - 1] != 0 {
        anyhow::bail!("Scan key missing separator");
    }
    let checker = std::str::from_utf8(&head[1..head.len() - 1])?.to_string();
    Ok((checker, Address::from_slice(addr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_scan_key_encoding() {
        let addr = address!("b248A284756a52C7eC5Fb119648747128c1eC28b");
        let key = encode_scan_key("vault-stake", addr);
        assert_eq!(key.len(), 1 + "vault-stake".len() + 1 + 20);
        assert_eq!(key[0], b'Q');
        assert!(key.starts_with(&encode_checker_prefix("vault-stake")));
        assert_eq!(&key[key.len() - 20..], addr.as_slice());

        let (checker, decoded) = decode_scan_key(&key).unwrap();
        assert_eq!(checker, "vault-stake");
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_prefixes_do_not_overlap() {
        // "nft" must not be a prefix of "nft-mint" keys
        let addr = address!("0000000000000000000000000000000000000001");
        let key = encode_scan_key("nft-mint", addr);
        assert!(!key.starts_with(&encode_checker_prefix("nft")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_scan_key(b"A1234").is_err());
        assert!(decode_scan_key(&[b'Q'; 30]).is_err());
    }
}
