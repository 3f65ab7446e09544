//! Textual account addresses.
//!
//! Format: `dpos_` + base32(public key, 52 chars) + base32(checksum, 8 chars).
//! The checksum is the first 5 bytes of Blake2b-256 over the key. The
//! alphabet `13456789abcdefghijkmnopqrstuwxyz` leaves out look-alike glyphs.

use dpos_types::Address;

use crate::error::CryptoError;
use crate::hash::blake2b_256;

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// ASCII byte → 5-bit value, 0xFF for characters outside the alphabet.
const REVERSE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

pub const PREFIX: &str = "dpos_";
const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;

fn to_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut acc: u64 = 0;
    let mut bits = 0;
    for &byte in bytes {
        acc = (acc << 8) | byte as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

fn from_base32<const N: usize>(text: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    let mut acc: u64 = 0;
    let mut bits = 0;
    let mut filled = 0;
    for c in text.bytes() {
        let value = *REVERSE.get(c as usize)?;
        if value == 0xFF {
            return None;
        }
        acc = (acc << 5) | value as u64;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if filled < N {
                out[filled] = (acc >> bits) as u8;
                filled += 1;
            }
        }
    }
    (filled == N).then_some(out)
}

pub fn encode_address(address: &Address) -> String {
    let checksum = blake2b_256(address.as_bytes());
    format!(
        "{PREFIX}{}{}",
        to_base32(address.as_bytes()),
        to_base32(&checksum[..5])
    )
}

/// Parse a `dpos_` address, checking its checksum.
pub fn decode_address(text: &str) -> Result<Address, CryptoError> {
    let invalid = || CryptoError::InvalidAddress(text.to_string());
    let body = text.strip_prefix(PREFIX).ok_or_else(invalid)?;
    if body.len() != KEY_CHARS + CHECKSUM_CHARS || !body.is_ascii() {
        return Err(invalid());
    }
    let key: [u8; 32] = from_base32(&body[..KEY_CHARS]).ok_or_else(invalid)?;
    let checksum: [u8; 5] = from_base32(&body[KEY_CHARS..]).ok_or_else(invalid)?;
    if checksum[..] != blake2b_256(&key)[..5] {
        return Err(invalid());
    }
    Ok(Address::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn encode_then_decode() {
        let address = keypair_from_seed(&[5u8; 32]).address();
        let text = encode_address(&address);
        assert!(text.starts_with("dpos_"));
        assert_eq!(text.len(), 5 + 52 + 8);
        assert_eq!(decode_address(&text).unwrap(), address);
    }

    #[test]
    fn checksum_is_enforced() {
        let mut text = encode_address(&Address::new([7u8; 32]));
        let last = text.pop().unwrap();
        text.push(if last == '1' { '3' } else { '1' });
        assert!(decode_address(&text).is_err());
    }

    #[test]
    fn malformed_inputs_rejected() {
        assert!(decode_address("dpos_").is_err());
        assert!(decode_address("xrb_1111").is_err());
        let valid = encode_address(&Address::new([1u8; 32]));
        let swapped = valid.replacen("dpos_", "nano_", 1);
        assert!(decode_address(&swapped).is_err());
        let non_ascii = format!("dpos_{}", "é".repeat(30));
        assert!(decode_address(&non_ascii).is_err());
    }
}
