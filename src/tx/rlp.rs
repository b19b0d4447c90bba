//! Recursive Length Prefix encoding
//!
//! Only the encoding side is needed for signing. Integers are minimal
//! big-endian byte strings, so zero encodes as the empty string `0x80`.

use ethers_core::types::U256;

/// Strip leading zero bytes
fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Big-endian length without leading zeros
fn encode_length(len: usize) -> Vec<u8> {
    trim_leading_zeros(&len.to_be_bytes()).to_vec()
}

fn with_prefix(short_base: u8, long_base: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    if payload.len() < 56 {
        out.push(short_base + payload.len() as u8);
    } else {
        let len_bytes = encode_length(payload.len());
        out.push(long_base + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
    out.extend_from_slice(payload);
    out
}

/// Encode a byte string
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    with_prefix(0x80, 0xb7, data)
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

pub fn encode_u256(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    encode_bytes(trim_leading_zeros(&buf))
}

/// Wrap already-encoded items in a list header
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();
    with_prefix(0xc0, 0xf7, &payload)
}

/// Accumulates list items in order
#[derive(Debug, Default, Clone)]
pub struct RlpList {
    items: Vec<Vec<u8>>,
}

impl RlpList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.items.push(encode_u64(value));
        self
    }

    pub fn u256(mut self, value: U256) -> Self {
        self.items.push(encode_u256(value));
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.items.push(encode_bytes(data));
        self
    }

    /// Append an item that is already RLP encoded
    pub fn raw(mut self, encoded: Vec<u8>) -> Self {
        self.items.push(encoded);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        encode_list(&self.items)
    }
}
