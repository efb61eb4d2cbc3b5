//! SS58 address rendering.

use blake2::{Blake2b512, Digest};

use harvester_core::ports::AddressCodec;

const PREFIX: &[u8] = b"SS58PRE";

/// [`AddressCodec`] producing SS58 addresses for a given network format.
#[derive(Debug, Clone, Copy)]
pub struct Ss58Codec {
    format: u16,
}

impl Ss58Codec {
    /// Generic Substrate format.
    pub const SUBSTRATE: u16 = 42;

    pub fn new(format: u16) -> Self {
        Self { format }
    }

    pub fn format(&self) -> u16 {
        self.format
    }

    fn format_prefix(&self) -> Vec<u8> {
        let ident = self.format & 0b0011_1111_1111_1111;
        if ident < 64 {
            vec![ident as u8]
        } else {
            let first = ((ident & 0b0000_0000_1111_1100) as u8) >> 2;
            let second = ((ident >> 8) as u8) | (((ident & 0b0000_0000_0000_0011) as u8) << 6);
            vec![first | 0b0100_0000, second]
        }
    }

    /// Encode an arbitrary payload with the network prefix and checksum.
    fn encode_payload(&self, payload: &[u8]) -> String {
        let mut data = self.format_prefix();
        data.extend_from_slice(payload);

        let checksum_len = if payload.len() == 32 { 2 } else { 1 };
        let mut hasher = Blake2b512::new();
        hasher.update(PREFIX);
        hasher.update(&data);
        let hash = hasher.finalize();
        data.extend_from_slice(&hash[..checksum_len]);

        bs58::encode(data).into_string()
    }
}

impl Default for Ss58Codec {
    fn default() -> Self {
        Self::new(Self::SUBSTRATE)
    }
}

impl AddressCodec for Ss58Codec {
    fn encode_account(&self, account_id: &str) -> Option<String> {
        let bytes = hex::decode(account_id.strip_prefix("0x").unwrap_or(account_id)).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        Some(self.encode_payload(&bytes))
    }

    fn encode_index(&self, index: u32) -> String {
        let bytes = index.to_le_bytes();
        let payload = match index {
            0..=0xff => &bytes[..1],
            0x100..=0xffff => &bytes[..2],
            _ => &bytes[..4],
        };
        self.encode_payload(payload)
    }
}
