//! Typed values carried by match fields and action parameters.
//!
//! Devices take values as big-endian byte strings sized to the declared bit
//! width of the field or parameter. [`FieldValue::encode`] produces that
//! canonical form and refuses values that need more bits than declared.

use crate::{Ipv4Address, MacAddress, ParseError};
use std::fmt;

/// A value for a match field or action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldValue {
    Int(u64),
    Mac(MacAddress),
    Ipv4(Ipv4Address),
    /// Raw big-endian bit string.
    Bits(Vec<u8>),
}

impl FieldValue {
    fn raw_bytes(&self) -> Vec<u8> {
        match self {
            FieldValue::Int(v) => v.to_be_bytes().to_vec(),
            FieldValue::Mac(mac) => mac.as_bytes().to_vec(),
            FieldValue::Ipv4(addr) => addr.octets().to_vec(),
            FieldValue::Bits(bytes) => bytes.clone(),
        }
    }

    /// Number of significant bits in the value.
    pub fn significant_bits(&self) -> u32 {
        bit_length(&self.raw_bytes())
    }

    /// Encodes the value as `ceil(bitwidth / 8)` big-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ValueTooWide`] if the value needs more than
    /// `bitwidth` bits, and [`ParseError::InvalidBitwidth`] for a zero width.
    pub fn encode(&self, bitwidth: u32) -> Result<Vec<u8>, ParseError> {
        if bitwidth == 0 {
            return Err(ParseError::InvalidBitwidth(bitwidth));
        }

        let raw = self.raw_bytes();
        if bit_length(&raw) > bitwidth {
            return Err(ParseError::ValueTooWide {
                value: self.to_string(),
                bitwidth,
            });
        }

        let width = bitwidth.div_ceil(8) as usize;
        let mut out = vec![0u8; width.saturating_sub(raw.len())];
        out.extend_from_slice(&raw[raw.len().saturating_sub(width)..]);
        Ok(out)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Mac(mac) => write!(f, "{}", mac),
            FieldValue::Ipv4(addr) => write!(f, "{}", addr),
            FieldValue::Bits(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(u64::from(v))
    }
}

impl From<MacAddress> for FieldValue {
    fn from(mac: MacAddress) -> Self {
        FieldValue::Mac(mac)
    }
}

impl From<Ipv4Address> for FieldValue {
    fn from(addr: Ipv4Address) -> Self {
        FieldValue::Ipv4(addr)
    }
}

/// Number of significant bits in a big-endian byte string.
pub fn bit_length(bytes: &[u8]) -> u32 {
    match bytes.iter().position(|b| *b != 0) {
        None => 0,
        Some(i) => (bytes.len() - i - 1) as u32 * 8 + (8 - bytes[i].leading_zeros()),
    }
}

/// Decodes a big-endian byte string into an integer, if it fits in 64 bits.
pub fn decode_uint(bytes: &[u8]) -> Option<u64> {
    if bit_length(bytes) > 64 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Renders device bytes for humans: 48-bit values as MAC addresses, other
/// widths as decimal (or hex when too wide).
pub fn render_bytes(bytes: &[u8], bitwidth: u32) -> String {
    if (bitwidth, bytes.len()) == (48, 6) {
        if let Some(mac) = MacAddress::from_slice(bytes) {
            return mac.to_string();
        }
    }

    match decode_uint(bytes) {
        Some(v) => v.to_string(),
        None => FieldValue::Bits(bytes.to_vec()).to_string(),
    }
}

/// Like [`render_bytes`], but 32-bit values render as dotted quads. Use for
/// fields known to carry an IPv4 address.
pub fn render_address(bytes: &[u8], bitwidth: u32) -> String {
    match bytes {
        [a, b, c, d] if bitwidth == 32 => Ipv4Address::new(*a, *b, *c, *d).to_string(),
        _ => render_bytes(bytes, bitwidth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_port_to_nine_bits() {
        assert_eq!(FieldValue::Int(2).encode(9).unwrap(), vec![0x00, 0x02]);
        assert_eq!(FieldValue::Int(511).encode(9).unwrap(), vec![0x01, 0xff]);
        assert!(matches!(
            FieldValue::Int(512).encode(9),
            Err(ParseError::ValueTooWide { bitwidth: 9, .. })
        ));
    }

    #[test]
    fn test_encode_mac_and_ipv4() {
        let mac: MacAddress = "08:00:00:00:02:22".parse().unwrap();
        assert_eq!(
            FieldValue::Mac(mac).encode(48).unwrap(),
            vec![0x08, 0, 0, 0, 0x02, 0x22]
        );

        let ip: Ipv4Address = "10.0.2.2".parse().unwrap();
        assert_eq!(FieldValue::Ipv4(ip).encode(32).unwrap(), vec![10, 0, 2, 2]);
        assert!(FieldValue::Ipv4(ip).encode(16).is_err());
    }

    #[test]
    fn test_encode_pads_short_bit_strings() {
        assert_eq!(FieldValue::Bits(vec![0x01]).encode(32).unwrap(), vec![0, 0, 0, 1]);
        assert_eq!(FieldValue::Int(0).encode(1).unwrap(), vec![0]);
        assert!(FieldValue::Int(1).encode(0).is_err());
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(&[]), 0);
        assert_eq!(bit_length(&[0, 0]), 0);
        assert_eq!(bit_length(&[0, 1]), 1);
        assert_eq!(bit_length(&[0x01, 0x00]), 9);
        assert_eq!(bit_length(&[0x80]), 8);
    }

    #[test]
    fn test_render_bytes() {
        assert_eq!(render_bytes(&[0x08, 0, 0, 0, 0x01, 0x11], 48), "08:00:00:00:01:11");
        assert_eq!(render_bytes(&[0x00, 0x64], 16), "100");
        assert_eq!(render_bytes(&[0, 3], 9), "3");
        // Plain 32-bit integers stay decimal.
        assert_eq!(render_bytes(&[0, 0, 0, 2], 32), "2");
        assert_eq!(render_bytes(&[0, 1, 0, 0], 32), "65536");
    }

    #[test]
    fn test_render_address() {
        assert_eq!(render_address(&[10, 0, 1, 1], 32), "10.0.1.1");
        assert_eq!(render_address(&[0, 0, 0, 2], 32), "0.0.0.2");
        assert_eq!(render_address(&[0x08, 0, 0, 0, 0x01, 0x11], 48), "08:00:00:00:01:11");
        assert_eq!(render_address(&[0, 3], 9), "3");
    }

    #[test]
    fn test_decode_uint() {
        assert_eq!(decode_uint(&[0x01, 0x00]), Some(256));
        assert_eq!(decode_uint(&[0; 12]), Some(0));
        assert_eq!(decode_uint(&[1; 9]), None);
    }
}
