//! Value types shared by the p4ctl crates.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Address`]: IPv4 addresses
//! - [`Ipv4Prefix`]: IPv4 network prefixes (CIDR notation)
//! - [`FieldValue`]: typed match-field and action-parameter values with
//!   canonical big-endian encoding to a declared bit width

mod ip;
mod mac;
mod value;

pub use ip::{Ipv4Address, Ipv4Prefix};
pub use mac::MacAddress;
pub use value::{bit_length, decode_uint, render_address, render_bytes, FieldValue};

/// Switch port number as seen by the data plane.
pub type PortNumber = u32;

/// Common error type for parsing and encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv4 prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("value {value} does not fit in {bitwidth} bits")]
    ValueTooWide { value: String, bitwidth: u32 },

    #[error("invalid bit width: {0}")]
    InvalidBitwidth(u32),
}
