//! Bulk
//!
//! Encoding of the 12-byte headers that frame every bulk transfer.
//!

use crate::constants::{bulk_msg_id, misc, transfer_attributes};
use crate::error::{Error, Result};
use crate::types::BTag;

/// ### Bulk Out Header
///
/// In-memory form of a Bulk-OUT header. The wire layout is produced by [`BulkOutHeader::encode`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutHeader {
    pub msg_id: u8,
    pub btag: u8,
    pub transfer_size: u32,
    pub attributes: u8,
    pub term_char: u8,
}

impl BulkOutHeader {
    fn new(msg_id: u8, btag: u8, transfer_size: u32) -> BulkOutHeader {
        BulkOutHeader {
            msg_id,
            btag,
            transfer_size,
            attributes: 0x00,
            term_char: misc::RESERVED,
        }
    }

    /// ### Encode
    ///
    /// Serialize to the 12 bytes sent on the wire.
    ///
    pub fn encode(&self) -> [u8; misc::USBTMC_HEADER_SIZE] {
        let mut header = [misc::RESERVED; misc::USBTMC_HEADER_SIZE];

        header[..4].copy_from_slice(&encode_prefix(self.msg_id, self.btag));
        header[4..8].copy_from_slice(&self.transfer_size.to_le_bytes());
        header[8] = self.attributes;
        header[9] = self.term_char;

        header
    }
}

/// ### Bulk In Header
///
/// Header prefixed by the device to the first packet of each Bulk-IN transfer.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInHeader {
    pub msg_id: u8,
    pub btag: u8,
    /// Number of message bytes the device sends in this transfer, header and alignment excluded
    pub transfer_size: u32,
    pub attributes: u8,
}

impl BulkInHeader {
    /// ### Decode
    ///
    /// Parse the first 12 bytes of `buffer`.
    ///
    pub fn decode(buffer: &[u8]) -> Result<BulkInHeader> {
        if buffer.len() < misc::USBTMC_HEADER_SIZE {
            return Err(Error::ShortRead {
                expected: misc::USBTMC_HEADER_SIZE,
                received: buffer.len(),
            });
        }

        if buffer[2] != BTag::invert(buffer[1]) {
            return Err(Error::InvalidHeader("bTagInverse does not match bTag"));
        }

        Ok(BulkInHeader {
            msg_id: buffer[0],
            btag: buffer[1],
            transfer_size: transfer_size(buffer)?,
            attributes: buffer[8],
        })
    }

    /// Whether the last byte of this transfer ends the USBTMC message.
    pub fn end_of_message(&self) -> bool {
        self.attributes & transfer_attributes::END_OF_MESSAGE != 0
    }
}

/// ### Encode Prefix
///
/// The first four bytes shared by every Bulk-OUT header: `[msg_id, btag, !btag, 0]`.
///
pub fn encode_prefix(msg_id: u8, btag: u8) -> [u8; 4] {
    [msg_id, btag, BTag::invert(btag), misc::RESERVED]
}

/// ### Transfer Size
///
/// Read the little-endian TransferSize field (bytes 4 to 7) of a header.
///
pub fn transfer_size(header: &[u8]) -> Result<u32> {
    match header.get(4..8) {
        Some(bytes) if header.len() >= misc::USBTMC_HEADER_SIZE => {
            Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        _ => Err(Error::ShortRead {
            expected: misc::USBTMC_HEADER_SIZE,
            received: header.len(),
        }),
    }
}

pub fn device_dependent_msg_out_header(
    btag: u8,
    transfer_size: u32,
    end_of_message: bool,
) -> [u8; 12] {
    let mut header =
        BulkOutHeader::new(bulk_msg_id::DEVICE_DEPENDENT_MSG_OUT, btag, transfer_size);

    if end_of_message {
        header.attributes = transfer_attributes::END_OF_MESSAGE;
    }

    header.encode()
}

pub fn request_device_dependent_msg_in_header(
    btag: u8,
    transfer_size: u32,
    term_char_enabled: bool,
    term_char: u8,
) -> [u8; 12] {
    let mut header = BulkOutHeader::new(
        bulk_msg_id::REQUEST_DEVICE_DEPENDENT_MSG_IN,
        btag,
        transfer_size,
    );

    if term_char_enabled {
        header.attributes = transfer_attributes::TERM_CHAR_ENABLED;
    }
    header.term_char = term_char;

    header.encode()
}

pub fn vendor_specific_out_header(btag: u8, transfer_size: u32) -> [u8; 12] {
    BulkOutHeader::new(bulk_msg_id::VENDOR_SPECIFIC_MSG_OUT, btag, transfer_size).encode()
}

pub fn request_vendor_specific_in_header(btag: u8, transfer_size: u32) -> [u8; 12] {
    BulkOutHeader::new(bulk_msg_id::REQUEST_VENDOR_SPECIFIC_MSG_IN, btag, transfer_size).encode()
}

/// USB488 TRIGGER carries no payload; everything after the prefix is zero.
pub fn trigger_header(btag: u8) -> [u8; 12] {
    BulkOutHeader::new(bulk_msg_id::TRIGGER, btag, 0).encode()
}

/// ### Pad
///
/// Append zero bytes until the length is a multiple of four.
///
pub fn pad_to_alignment(data: &mut Vec<u8>) {
    let remainder = data.len() % misc::TRANSFER_ALIGNMENT;
    if remainder != 0 {
        data.resize(data.len() + misc::TRANSFER_ALIGNMENT - remainder, 0x00);
    }
}
