//! ## Constants
//!
//! Various constants used throughout the project.
//!

pub mod usb {
    /// The class code for usbtmc
    pub const USBTMC_CLASS_CODE: u8 = 0xFE;
    /// The subclass code for usbtmc
    pub const USBTMC_SUBCLASS_CODE: u8 = 0x03;
    /// The protocol code for a plain USBTMC interface
    pub const USBTMC_PROTOCOL_CODE: u8 = 0x00;
    /// The protocol code for the USB488 spec of usbtmc
    pub const USB488_PROTOCOL_CODE: u8 = 0x01;
}

pub mod misc {
    use std::time::Duration;

    /// The default timeout duration
    pub const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(2);
    /// The size in bytes of a USBTMC header in a bulk transfer
    pub const USBTMC_HEADER_SIZE: usize = 12;
    /// Every bulk out transfer is padded to this alignment
    pub const TRANSFER_ALIGNMENT: usize = 4;
    /// Largest single transfer (header included) when the transport does not report one
    pub const DEFAULT_MAX_TRANSFER_SIZE: usize = 512;
    /// Scratch buffer size used when reading a query response
    pub const APPLICATION_BUFFER_SIZE: usize = 1024 * 8;
    /// Default termination character to use (using NI-VISA default '\n')
    pub const DEFAULT_TERM_CHAR: u8 = b'\n';
    /// Value of every reserved header byte
    pub const RESERVED: u8 = 0x00;
}

pub mod usbtmc_status {
    /// Success
    pub const STATUS_SUCCESS: u8 = 0x01;
    /// Request still being processed
    pub const STATUS_PENDING: u8 = 0x02;
}

pub mod control_requests {
    pub const INITIATE_CLEAR: u8 = 5;
    pub const CHECK_CLEAR_STATUS: u8 = 6;
    pub const GET_CAPABILITIES: u8 = 7;
}

pub mod bulk_msg_id {
    pub const DEVICE_DEPENDENT_MSG_OUT: u8 = 1;
    pub const REQUEST_DEVICE_DEPENDENT_MSG_IN: u8 = 2;
    pub const DEVICE_DEPENDENT_MSG_IN: u8 = 2;
    pub const VENDOR_SPECIFIC_MSG_OUT: u8 = 126;
    pub const REQUEST_VENDOR_SPECIFIC_MSG_IN: u8 = 127;
    pub const VENDOR_SPECIFIC_MSG_IN: u8 = 127;
    /// USB488 subclass trigger message
    pub const TRIGGER: u8 = 128;
}

pub mod transfer_attributes {
    /// bit 0 of bmTransferAttributes: last byte of the transfer ends the message
    pub const END_OF_MESSAGE: u8 = 0b0000_0001;
    /// bit 1 of bmTransferAttributes: the Bulk-IN transfer must end on TermChar
    pub const TERM_CHAR_ENABLED: u8 = 0b0000_0010;
}
