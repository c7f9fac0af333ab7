//! ## Types
//!
//! The different types used across the crate
//!

use rusb::{Direction, TransferType};

/// ### bTag
///
/// The bTag element used to identify a bulk request.
///
/// Every outbound header consumes one value. Values cycle 1 through 255 and never take 0.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BTag {
    /// Last value handed out, 0 before the first transaction
    last: u8,
}

impl BTag {
    /// ### New
    ///
    /// Return a fresh bTag. The first call to [`BTag::advance`] yields 1.
    ///
    pub fn new() -> BTag {
        BTag { last: 0 }
    }

    /// ### Next
    ///
    /// The tag that follows `current`, skipping 0.
    ///
    pub fn next(current: u8) -> u8 {
        (current % 255) + 1
    }

    /// ### Invert
    ///
    /// The validation byte transmitted after the tag.
    ///
    pub fn invert(tag: u8) -> u8 {
        tag ^ 0xFF
    }

    /// ### Advance
    ///
    /// Step to the next tag and return it.
    ///
    pub fn advance(&mut self) -> u8 {
        self.last = BTag::next(self.last);
        self.last
    }

    /// The tag used by the most recent transaction, if any.
    pub fn current(&self) -> Option<u8> {
        match self.last {
            0 => None,
            tag => Some(tag),
        }
    }
}

/// ### Device Mode
///
/// A collection of the configuration, interface and interface number. Also if the interface
/// has a kernel driver attached.
///
#[derive(Debug, Clone, Default)]
pub struct DeviceMode {
    /// The USB configuration number
    pub config_number: u8,
    /// The interface number specific to the configuration
    pub interface_number: u8,
    /// The setting number specific to the interface
    pub setting_number: u8,
    /// If the device has a kernel driver. Important for returning control to the OS (on Linux).
    pub has_kernel_driver: bool,
}

/// ### Endpoint
///
/// Properties of an endpoint.
///
#[derive(Clone, Debug)]
pub struct Endpoint {
    /// Address of the endpoint on the interface
    pub address: u8,
    /// The maximal size a packet can have on this endpoint
    pub max_packet_size: u16,
    pub transfer_type: TransferType,
    pub direction: Direction,
}

/// ### USBTMC Endpoints
///
/// Endpoints specific to the USBTMC spec.
///
#[derive(Clone, Debug)]
pub struct UsbtmcEndpoints {
    /// The mandatory BULK OUT endpoint
    pub bulk_out_ep: Endpoint,
    /// The mandatory BULK IN endpoint
    pub bulk_in_ep: Endpoint,
}

/// ### Capabilities
///
/// The collected capabilities of a USBTMC device.
///
#[derive(Clone, Debug, Default)]
pub struct Capabilities {
    pub bcd_version: u16,
    /// Only sends data to the controller
    pub is_talk_only: bool,
    /// Only accepts data from the controller
    pub is_listen_only: bool,
    /// Honors the TermChar bit of a REQUEST_DEV_DEP_MSG_IN header
    pub supports_bulk_in_term_char: bool,
}
