//! # USBTMC Link
//!
//! Pure Rust implementation of the USBTMC message layer used to talk to bench instruments.
//!
//! The crate frames DEVICE_DEPENDENT messages with their 12-byte bulk headers, keeps the bTag
//! sequence, splits long writes into several transfers and reassembles responses that span
//! more than one USB packet. The USB side is abstracted behind [`Transport`], with a libusb
//! backend ([`RusbDriver`]) included.
//!
//! ## Usage
//!
//! To use, add the following line to your project's Cargo.toml dependencies:
//! ```toml
//! usbtmc-link = "0.2"
//! ```
//!
//! ## Example
//!
//! The example below demonstrates how to connect to, send commands to and query the device.
//!
//! ```no_run
//! use usbtmc_link::{Context, RusbDriver};
//!
//! fn main() -> Result<(), usbtmc_link::Error> {
//!     let context = Context::new(RusbDriver::new());
//!
//!     // connect to the device by VISA address
//!     let mut device = context.open("USB0::2391::1031::MY44035849::INSTR")?;
//!
//!     // send a command to the device
//!     device.command("*RST")?;
//!
//!     // query the device and get a string
//!     let idn: String = device.query("*IDN?")?;
//!
//!     // query the device and get bytes
//!     let raw: Vec<u8> = device.query_raw("*IDN?")?;
//!
//!     device.close()
//! }
//! ```
//!
//! Any type implementing [`Transport`] can stand in for the USB stack, which is how the
//! protocol layer is tested without hardware.
//!

mod constants;
mod device;
mod driver;
mod error;
mod init;
mod types;
mod visa;
mod communication {
    pub mod bulk;
    pub mod control;
}

pub use communication::bulk::{
    device_dependent_msg_out_header, encode_prefix, request_device_dependent_msg_in_header,
    request_vendor_specific_in_header, transfer_size, trigger_header, vendor_specific_out_header,
    BulkInHeader, BulkOutHeader,
};
pub use constants::bulk_msg_id;
pub use constants::misc::{DEFAULT_MAX_TRANSFER_SIZE, DEFAULT_TERM_CHAR, USBTMC_HEADER_SIZE};
pub use device::Device;
pub use driver::libusb::{RusbDriver, RusbTransport};
pub use driver::{register, Context, Driver, Transport};
pub use error::{Error, Result};
pub use types::{BTag, Capabilities};
pub use visa::VisaResource;
