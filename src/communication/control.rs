//! ## Control
//!
//! Set of control requests the rusb backend sends while preparing a device.
//!

use std::time::Duration;

use crate::constants::{control_requests, usbtmc_status};
use crate::error::Error;
use crate::types::{Capabilities, Endpoint};

use anyhow::Result;
use rusb::{DeviceHandle, Direction, UsbContext};

/// ### Get Capabilities
///
/// Ask the interface which optional USBTMC features it implements.
///
pub fn get_capabilities<T: UsbContext>(
    handle: &DeviceHandle<T>,
    interface_number: u8,
    timeout: Duration,
) -> Result<Capabilities> {
    // setup the request
    let bm_request_type: u8 = rusb::request_type(
        Direction::In,
        rusb::RequestType::Class,
        rusb::Recipient::Interface,
    );
    let b_request: u8 = control_requests::GET_CAPABILITIES;
    let w_value: u16 = 0x0000;
    let w_index: u16 = u16::from_le_bytes([interface_number, 0x00]);
    let mut buffer: [u8; 0x0018] = [0x00; 0x0018];

    // execute the request
    handle.read_control(
        bm_request_type,
        b_request,
        w_value,
        w_index,
        &mut buffer,
        timeout,
    )?;

    Ok(parse_capabilities(&buffer)?)
}

fn parse_capabilities(buffer: &[u8; 0x0018]) -> std::result::Result<Capabilities, Error> {
    // verify the status
    let status = buffer[0];
    if status != usbtmc_status::STATUS_SUCCESS {
        return Err(Error::StatusUnexpectedFailure(status));
    }

    let interface_capabilities = buffer[4];
    let device_capabilities = buffer[5];

    Ok(Capabilities {
        bcd_version: u16::from_le_bytes([buffer[2], buffer[3]]),
        is_talk_only: interface_capabilities & 0b0000_0010 != 0,
        is_listen_only: interface_capabilities & 0b0000_0001 != 0,
        supports_bulk_in_term_char: device_capabilities & 0b0000_0001 != 0,
    })
}

/// ### Clear Buffers
///
/// Clear the input and output buffers of the interface: INITIATE_CLEAR, then poll
/// CHECK_CLEAR_STATUS until the device is done. While it reports data left in the Bulk-IN
/// FIFO, that data is read and discarded.
///
pub fn clear_buffers<T: UsbContext>(
    handle: &DeviceHandle<T>,
    interface_number: u8,
    bulk_in_ep: &Endpoint,
    timeout: Duration,
) -> Result<()> {
    // INITIATE CLEAR
    // ==========

    // setup the request
    let bm_request_type: u8 = rusb::request_type(
        Direction::In,
        rusb::RequestType::Class,
        rusb::Recipient::Interface,
    );
    let b_request: u8 = control_requests::INITIATE_CLEAR;
    let w_value: u16 = 0x0000;
    let w_index: u16 = u16::from_le_bytes([interface_number, 0x00]);
    let mut buffer: [u8; 0x0001] = [0x00; 0x0001];

    // execute the request
    handle.read_control(
        bm_request_type,
        b_request,
        w_value,
        w_index,
        &mut buffer,
        timeout,
    )?;

    let status = buffer[0];
    if status != usbtmc_status::STATUS_SUCCESS {
        return Err(Error::StatusUnexpectedFailure(status).into());
    }

    // CHECK CLEAR
    // ==========

    let b_request = control_requests::CHECK_CLEAR_STATUS;
    let mut buffer: [u8; 0x0002] = [0x00; 0x0002];
    let packet_size = (bulk_in_ep.max_packet_size as usize).max(1);
    let mut drain = vec![0x00; packet_size];

    loop {
        handle.read_control(
            bm_request_type,
            b_request,
            w_value,
            w_index,
            &mut buffer,
            timeout,
        )?;

        match parse_clear_status(&buffer)? {
            ClearStatus::Done => break,
            ClearStatus::Pending { bulk_in_has_data } => {
                if !bulk_in_has_data {
                    continue;
                }
                // read until a short packet ends the pending transfer
                loop {
                    let n = handle.read_bulk(bulk_in_ep.address, &mut drain, timeout)?;
                    log::trace!("discarded {} bytes from the Bulk-IN FIFO", n);
                    if n < packet_size {
                        break;
                    }
                }
            }
        }
    }

    log::debug!("cleared buffers of interface {}", interface_number);
    Ok(())
}

/// State reported by CHECK_CLEAR_STATUS.
#[derive(Debug, PartialEq, Eq)]
enum ClearStatus {
    Done,
    Pending { bulk_in_has_data: bool },
}

fn parse_clear_status(buffer: &[u8; 0x0002]) -> std::result::Result<ClearStatus, Error> {
    match buffer[0] {
        usbtmc_status::STATUS_SUCCESS => Ok(ClearStatus::Done),
        usbtmc_status::STATUS_PENDING => Ok(ClearStatus::Pending {
            // bmClear D0
            bulk_in_has_data: buffer[1] & 0b0000_0001 != 0,
        }),
        status => Err(Error::StatusUnexpectedFailure(status)),
    }
}

/// ### Clear Feature
///
/// Clear any halt on the specified endpoint.
///
pub fn clear_feature<T: UsbContext>(handle: &DeviceHandle<T>, endpoint: &Endpoint) -> Result<()> {
    handle.clear_halt(endpoint.address)?;
    Ok(())
}
