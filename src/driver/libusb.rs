//! ## libusb backend
//!
//! [`Driver`] implementation on top of `rusb`.
//!

use std::time::Duration;

use anyhow::Context as _;
use rusb::DeviceHandle;

use crate::communication::control;
use crate::constants::misc::DEFAULT_TIMEOUT_DURATION;
use crate::driver::{Driver, Transport};
use crate::error::{Error, Result};
use crate::init::{self, DeviceFilter};
use crate::types::{Capabilities, DeviceMode, UsbtmcEndpoints};
use crate::visa::VisaResource;

/// ### Rusb Driver
///
/// Opens instruments through libusb. Every transfer uses the configured timeout.
///
#[derive(Debug, Clone)]
pub struct RusbDriver {
    timeout: Duration,
}

impl Default for RusbDriver {
    fn default() -> Self {
        RusbDriver {
            timeout: DEFAULT_TIMEOUT_DURATION,
        }
    }
}

impl RusbDriver {
    pub fn new() -> RusbDriver {
        RusbDriver::default()
    }

    /// ### With Timeout
    ///
    /// Set the timeout used for control and bulk transfers.
    ///
    pub fn with_timeout(mut self, timeout: Duration) -> RusbDriver {
        self.timeout = timeout;
        self
    }

    fn open(&self, filter: impl DeviceFilter) -> anyhow::Result<RusbTransport> {
        let context = rusb::Context::new()?;
        let (device, mut handle) = init::open_device(&context, filter)?;

        // GET THE DEVICE MODE
        // ==========
        let mut mode = init::get_usbtmc_mode(&device)?;
        init::detach_kernel_driver(&mut mode, &mut handle)?;

        // GET ENDPOINTS
        // ==========
        let endpoints = init::get_endpoints(&mode, &device)?;

        // CONFIGURE DEVICE
        // ==========
        if handle.active_configuration()? != mode.config_number {
            handle.set_active_configuration(mode.config_number)?;
        }
        handle
            .claim_interface(mode.interface_number)
            .context("claiming USBTMC interface")?;
        handle.set_alternate_setting(mode.interface_number, mode.setting_number)?;

        let capabilities = control::get_capabilities(&handle, mode.interface_number, self.timeout)?;

        // CLEAR DEVICE
        // ==========
        control::clear_buffers(
            &handle,
            mode.interface_number,
            &endpoints.bulk_in_ep,
            self.timeout,
        )
        .context("clearing USBTMC buffers")?;
        control::clear_feature(&handle, &endpoints.bulk_out_ep)?;
        control::clear_feature(&handle, &endpoints.bulk_in_ep)?;

        log::debug!(
            "claimed interface {} (bulk out {:#04x}, bulk in {:#04x}, max packet {})",
            mode.interface_number,
            endpoints.bulk_out_ep.address,
            endpoints.bulk_in_ep.address,
            endpoints.bulk_out_ep.max_packet_size
        );

        Ok(RusbTransport {
            handle,
            mode,
            endpoints,
            capabilities,
            timeout: self.timeout,
            closed: false,
        })
    }
}

/// Keep "not found" recognizable, everything else passes through untouched.
fn into_error(error: anyhow::Error) -> Error {
    match error.downcast::<Error>() {
        Ok(error) => error,
        Err(error) => match error.downcast_ref::<rusb::Error>() {
            Some(rusb::Error::NotFound) | Some(rusb::Error::NoDevice) => Error::DeviceNotFound,
            _ => Error::Transport(error),
        },
    }
}

impl Driver for RusbDriver {
    fn open_by_vid_pid(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn Transport>> {
        let transport = self.open((vendor_id, product_id)).map_err(into_error)?;
        Ok(Box::new(transport))
    }

    fn open_by_resource(&self, resource: &VisaResource) -> Result<Box<dyn Transport>> {
        let transport = self.open(resource).map_err(into_error)?;
        Ok(Box::new(transport))
    }
}

/// ### Rusb Transport
///
/// A claimed USBTMC interface. Releasing happens on [`Transport::close`] or on drop.
///
pub struct RusbTransport {
    handle: DeviceHandle<rusb::Context>,
    mode: DeviceMode,
    endpoints: UsbtmcEndpoints,
    capabilities: Capabilities,
    timeout: Duration,
    closed: bool,
}

impl RusbTransport {
    /// What the interface reported in its GET_CAPABILITIES response.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        // Release the interface
        self.handle.release_interface(self.mode.interface_number)?;
        // Reattach the kernel driver if it was disconnected
        if self.mode.has_kernel_driver {
            self.handle.attach_kernel_driver(self.mode.interface_number)?;
        }
        Ok(())
    }
}

impl Transport for RusbTransport {
    fn write(&mut self, data: &[u8]) -> anyhow::Result<usize> {
        Ok(self
            .handle
            .write_bulk(self.endpoints.bulk_out_ep.address, data, self.timeout)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize> {
        Ok(self
            .handle
            .read_bulk(self.endpoints.bulk_in_ep.address, buffer, self.timeout)?)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.release()
    }

    fn max_packet_size(&self) -> Option<usize> {
        Some(self.endpoints.bulk_out_ep.max_packet_size as usize)
    }

    fn supports_term_char(&self) -> bool {
        self.capabilities.supports_bulk_in_term_char
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.release() {
                log::warn!("failed to release USBTMC interface: {:#}", e);
            }
        }
    }
}

impl std::fmt::Debug for RusbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusbTransport")
            .field("mode", &self.mode)
            .field("endpoints", &self.endpoints)
            .field("capabilities", &self.capabilities)
            .field("timeout", &self.timeout)
            .finish()
    }
}
