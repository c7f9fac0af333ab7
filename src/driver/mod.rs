//! ## Driver
//!
//! The boundary between the protocol layer and a USB host stack.
//!
//! A [`Driver`] locates an instrument and hands back a [`Transport`] that moves raw bytes on
//! its bulk endpoints. [`Context`] binds a driver to [`Device`] construction.
//!

pub mod libusb;

use std::sync::{Arc, OnceLock};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::visa::VisaResource;

/// ### Transport
///
/// Raw bulk I/O over a claimed USBTMC interface. Errors are opaque to the protocol layer and
/// are handed to the caller as [`Error::Transport`].
///
pub trait Transport {
    /// Write `data` to the bulk out endpoint, returning the bytes accepted.
    fn write(&mut self, data: &[u8]) -> anyhow::Result<usize>;

    /// Read from the bulk in endpoint into `buffer`. Zero means end of stream.
    fn read(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize>;

    /// Release the interface. The transport is not used again afterwards.
    fn close(&mut self) -> anyhow::Result<()>;

    /// Largest packet the bulk out endpoint accepts, when known.
    fn max_packet_size(&self) -> Option<usize> {
        None
    }

    /// Whether the device honors the TermChar bit of a read request.
    fn supports_term_char(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> anyhow::Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize> {
        (**self).read(buffer)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }

    fn max_packet_size(&self) -> Option<usize> {
        (**self).max_packet_size()
    }

    fn supports_term_char(&self) -> bool {
        (**self).supports_term_char()
    }
}

/// ### Driver
///
/// A USB backend able to open instruments.
///
pub trait Driver: Send + Sync {
    /// Open the first USBTMC device matching the vendor and product IDs.
    fn open_by_vid_pid(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn Transport>>;

    /// Open the device a parsed resource string points to.
    ///
    /// The default ignores the serial number.
    fn open_by_resource(&self, resource: &VisaResource) -> Result<Box<dyn Transport>> {
        self.open_by_vid_pid(resource.manufacturer_id(), resource.model_code())
    }
}

static DEFAULT_DRIVER: OnceLock<Arc<dyn Driver>> = OnceLock::new();

/// ### Register
///
/// Install the process-wide default driver read by [`Context::from_registry`]. Can only be
/// done once.
///
pub fn register(driver: impl Driver + 'static) -> Result<()> {
    DEFAULT_DRIVER
        .set(Arc::new(driver))
        .map_err(|_| Error::DriverAlreadyRegistered)
}

/// ### Context
///
/// Opens devices through one driver.
///
#[derive(Clone)]
pub struct Context {
    driver: Arc<dyn Driver>,
}

impl Context {
    pub fn new(driver: impl Driver + 'static) -> Context {
        Context {
            driver: Arc::new(driver),
        }
    }

    /// Context over the driver installed with [`register`].
    pub fn from_registry() -> Result<Context> {
        let driver = DEFAULT_DRIVER.get().ok_or(Error::NoDriverRegistered)?;
        Ok(Context {
            driver: Arc::clone(driver),
        })
    }

    pub fn open_by_vid_pid(&self, vendor_id: u16, product_id: u16) -> Result<Device> {
        log::debug!("opening device {:04x}:{:04x}", vendor_id, product_id);
        let transport = self.driver.open_by_vid_pid(vendor_id, product_id)?;
        Ok(Device::new(transport))
    }

    pub fn open_by_resource(&self, resource: &VisaResource) -> Result<Device> {
        log::debug!("opening device {}", resource);
        let transport = self.driver.open_by_resource(resource)?;
        Ok(Device::new(transport))
    }

    /// Parse a VISA address such as `USB0::2391::1031::MY44035849::INSTR` and open it.
    pub fn open(&self, address: &str) -> Result<Device> {
        let resource = VisaResource::parse(address)?;
        self.open_by_resource(&resource)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}
