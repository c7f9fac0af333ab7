//! ## Initialization
//!
//! A set of functions to help the rusb backend locate and prepare a USBTMC interface.
//!

use crate::{
    constants::usb::*,
    error::Error,
    types::{DeviceMode, Endpoint, UsbtmcEndpoints},
    visa::VisaResource,
};

use anyhow::Result;
use rusb::{Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};

/// Device filter
pub trait DeviceFilter {
    fn apply_filter<T: UsbContext>(&self, device: &Device<T>, device_desc: &DeviceDescriptor)
        -> bool;

    /// Serial number the opened device must report, checked once a handle exists.
    fn serial_number(&self) -> Option<&str> {
        None
    }
}

/// Get TMC device by USB identifiers (idVendor, idProduct)
impl DeviceFilter for (u16, u16) {
    fn apply_filter<T: UsbContext>(
        &self,
        _device: &Device<T>,
        device_desc: &DeviceDescriptor,
    ) -> bool {
        self.0 == device_desc.vendor_id() && self.1 == device_desc.product_id()
    }
}

/// Get TMC device by VISA resource (identifiers, then serial number when given)
impl DeviceFilter for VisaResource {
    fn apply_filter<T: UsbContext>(
        &self,
        _device: &Device<T>,
        device_desc: &DeviceDescriptor,
    ) -> bool {
        self.manufacturer_id() == device_desc.vendor_id()
            && self.model_code() == device_desc.product_id()
    }

    fn serial_number(&self) -> Option<&str> {
        VisaResource::serial_number(self)
    }
}

/// Allow apply filter by reference
impl<T: DeviceFilter> DeviceFilter for &T {
    fn apply_filter<X: UsbContext>(
        &self,
        device: &Device<X>,
        device_desc: &DeviceDescriptor,
    ) -> bool {
        (**self).apply_filter(device, device_desc)
    }

    fn serial_number(&self) -> Option<&str> {
        (**self).serial_number()
    }
}

fn is_tmc_interface(class_code: u8, sub_class_code: u8, protocol_code: u8) -> bool {
    class_code == USBTMC_CLASS_CODE
        && sub_class_code == USBTMC_SUBCLASS_CODE
        && (protocol_code == USBTMC_PROTOCOL_CODE || protocol_code == USB488_PROTOCOL_CODE)
}

fn is_tmc_device<T: UsbContext>(device: &Device<T>, device_desc: &DeviceDescriptor) -> bool {
    (0..device_desc.num_configurations()).any(move |config_no| {
        if let Ok(config_desc) = device.config_descriptor(config_no) {
            config_desc.interfaces().any(|interface| {
                interface.descriptors().any(|interface_desc| {
                    is_tmc_interface(
                        interface_desc.class_code(),
                        interface_desc.sub_class_code(),
                        interface_desc.protocol_code(),
                    )
                })
            })
        } else {
            false
        }
    })
}

/// ### Open Device
///
/// Open the first USBTMC device accepted by `filter`.
///
pub fn open_device<T: UsbContext>(
    context: &T,
    filter: impl DeviceFilter,
) -> Result<(Device<T>, DeviceHandle<T>)> {
    // list the devices
    let devices = context.devices()?;

    // find the one device we want and open it
    for device in devices.iter() {
        let device_desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(_) => continue,
        };
        if !is_tmc_device(&device, &device_desc) || !filter.apply_filter(&device, &device_desc) {
            continue;
        }

        let handle = match device.open() {
            Ok(handle) => handle,
            Err(e) => {
                log::debug!(
                    "skipping {:04x}:{:04x} on bus {} address {}: {}",
                    device_desc.vendor_id(),
                    device_desc.product_id(),
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };

        if let Some(wanted) = filter.serial_number() {
            match handle.read_serial_number_string_ascii(&device_desc) {
                Ok(serial) if serial == wanted => {}
                _ => continue,
            }
        }

        return Ok((device, handle));
    }

    Err(Error::DeviceNotFound.into())
}

/// ### Get USBTMC Mode
///
/// Get the device mode (configuration, interface and interface setting) that is compatible
/// with USBTMC.
///
pub fn get_usbtmc_mode<T: UsbContext>(device: &Device<T>) -> Result<DeviceMode> {
    let device_desc = device.device_descriptor()?;

    // go through the configurations
    for n in 0..device_desc.num_configurations() {
        let config_desc = device.config_descriptor(n)?;
        for interface in config_desc.interfaces() {
            for interface_desc in interface.descriptors() {
                if is_tmc_interface(
                    interface_desc.class_code(),
                    interface_desc.sub_class_code(),
                    interface_desc.protocol_code(),
                ) {
                    return Ok(DeviceMode {
                        config_number: config_desc.number(),
                        interface_number: interface_desc.interface_number(),
                        setting_number: interface_desc.setting_number(),
                        has_kernel_driver: false,
                    });
                }
            }
        }
    }

    Err(Error::DeviceIncompatible.into())
}

/// ### Detach Kernel Driver
///
/// If the interface uses a kernel driver, detach it for the duration of the program.
///
pub fn detach_kernel_driver<T: UsbContext>(
    mode: &mut DeviceMode,
    handle: &mut DeviceHandle<T>,
) -> Result<()> {
    mode.has_kernel_driver = match handle.kernel_driver_active(mode.interface_number) {
        Ok(true) => {
            handle.detach_kernel_driver(mode.interface_number)?;
            true
        }
        _ => false,
    };

    Ok(())
}

/// ### Get Endpoints
///
/// Get the bulk endpoints of the USBTMC interface.
///
pub fn get_endpoints<T: UsbContext>(
    mode: &DeviceMode,
    device: &Device<T>,
) -> Result<UsbtmcEndpoints> {
    let config_desc = device.config_descriptor(mode.config_number.saturating_sub(1))?;
    let interface = config_desc
        .interfaces()
        .find(|inter| inter.number() == mode.interface_number)
        .ok_or(Error::InterfaceNotFound)?;
    let interface_desc = interface
        .descriptors()
        .find(|d| d.setting_number() == mode.setting_number)
        .ok_or(Error::InterfaceSettingNotFound)?;

    let endpoints_list: Vec<Endpoint> = interface_desc
        .endpoint_descriptors()
        .map(|endpoint| Endpoint {
            address: endpoint.address(),
            max_packet_size: endpoint.max_packet_size(),
            transfer_type: endpoint.transfer_type(),
            direction: endpoint.direction(),
        })
        .collect();

    let find = |transfer_type: TransferType, direction: Direction| {
        endpoints_list
            .iter()
            .find(|ep| ep.transfer_type == transfer_type && ep.direction == direction)
            .cloned()
    };

    Ok(UsbtmcEndpoints {
        bulk_out_ep: find(TransferType::Bulk, Direction::Out)
            .ok_or(Error::BulkOutEndpointNotFound)?,
        bulk_in_ep: find(TransferType::Bulk, Direction::In).ok_or(Error::BulkInEndpointNotFound)?,
    })
}
