//! ## VISA Resource
//!
//! Parsing of VISA resource strings such as `USB0::2391::1031::MY44035849::INSTR`.
//!

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const INTERFACE_TYPE: &str = "USB";
const RESOURCE_CLASS: &str = "INSTR";
const SEPARATOR: &str = "::";

/// ### Visa Resource
///
/// Addressing fields of a USB instrument. Built only through [`VisaResource::parse`].
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisaResource {
    board_index: u16,
    manufacturer_id: u16,
    model_code: u16,
    serial_number: Option<String>,
}

impl VisaResource {
    /// ### Parse
    ///
    /// `InterfaceType[BoardIndex]::ManufacturerID::ModelCode[::SerialNumber]::ResourceClass`
    ///
    /// Literal tokens compare case-insensitively. IDs accept decimal or `0x` hexadecimal.
    ///
    pub fn parse(resource: &str) -> Result<VisaResource> {
        let fields: Vec<&str> = resource.split(SEPARATOR).collect();
        if !(4..=5).contains(&fields.len())
            || fields
                .iter()
                .any(|f| f.is_empty() || f.contains(':') || f.contains(char::is_whitespace))
        {
            return Err(invalid("resource string", resource));
        }

        let board_index = parse_interface(fields[0])?;
        let manufacturer_id =
            parse_id(fields[1]).ok_or_else(|| invalid("manufacturer ID", fields[1]))?;
        let model_code = parse_id(fields[2]).ok_or_else(|| invalid("model code", fields[2]))?;
        let serial_number = match fields.len() {
            5 => Some(fields[3].to_string()),
            _ => None,
        };

        let class = fields[fields.len() - 1];
        if !class.eq_ignore_ascii_case(RESOURCE_CLASS) {
            return Err(invalid("resource class", class));
        }

        Ok(VisaResource {
            board_index,
            manufacturer_id,
            model_code,
            serial_number,
        })
    }

    /// Always `"USB"`.
    pub fn interface_type(&self) -> &'static str {
        INTERFACE_TYPE
    }

    pub fn board_index(&self) -> u16 {
        self.board_index
    }

    /// USB idVendor of the instrument
    pub fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id
    }

    /// USB idProduct of the instrument
    pub fn model_code(&self) -> u16 {
        self.model_code
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// Always `"INSTR"`.
    pub fn resource_class(&self) -> &'static str {
        RESOURCE_CLASS
    }
}

impl FromStr for VisaResource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VisaResource::parse(s)
    }
}

impl fmt::Display for VisaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}::{:#06x}::{:#06x}",
            INTERFACE_TYPE, self.board_index, self.manufacturer_id, self.model_code
        )?;
        if let Some(serial) = &self.serial_number {
            write!(f, "::{}", serial)?;
        }
        write!(f, "::{}", RESOURCE_CLASS)
    }
}

/// Split `USB0` into its interface type and board index.
fn parse_interface(token: &str) -> Result<u16> {
    let split = token
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(token.len());
    let (interface, board) = token.split_at(split);

    if !interface.eq_ignore_ascii_case(INTERFACE_TYPE) {
        return Err(invalid("interface type", token));
    }

    // a letter after the board digits belongs to the interface token, not the index
    if !board.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("interface type", token));
    }

    match board {
        "" => Ok(0),
        digits => digits.parse().map_err(|_| invalid("board index", digits)),
    }
}

fn parse_id(token: &str) -> Option<u16> {
    match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

fn invalid(field: &'static str, value: &str) -> Error {
    Error::InvalidResource {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_field(resource: &str) -> &'static str {
        match VisaResource::parse(resource) {
            Err(Error::InvalidResource { field, .. }) => field,
            other => panic!("expected parse failure for {resource}, got {other:?}"),
        }
    }

    #[test]
    fn full_resource_string() {
        let visa = VisaResource::parse("USB0::2391::1031::MY44035849::INSTR").unwrap();
        assert_eq!(visa.interface_type(), "USB");
        assert_eq!(visa.board_index(), 0);
        assert_eq!(visa.manufacturer_id(), 2391);
        assert_eq!(visa.model_code(), 1031);
        assert_eq!(visa.serial_number(), Some("MY44035849"));
        assert_eq!(visa.resource_class(), "INSTR");
    }

    #[test]
    fn literals_are_case_insensitive() {
        let visa = VisaResource::parse("usb0::2391::1031::MY44123456::instr").unwrap();
        assert_eq!(visa.manufacturer_id(), 2391);
        assert_eq!(visa.serial_number(), Some("MY44123456"));
    }

    #[test]
    fn optional_fields_default() {
        let visa = VisaResource::parse("USB::1234::5678::INSTR").unwrap();
        assert_eq!(visa.board_index(), 0);
        assert_eq!(visa.serial_number(), None);

        let visa = VisaResource::parse("USB3::1234::5678::SERIAL::INSTR").unwrap();
        assert_eq!(visa.board_index(), 3);
        assert_eq!(visa.serial_number(), Some("SERIAL"));
    }

    #[test]
    fn hexadecimal_ids() {
        let visa = VisaResource::parse("USB0::0x1234::0x5678::INSTR").unwrap();
        assert_eq!(visa.manufacturer_id(), 0x1234);
        assert_eq!(visa.model_code(), 22136);
    }

    #[test]
    fn wrong_interface_type() {
        assert_eq!(failed_field("UBS::1234::5678::INSTR"), "interface type");
        assert_eq!(failed_field("GPIB0::1234::5678::INSTR"), "interface type");
        assert_eq!(failed_field("USB0X::1234::5678::INSTR"), "interface type");
        assert_eq!(failed_field("USB1A2::1234::5678::INSTR"), "interface type");
    }

    #[test]
    fn board_index_out_of_range() {
        assert_eq!(failed_field("USB70000::1234::5678::INSTR"), "board index");
    }

    #[test]
    fn wrong_resource_class() {
        assert_eq!(failed_field("USB::1234::5678::INTSR"), "resource class");
    }

    #[test]
    fn non_numeric_ids() {
        assert_eq!(failed_field("USB::agilent::5678::INSTR"), "manufacturer ID");
        assert_eq!(failed_field("USB::1234::0xZZ::INSTR"), "model code");
        assert_eq!(failed_field("USB::70000::5678::INSTR"), "manufacturer ID");
    }

    #[test]
    fn malformed_structure() {
        assert_eq!(failed_field("USB0::1234::INSTR"), "resource string");
        assert_eq!(failed_field("USB0::1::2::3::4::INSTR"), "resource string");
        assert_eq!(failed_field("USB0::1234:::5678::INSTR"), "resource string");
        assert_eq!(failed_field("USB0::1234:: 5678::INSTR"), "resource string");
    }

    #[test]
    fn display_parses_back() {
        let visa: VisaResource = "usb1::2391::1031::MY44035849::INSTR".parse().unwrap();
        let rendered = visa.to_string();
        assert_eq!(rendered, "USB1::0x0957::0x0407::MY44035849::INSTR");
        assert_eq!(VisaResource::parse(&rendered).unwrap(), visa);
    }
}
