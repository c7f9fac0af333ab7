//! ## Device
//!
//! USBTMC message transfers over a [`Transport`]: chunked writes, multi-packet reads and
//! the query helpers built on them.
//!

use crate::communication::bulk::{self, BulkInHeader};
use crate::constants::{bulk_msg_id, misc};
use crate::driver::Transport;
use crate::error::{Error, Result};
use crate::types::BTag;

/// Smallest transfer that still fits a header and one aligned payload word.
const MIN_TRANSFER_SIZE: usize = misc::USBTMC_HEADER_SIZE + misc::TRANSFER_ALIGNMENT;

/// ### Device
///
/// A USBTMC instrument bound to an open transport.
///
/// Every method takes `&mut self`: the bTag sequence and the bytes on the wire belong to one
/// transaction at a time. Share a device between threads behind a lock.
///
pub struct Device<T: Transport = Box<dyn Transport>> {
    transport: Option<T>,
    btag: BTag,
    term_char: u8,
    term_char_enabled: bool,
    max_transfer_size: usize,
    /// Bulk endpoint wMaxPacketSize; every read asks for a multiple of it
    packet_size: usize,
}

impl<T: Transport> Device<T> {
    /// ### New
    ///
    /// Wrap an open transport. The maximum transfer size follows the transport's packet size
    /// and TermChar is disabled when the transport reports no support for it.
    ///
    pub fn new(transport: T) -> Device<T> {
        let packet_size = transport
            .max_packet_size()
            .filter(|size| *size > 0)
            .unwrap_or(misc::DEFAULT_MAX_TRANSFER_SIZE);
        let max_transfer_size = match packet_size {
            size if size >= MIN_TRANSFER_SIZE => size,
            _ => misc::DEFAULT_MAX_TRANSFER_SIZE,
        };
        let term_char_enabled = transport.supports_term_char();

        Device {
            transport: Some(transport),
            btag: BTag::new(),
            term_char: misc::DEFAULT_TERM_CHAR,
            term_char_enabled,
            max_transfer_size,
            packet_size,
        }
    }

    pub fn term_char(&self) -> u8 {
        self.term_char
    }

    pub fn term_char_enabled(&self) -> bool {
        self.term_char_enabled
    }

    /// Character the device should stop a Bulk-IN transfer on.
    pub fn set_term_char(&mut self, term_char: u8) {
        self.term_char = term_char;
    }

    pub fn set_term_char_enabled(&mut self, enabled: bool) {
        self.term_char_enabled = enabled;
    }

    /// Largest single bulk transfer, header included.
    pub fn max_transfer_size(&self) -> usize {
        self.max_transfer_size
    }

    /// ### Set Max Transfer Size
    ///
    /// Bound every bulk out transfer (header, payload and padding) to `size` bytes.
    ///
    pub fn set_max_transfer_size(&mut self, size: usize) -> Result<()> {
        if size < MIN_TRANSFER_SIZE || size - misc::USBTMC_HEADER_SIZE > u32::MAX as usize {
            return Err(Error::InvalidTransferSize(size));
        }
        self.max_transfer_size = size;
        Ok(())
    }

    /// Payload bytes carried per transfer: what is left after the header, kept 4-aligned.
    pub fn chunk_size(&self) -> usize {
        let payload = self.max_transfer_size - misc::USBTMC_HEADER_SIZE;
        payload - payload % misc::TRANSFER_ALIGNMENT
    }

    /// The bTag of the most recent transaction.
    pub fn btag(&self) -> Option<u8> {
        self.btag.current()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// ### Write
    ///
    /// Send `data` as one USBTMC message, split into as many DEV_DEP_MSG_OUT transfers as the
    /// chunk size requires. Only the last transfer carries EOM.
    ///
    /// Returns the payload bytes written. If the transport fails after part of the message
    /// went out, the error is [`Error::PartialWrite`] with the count delivered.
    ///
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let chunk_size = self.chunk_size();
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;

        // TransferSize must be > 0
        if data.is_empty() {
            return Ok(0);
        }

        let num_transactions = data.len().div_ceil(chunk_size);
        let mut written: usize = 0;

        for (transaction_number, chunk) in data.chunks(chunk_size).enumerate() {
            let btag = self.btag.advance();
            let end_of_message = transaction_number + 1 == num_transactions;
            let header =
                bulk::device_dependent_msg_out_header(btag, chunk.len() as u32, end_of_message);

            let mut transfer = Vec::with_capacity(header.len() + chunk.len() + 3);
            transfer.extend_from_slice(&header);
            transfer.extend_from_slice(chunk);
            bulk::pad_to_alignment(&mut transfer);

            log::trace!(
                "DEV_DEP_MSG_OUT btag={} size={} eom={}",
                btag,
                chunk.len(),
                end_of_message
            );

            if let Err(e) = send(transport, &transfer) {
                log::debug!("write aborted after {} of {} bytes", written, data.len());
                return Err(match written {
                    0 => e,
                    _ => Error::PartialWrite {
                        written,
                        source: Box::new(e),
                    },
                });
            }

            written += chunk.len();
        }

        log::debug!("wrote {} bytes in {} transfers", written, num_transactions);
        Ok(written)
    }

    /// ### Read
    ///
    /// Request one USBTMC message of at most `buffer.len()` bytes and collect it.
    ///
    /// The first packet holds the Bulk-IN header whose TransferSize tells how many bytes
    /// follow. Further packets are read until that many arrived. Every read asks for a
    /// whole number of packets so a padded last packet never overflows the request.
    ///
    /// Errors:
    /// - [`Error::ShortRead`] when the header is truncated or the stream ends early
    /// - [`Error::BufferTooSmall`] when the device declares more than `buffer` holds;
    ///   `buffer` is filled with the start of the message
    /// - [`Error::TagMismatch`] / [`Error::InvalidHeader`] for a response that does not
    ///   answer this request
    ///
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let packet_size = self.packet_size;
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;

        // TransferSize must be > 0
        if buffer.is_empty() {
            return Ok(0);
        }

        // REQUEST
        // ==========
        let btag = self.btag.advance();
        let requested = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        let request = bulk::request_device_dependent_msg_in_header(
            btag,
            requested,
            self.term_char_enabled,
            self.term_char,
        );
        log::trace!(
            "REQUEST_DEV_DEP_MSG_IN btag={} size={} term_char={:?}",
            btag,
            requested,
            self.term_char_enabled.then_some(self.term_char)
        );
        send(transport, &request)?;

        // FIRST PACKET
        // ==========
        let mut scratch =
            vec![0x00; packet_aligned(misc::USBTMC_HEADER_SIZE + buffer.len(), packet_size)];
        let received = transport.read(&mut scratch).map_err(Error::Transport)?;
        if received < misc::USBTMC_HEADER_SIZE {
            return Err(Error::ShortRead {
                expected: misc::USBTMC_HEADER_SIZE,
                received,
            });
        }

        let header = BulkInHeader::decode(&scratch[..received])?;
        if header.msg_id != bulk_msg_id::DEVICE_DEPENDENT_MSG_IN {
            return Err(Error::InvalidHeader("unexpected MsgID"));
        }
        if header.btag != btag {
            return Err(Error::TagMismatch {
                expected: btag,
                received: header.btag,
            });
        }

        let declared = header.transfer_size as usize;
        let payload = &scratch[misc::USBTMC_HEADER_SIZE..received];
        // anything past the declared size is alignment
        let mut copied = payload.len().min(declared).min(buffer.len());
        buffer[..copied].copy_from_slice(&payload[..copied]);

        // CONTINUATION PACKETS
        // ==========
        while copied < declared && copied < buffer.len() {
            // the device pads the last packet, so ask for whole packets and drop the tail
            scratch.resize(packet_aligned(declared - copied, packet_size), 0x00);
            let n = transport.read(&mut scratch).map_err(Error::Transport)?;
            if n == 0 {
                return Err(Error::ShortRead {
                    expected: declared,
                    received: copied,
                });
            }
            let take = n.min(declared - copied).min(buffer.len() - copied);
            buffer[copied..copied + take].copy_from_slice(&scratch[..take]);
            copied += take;
        }

        if copied < declared {
            return Err(Error::BufferTooSmall { declared, copied });
        }

        log::debug!(
            "read {} bytes (btag={}, eom={})",
            copied,
            btag,
            header.end_of_message()
        );
        Ok(copied)
    }

    /// ### Command
    ///
    /// Send a command to the device, newline-terminated.
    ///
    pub fn command(&mut self, cmd: &str) -> Result<()> {
        let mut message = String::with_capacity(cmd.len() + 1);
        message.push_str(cmd.trim_end());
        message.push('\n');

        self.write(message.as_bytes())?;
        Ok(())
    }

    /// ### Query Raw
    ///
    /// Send a command and get a response from the device as bytes.
    ///
    pub fn query_raw(&mut self, cmd: &str) -> Result<Vec<u8>> {
        self.command(cmd)?;

        let mut buffer = vec![0x00; misc::APPLICATION_BUFFER_SIZE];
        let n = self.read(&mut buffer)?;
        buffer.truncate(n);

        Ok(buffer)
    }

    /// ### Query
    ///
    /// Send a command and get a response from the device.
    /// The response is a utf-8 string.
    ///
    pub fn query(&mut self, cmd: &str) -> Result<String> {
        let resp = String::from_utf8(self.query_raw(cmd)?)?;
        Ok(resp.trim().to_string())
    }

    /// ### Trigger
    ///
    /// Send the USB488 TRIGGER message, equivalent to a GPIB Group Execute Trigger.
    ///
    pub fn trigger(&mut self) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        let btag = self.btag.advance();

        log::trace!("TRIGGER btag={}", btag);
        send(transport, &bulk::trigger_header(btag))
    }

    /// ### Close
    ///
    /// Release the transport. Every later call fails with [`Error::Closed`].
    ///
    pub fn close(&mut self) -> Result<()> {
        let mut transport = self.transport.take().ok_or(Error::Closed)?;
        transport.close().map_err(Error::Transport)
    }
}

/// Write one whole transfer; a transport that takes only part of it is an error.
fn send<T: Transport>(transport: &mut T, transfer: &[u8]) -> Result<()> {
    let accepted = transport.write(transfer).map_err(Error::Transport)?;
    if accepted < transfer.len() {
        return Err(Error::ShortWrite {
            expected: transfer.len(),
            accepted,
        });
    }
    Ok(())
}

/// `len` rounded up to a whole number of packets.
fn packet_aligned(len: usize, packet_size: usize) -> usize {
    len.div_ceil(packet_size).max(1) * packet_size
}

impl<T: Transport> Drop for Device<T> {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                log::warn!("failed to close transport: {:#}", e);
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("btag", &self.btag)
            .field("term_char", &self.term_char)
            .field("term_char_enabled", &self.term_char_enabled)
            .field("max_transfer_size", &self.max_transfer_size)
            .field("packet_size", &self.packet_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}
