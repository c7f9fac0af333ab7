use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use usbtmc_link::{BTag, Transport};

/// Everything that crossed the fake bus.
#[derive(Default)]
pub struct Wire {
    pub written: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub read_calls: usize,
    /// Buffer length offered by each read call
    pub read_lengths: Vec<usize>,
    /// Fail the write with this index (0-based)
    pub fail_write_at: Option<usize>,
    /// Fail the read call with this index (0-based)
    pub fail_read_at: Option<usize>,
    /// Accept at most this many bytes per write
    pub accept_limit: Option<usize>,
    pub closed: bool,
}

pub struct MockTransport {
    pub wire: Rc<RefCell<Wire>>,
    pub max_packet_size: Option<usize>,
    pub term_char: bool,
}

impl MockTransport {
    pub fn new() -> (MockTransport, Rc<RefCell<Wire>>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let transport = MockTransport {
            wire: Rc::clone(&wire),
            max_packet_size: None,
            term_char: true,
        };
        (transport, wire)
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> anyhow::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_write_at == Some(wire.written.len()) {
            anyhow::bail!("pipe stalled");
        }
        let accepted = wire.accept_limit.map_or(data.len(), |limit| limit.min(data.len()));
        wire.written.push(data[..accepted].to_vec());
        Ok(accepted)
    }

    fn read(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        wire.read_lengths.push(buffer.len());
        wire.read_calls += 1;
        if wire.fail_read_at == Some(wire.read_calls - 1) {
            anyhow::bail!("endpoint timed out");
        }
        match wire.responses.pop_front() {
            Some(packet) => {
                let n = packet.len().min(buffer.len());
                buffer[..n].copy_from_slice(&packet[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.wire.borrow_mut().closed = true;
        Ok(())
    }

    fn max_packet_size(&self) -> Option<usize> {
        self.max_packet_size
    }

    fn supports_term_char(&self) -> bool {
        self.term_char
    }
}

/// First Bulk-IN packet: DEV_DEP_MSG_IN header followed by `payload`.
pub fn response(btag: u8, declared: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x02, btag, BTag::invert(btag), 0x00];
    packet.extend_from_slice(&declared.to_le_bytes());
    packet.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
    packet.extend_from_slice(payload);
    packet
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
