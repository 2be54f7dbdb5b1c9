//! In-memory transport pair
//!
//! Two connected ends: bytes written on one become readable on the other.
//! Used in place of hardware by the engine, detector and job tests, and by
//! anything that wants to script a firmware.

use cncpendant_core::{ByteTransport, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Link {
    to_a: Mutex<VecDeque<u8>>,
    to_b: Mutex<VecDeque<u8>>,
    baud: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    A,
    B,
}

/// One end of an in-memory byte link
#[derive(Debug)]
pub struct VirtualPort {
    link: Arc<Link>,
    end: End,
}

impl VirtualPort {
    /// Create a connected `(host, firmware)` pair
    pub fn pair() -> (VirtualPort, VirtualPort) {
        let link = Arc::new(Link::default());
        (
            VirtualPort {
                link: link.clone(),
                end: End::A,
            },
            VirtualPort { link, end: End::B },
        )
    }

    fn inbox(&self) -> &Mutex<VecDeque<u8>> {
        match self.end {
            End::A => &self.link.to_a,
            End::B => &self.link.to_b,
        }
    }

    fn outbox(&self) -> &Mutex<VecDeque<u8>> {
        match self.end {
            End::A => &self.link.to_b,
            End::B => &self.link.to_a,
        }
    }

    /// Send text to the other end
    pub fn send_str(&self, text: &str) {
        self.outbox().lock().extend(text.bytes());
    }

    /// Take everything received so far as text
    pub fn take_string(&self) -> String {
        let bytes: Vec<u8> = self.inbox().lock().drain(..).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Take everything received so far, split into lines
    pub fn take_lines(&self) -> Vec<String> {
        self.take_string()
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Last baud rate set by either end
    pub fn baud(&self) -> u32 {
        self.link.baud.load(Ordering::Acquire)
    }
}

impl ByteTransport for VirtualPort {
    fn available(&mut self) -> Result<usize, TransportError> {
        Ok(self.inbox().lock().len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        Ok(self.inbox().lock().pop_front())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbox().lock().extend(bytes);
        Ok(())
    }

    fn set_baud(&mut self, rate: u32) -> Result<(), TransportError> {
        self.link.baud.store(rate, Ordering::Release);
        Ok(())
    }

    fn drain_input(&mut self) -> Result<usize, TransportError> {
        let mut inbox = self.inbox().lock();
        let drained = inbox.len();
        inbox.clear();
        Ok(drained)
    }
}
