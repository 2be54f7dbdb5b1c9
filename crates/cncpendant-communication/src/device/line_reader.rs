//! Response line assembly

/// Splits the received byte stream into lines
///
/// `\r` is dropped, `\n` terminates, empty lines are skipped. Bytes past
/// `max_len` are discarded until the next terminator.
#[derive(Debug, Clone)]
pub struct LineAssembler {
    buf: Vec<u8>,
    max_len: usize,
}

impl LineAssembler {
    /// Create an assembler truncating lines at `max_len` bytes
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len),
            max_len,
        }
    }

    /// Feed one byte, returning a line when it completes one
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\r' => None,
            b'\n' => {
                if self.buf.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                Some(line)
            }
            _ => {
                if self.buf.len() < self.max_len {
                    self.buf.push(byte);
                }
                None
            }
        }
    }

    /// Discard a partial line
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, data: &[u8]) -> Vec<String> {
        data.iter().filter_map(|&b| assembler.push(b)).collect()
    }

    #[test]
    fn test_splits_and_skips_cr() {
        let mut assembler = LineAssembler::new(200);
        assert_eq!(feed(&mut assembler, b"ok\r\n\r\nerror:2\nok"), ["ok", "error:2"]);
        assert_eq!(feed(&mut assembler, b"\n"), ["ok"]);
    }

    #[test]
    fn test_truncates_long_lines() {
        let mut assembler = LineAssembler::new(4);
        assert_eq!(feed(&mut assembler, b"FIRMWARE_NAME\nok\n"), ["FIRM", "ok"]);
    }
}
