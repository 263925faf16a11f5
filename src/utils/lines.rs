//! Line reading that tolerates corrupt bytes in node logs.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use color_eyre::eyre::{Context, Result};

/// Iterator over `(line_number, text)` pairs of a log.
///
/// Invalid UTF-8 sequences are dropped from the line instead of failing the
/// read. Line terminators are stripped and empty lines are skipped.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = std::io::Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let text = decode_lossy(&self.buf);
                    let text = text.trim_end_matches(['\n', '\r']);
                    if text.is_empty() {
                        continue;
                    }
                    return Some(Ok((self.line_number, text.to_string())));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).replace(char::REPLACEMENT_CHARACTER, ""),
    }
}

/// Open a log file for lossy line iteration.
pub fn open_log(path: &Path) -> Result<LossyLines<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    Ok(LossyLines::new(BufReader::with_capacity(64 * 1024, file)))
}

/// Lossy line iteration over any reader.
pub fn lines_of<R: Read>(reader: R) -> LossyLines<BufReader<R>> {
    LossyLines::new(BufReader::new(reader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_bytes_are_dropped() {
        let data: &[u8] = b"[HK-P: 1] tx_up \xff5 |\n\n second\r\n";
        let lines: Vec<_> = lines_of(data).map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (1, "[HK-P: 1] tx_up 5 |".to_string()));
        assert_eq!(lines[1], (3, " second".to_string()));
    }
}
