//! Tokenization of tagged key/value log lines.
//!
//! A metric line looks like
//!
//! ```text
//! [HK-P: App      ] rx_up 5 | from 3 a_seq 5 len 20 lt_up_r 1a2 lt_up_t 19f hops 2
//! ```
//!
//! The body after the first `] ` is split on single spaces and read as
//! alternating key/value tokens up to the `|` terminator. Tokens after the
//! terminator are attributes looked up by name.

use super::types::LineFormat;

/// Prefix tag of metric lines
pub const METRIC_TAG: &str = "[HK-P";
/// Prefix tag of slot-length adaptation control lines
pub const SLA_TAG: &str = "[HK-S";
/// Last token of lines announcing unused-cell utilization
pub const UPA_MARKER: &str = "HK-U";
/// Last token of slot timing lines
pub const SLOT_TIMING_MARKER: &str = "HK-T";
/// First token of single-pair records
pub const HCK_TAG: &str = "HCK";

const PAIR_TERMINATOR: &str = "|";

/// Text before the first `:`.
pub fn prefix(line: &str) -> &str {
    line.split(':').next().unwrap_or(line)
}

/// Text between the first `] ` and the next one, if any.
pub fn body(line: &str) -> Option<&str> {
    line.split("] ").nth(1)
}

/// Last space-separated token.
pub fn last_token(line: &str) -> &str {
    line.rsplit(' ').next().unwrap_or(line)
}

/// A tokenized metric line
#[derive(Debug, Clone)]
pub struct KvLine<'a> {
    tokens: Vec<&'a str>,
    pair_offset: usize,
    max_pairs: Option<usize>,
}

impl<'a> KvLine<'a> {
    /// Tokenize `line` if it carries metric updates in the given format.
    pub fn parse(line: &'a str, format: LineFormat) -> Option<Self> {
        match format {
            LineFormat::TaggedPairs => Self::tagged(line, METRIC_TAG),
            LineFormat::HckRecord => Self::hck_record(line),
        }
    }

    /// Tokenize the body of a line whose prefix is `tag`.
    pub fn tagged(line: &'a str, tag: &str) -> Option<Self> {
        if prefix(line) != tag {
            return None;
        }
        Some(Self {
            tokens: body(line)?.split(' ').collect(),
            pair_offset: 0,
            max_pairs: None,
        })
    }

    /// Tokenize a `HCK <key> <value> ...` record.
    pub fn hck_record(line: &'a str) -> Option<Self> {
        let tokens: Vec<&str> = body(line)?.split(' ').collect();
        if tokens.first() != Some(&HCK_TAG) {
            return None;
        }
        Some(Self {
            tokens,
            pair_offset: 1,
            max_pairs: Some(1),
        })
    }

    /// Key/value pairs in line order.
    ///
    /// Stops at the terminator or at a key without a value token.
    pub fn pairs(&self) -> Pairs<'_, 'a> {
        Pairs {
            tokens: &self.tokens,
            pos: self.pair_offset,
            remaining: self.max_pairs,
        }
    }

    pub fn first(&self) -> Option<&'a str> {
        self.tokens.first().copied()
    }

    pub fn token(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).copied()
    }

    /// Token following the first occurrence of `marker`.
    pub fn after(&self, marker: &str) -> Option<&'a str> {
        let pos = self.tokens.iter().position(|t| *t == marker)?;
        self.tokens.get(pos + 1).copied()
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }
}

/// Iterator over the key/value pairs of a [`KvLine`]
pub struct Pairs<'l, 'a> {
    tokens: &'l [&'a str],
    pos: usize,
    remaining: Option<usize>,
}

impl<'a> Iterator for Pairs<'_, 'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let key = *self.tokens.get(self.pos)?;
        if key == PAIR_TERMINATOR {
            return None;
        }
        let value = *self.tokens.get(self.pos + 1)?;
        self.pos += 2;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_stop_at_terminator() {
        let line = "[HK-P: App] rx_up 5 | from 3 hops 2";
        let kv = KvLine::tagged(line, METRIC_TAG).unwrap();
        let pairs: Vec<_> = kv.pairs().collect();
        assert_eq!(pairs, vec![("rx_up", "5")]);
        assert_eq!(kv.after("from"), Some("3"));
        assert_eq!(kv.after("hops"), Some("2"));
        assert_eq!(kv.after("to"), None);
    }

    #[test]
    fn test_missing_value_ends_walk() {
        let kv = KvLine::tagged("[HK-P: App] tx_up 4 ps", METRIC_TAG).unwrap();
        assert_eq!(kv.pairs().collect::<Vec<_>>(), vec![("tx_up", "4")]);

        let kv = KvLine::tagged("[HK-P: App] lonely", METRIC_TAG).unwrap();
        assert_eq!(kv.pairs().count(), 0);
    }

    #[test]
    fn test_other_tags_and_missing_body_rejected() {
        assert!(KvLine::tagged("[HK-S: App] det c_ref_bc", METRIC_TAG).is_none());
        assert!(KvLine::tagged("[HK-P: no body here", METRIC_TAG).is_none());
    }

    #[test]
    fn test_hck_record_has_single_pair() {
        let line = "[INFO: App] HCK rxu 12 x 4 b7a0";
        let kv = KvLine::parse(line, LineFormat::HckRecord).unwrap();
        assert_eq!(kv.pairs().collect::<Vec<_>>(), vec![("rxu", "12")]);
        assert_eq!(kv.token(5), Some("b7a0"));
        assert!(KvLine::hck_record("[INFO: App] other rxu 12").is_none());
    }

    #[test]
    fn test_line_helpers() {
        assert_eq!(prefix("[HK-N: 1] 1 aa"), "[HK-N");
        assert_eq!(last_token("[INFO: T] slot 10000 x HK-T"), "HK-T");
        assert_eq!(body("no separator"), None);
    }
}
