//! Mean residue (idle) time per scheduled-cell case during the data period.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::debug;
use rayon::prelude::*;

use super::asn_event_contents;
use crate::analysis::error::ParseError;
use crate::analysis::types::{NodeId, ResultValue};
use crate::registry::NodeRegistry;
use crate::utils::lines::open_log;
use crate::utils::naming::LogNaming;
use crate::utils::rounding::round_to;

/// Cell case an event line can fall into. One line may count for several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidueCase {
    App,
    AppTx,
    AppTxFirst,
    AppTxRetry,
    AppRx,
    Broadcast,
    BroadcastTx,
    BroadcastRx,
    Unicast,
    UnicastTx,
    UnicastTxFirst,
    UnicastTxRetry,
    UnicastRx,
}

impl ResidueCase {
    pub const ALL: [ResidueCase; 13] = [
        ResidueCase::App,
        ResidueCase::AppTx,
        ResidueCase::AppTxFirst,
        ResidueCase::AppTxRetry,
        ResidueCase::AppRx,
        ResidueCase::Broadcast,
        ResidueCase::BroadcastTx,
        ResidueCase::BroadcastRx,
        ResidueCase::Unicast,
        ResidueCase::UnicastTx,
        ResidueCase::UnicastTxFirst,
        ResidueCase::UnicastTxRetry,
        ResidueCase::UnicastRx,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResidueCase::App => "A",
            ResidueCase::AppTx => "A_t",
            ResidueCase::AppTxFirst => "A_t_o",
            ResidueCase::AppTxRetry => "A_t_n",
            ResidueCase::AppRx => "A_r",
            ResidueCase::Broadcast => "bc",
            ResidueCase::BroadcastTx => "bc_t",
            ResidueCase::BroadcastRx => "bc_r",
            ResidueCase::Unicast => "uc",
            ResidueCase::UnicastTx => "uc_t",
            ResidueCase::UnicastTxFirst => "uc_t_o",
            ResidueCase::UnicastTxRetry => "uc_t_n",
            ResidueCase::UnicastRx => "uc_r",
        }
    }
}

fn token_after<'a>(contents: &[&'a str], marker: &str) -> Option<&'a str> {
    let pos = contents.iter().position(|t| *t == marker)?;
    contents.get(pos + 1).copied()
}

/// First attempt (`st 0`) or retransmission
fn tx_attempt(contents: &[&str], first: ResidueCase, retry: ResidueCase) -> Result<ResidueCase, ParseError> {
    match token_after(contents, "st") {
        Some("0") => Ok(first),
        Some(_) => Ok(retry),
        None => Err(ParseError::MissingCompanion {
            key: "tx".to_string(),
            companion: "st".to_string(),
        }),
    }
}

/// Cases an event belongs to, in table order.
pub fn classify(contents: &[&str]) -> Result<Vec<ResidueCase>, ParseError> {
    let mut cases = Vec::new();
    let direction = contents.get(1).copied();

    if contents.contains(&"a_seq") {
        cases.push(ResidueCase::App);
        match direction {
            Some("tx") => {
                cases.push(ResidueCase::AppTx);
                cases.push(tx_attempt(contents, ResidueCase::AppTxFirst, ResidueCase::AppTxRetry)?);
            }
            Some("rx") => cases.push(ResidueCase::AppRx),
            _ => {}
        }
    }

    match (contents.first().copied(), direction) {
        (Some("bc-1-0"), d) => {
            cases.push(ResidueCase::Broadcast);
            match d {
                Some("tx") => cases.push(ResidueCase::BroadcastTx),
                Some("rx") => cases.push(ResidueCase::BroadcastRx),
                _ => {}
            }
        }
        (Some("uc-1-0"), d) => {
            cases.push(ResidueCase::Unicast);
            match d {
                Some("tx") => {
                    cases.push(ResidueCase::UnicastTx);
                    cases.push(tx_attempt(
                        contents,
                        ResidueCase::UnicastTxFirst,
                        ResidueCase::UnicastTxRetry,
                    )?);
                }
                Some("rx") => cases.push(ResidueCase::UnicastRx),
                _ => {}
            }
        }
        _ => {}
    }
    Ok(cases)
}

/// Idle time printed after `idle`, up to the first comma.
pub fn idle_time(contents: &[&str]) -> Result<i64, ParseError> {
    let raw = token_after(contents, "idle").ok_or_else(|| ParseError::MissingCompanion {
        key: "{asn".to_string(),
        companion: "idle".to_string(),
    })?;
    let value = raw.split(',').next().unwrap_or(raw);
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: "idle".to_string(),
        value: value.to_string(),
    })
}

/// Occurrences and summed idle time per case for one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidueTally {
    counts: [u64; 13],
    idle_sums: [i64; 13],
    in_data_period: bool,
}

fn is_data_period_marker(line: &str) -> bool {
    let Some(body) = line.split("] ").nth(1) else {
        return false;
    };
    let mut tokens = body.split(' ');
    match tokens.next() {
        Some("reset_log") => true,
        Some("HCK") => tokens.next() == Some("reset_log"),
        _ => false,
    }
}

impl ResidueTally {
    /// Apply one log line.
    pub fn observe(&mut self, line: &str) -> Result<(), ParseError> {
        if !self.in_data_period {
            self.in_data_period = is_data_period_marker(line);
            return Ok(());
        }
        let Some(contents) = asn_event_contents(line) else {
            return Ok(());
        };
        let cases = classify(&contents)?;
        if cases.is_empty() {
            return Ok(());
        }
        let idle = idle_time(&contents)?;
        for case in cases {
            let slot = case as usize;
            self.counts[slot] += 1;
            self.idle_sums[slot] += idle;
        }
        Ok(())
    }

    pub fn count(&self, case: ResidueCase) -> u64 {
        self.counts[case as usize]
    }

    /// Mean idle time per case, one decimal, in table order.
    pub fn means(&self) -> Vec<ResultValue> {
        ResidueCase::ALL
            .iter()
            .map(|case| {
                let slot = *case as usize;
                match self.counts[slot] {
                    0 => ResultValue::NotApplicable,
                    n => ResultValue::Float(round_to(self.idle_sums[slot] as f64 / n as f64, 1)),
                }
            })
            .collect()
    }
}

/// Tally one node's log.
pub fn tally_log(path: &Path) -> Result<ResidueTally> {
    let mut tally = ResidueTally::default();
    for item in open_log(path)? {
        let (line_number, text) =
            item.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        tally
            .observe(&text)
            .with_context(|| format!("{}:{}", path.display(), line_number))?;
    }
    debug!(
        "{}: {} unicast events in the data period",
        path.display(),
        tally.count(ResidueCase::Unicast)
    );
    Ok(tally)
}

/// Tally every node of the registry, root first.
pub fn residue_times(registry: &NodeRegistry, naming: &LogNaming) -> Result<Vec<(NodeId, ResidueTally)>> {
    let ids: Vec<NodeId> = registry.iter().map(|(_, node)| node.id).collect();
    ids.into_par_iter()
        .map(|id| -> Result<(NodeId, ResidueTally)> { Ok((id, tally_log(&naming.path(id))?)) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(text: &str) -> Vec<&str> {
        text.split(' ').collect()
    }

    #[test]
    fn test_app_unicast_retry_counts_in_every_matching_case() {
        let cases = classify(&contents("uc-1-0 tx st 2 idle 900,1 a_seq 7")).unwrap();
        assert_eq!(
            cases,
            vec![
                ResidueCase::App,
                ResidueCase::AppTx,
                ResidueCase::AppTxRetry,
                ResidueCase::Unicast,
                ResidueCase::UnicastTx,
                ResidueCase::UnicastTxRetry,
            ]
        );
    }

    #[test]
    fn test_broadcast_rx_and_unrelated_cells() {
        assert_eq!(
            classify(&contents("bc-1-0 rx idle 10")).unwrap(),
            vec![ResidueCase::Broadcast, ResidueCase::BroadcastRx]
        );
        assert!(classify(&contents("eb-1-0 tx idle 10")).unwrap().is_empty());
    }

    #[test]
    fn test_idle_time_parsing() {
        assert_eq!(idle_time(&contents("uc-1-0 rx idle 1840,22")).unwrap(), 1840);
        assert!(idle_time(&contents("uc-1-0 rx")).is_err());
        assert!(idle_time(&contents("uc-1-0 rx idle x")).is_err());
    }

    #[test]
    fn test_tally_starts_after_data_period_marker() {
        let mut tally = ResidueTally::default();
        for line in [
            "[INFO: TSCH] {asn 01} uc-1-0 rx idle 500",
            "[INFO: App] HCK reset_log 1",
            "[INFO: TSCH] {asn 02} uc-1-0 rx idle 100",
            "[INFO: TSCH] {asn 03} uc-1-0 rx idle 150,3",
            "[INFO: TSCH] {asn 04} uc-1-0 tx st 0 idle 40",
        ] {
            tally.observe(line).unwrap();
        }

        let means = tally.means();
        assert_eq!(means[8], ResultValue::Float(96.7));
        assert_eq!(means[10], ResultValue::Float(40.0));
        assert_eq!(means[12], ResultValue::Float(125.0));
        assert_eq!(means[0], ResultValue::NotApplicable);
    }
}
