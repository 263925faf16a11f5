//! Report generation for phase-segmented evaluations.
//!
//! Console tables are tab-separated with a space before each tab, the
//! result file is plain tab-separated, and the JSON report carries every
//! phase with `null` for undefined values.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::derive::{Evaluation, ResultColumn};
use super::summary::EvalSummary;
use super::types::*;
use crate::config::EvalConfig;
use crate::registry::NodeRegistry;
use crate::utils::rounding::format_float;

const CONSOLE_SEPARATOR: &str = " \t";
const FILE_SEPARATOR: &str = "\t";

/// Text of one result cell
pub fn format_value(value: &ResultValue) -> String {
    match value {
        ResultValue::Int(v) => v.to_string(),
        ResultValue::Float(v) => format_float(*v),
        ResultValue::Text(s) => s.clone(),
        ResultValue::NotApplicable => "NaN".to_string(),
    }
}

/// Run parameters echoed at the top of the console report
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub variant: Variant,
    pub scheduler: Option<String>,
    pub iteration: Option<String>,
    pub header_id: Option<NodeId>,
    pub show_all: bool,
    pub root_id: NodeId,
    pub node_count: usize,
}

impl RunInfo {
    pub fn new(config: &EvalConfig, registry: &NodeRegistry) -> Self {
        Self {
            variant: config.variant,
            scheduler: config.scheduler.clone(),
            iteration: config.iteration.clone(),
            header_id: config.header_id,
            show_all: config.show_all,
            root_id: registry.root().id,
            node_count: registry.len(),
        }
    }

    fn lines(&self) -> Vec<String> {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        vec![
            "----- evaluation info -----".to_string(),
            format!("variant: {}", self.variant),
            format!("any_scheduler: {}", or_dash(&self.scheduler)),
            format!("any_iter: {}", or_dash(&self.iteration)),
            format!(
                "any_id: {}",
                self.header_id.map_or_else(|| "-".to_string(), |id| id.to_string())
            ),
            format!("show_all: {}", i64::from(self.show_all)),
            String::new(),
            format!("Root node: {}", self.root_id),
            format!("{} nodes", self.node_count),
            String::new(),
        ]
    }
}

fn join_cells<'a>(cells: impl IntoIterator<Item = &'a ResultValue>, separator: &str) -> String {
    cells
        .into_iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(separator)
}

fn join_headers(columns: &[ResultColumn], separator: &str) -> String {
    columns
        .iter()
        .map(ResultColumn::name)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Console report lines: run info, then one table per reached phase.
pub fn console_lines(info: &RunInfo, evaluation: &Evaluation, show_all: bool) -> Vec<String> {
    let mut lines = info.lines();
    let layout = &evaluation.layout;
    let split = layout.split;

    for (index, phase) in evaluation.phases.iter().enumerate() {
        lines.push(format!("----- {} period -----", phase.phase.title()));

        lines.push(join_headers(layout.core(), CONSOLE_SEPARATOR));
        for row in &phase.rows {
            lines.push(join_cells(&row.values[..split], CONSOLE_SEPARATOR));
        }
        lines.push(String::new());

        if show_all && !layout.extended().is_empty() {
            let mut header = join_headers(layout.extended(), CONSOLE_SEPARATOR);
            header.push_str(CONSOLE_SEPARATOR);
            header.push_str(ResultColumn::Id.name());
            lines.push(header);
            for row in &phase.rows {
                let cells = row.values[split..].iter().chain(row.values.first());
                lines.push(join_cells(cells, CONSOLE_SEPARATOR));
            }
            lines.push(String::new());
        }

        if index == evaluation.root_phase && !evaluation.root_finished() {
            lines.push(format!("----- In {} period -----", phase.phase.label()));
            lines.push(String::new());
            break;
        }
    }
    lines
}

/// Print the console report to stdout
pub fn print_report(info: &RunInfo, evaluation: &Evaluation, show_all: bool) {
    for line in console_lines(info, evaluation, show_all) {
        println!("{}", line);
    }
}

/// Data-period rows with every column, tab-separated
pub fn result_file_lines(evaluation: &Evaluation) -> Vec<String> {
    let mut lines = vec![join_headers(&evaluation.layout.columns, FILE_SEPARATOR)];
    if let Some(data) = evaluation.phases.last() {
        lines.extend(
            data.rows
                .iter()
                .map(|row| join_cells(&row.values, FILE_SEPARATOR)),
        );
    }
    lines
}

fn write_lines(lines: &[String], output_path: &Path) -> Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))
}

/// Generate the tab-separated result file
pub fn generate_text_report(evaluation: &Evaluation, output_path: &Path) -> Result<()> {
    write_lines(&result_file_lines(evaluation), output_path)?;
    log::info!("Result table written to {}", output_path.display());
    Ok(())
}

/// Generate the evaluation summary file
pub fn generate_summary_report(summary: &EvalSummary, output_path: &Path) -> Result<()> {
    write_lines(&summary.lines(), output_path)?;
    log::info!("Summary written to {}", output_path.display());
    Ok(())
}

/// Print the evaluation summary to stdout
pub fn print_summary(summary: &EvalSummary) {
    println!("----- Evaluation configuration -----");
    for line in summary.lines() {
        println!("{}", line);
    }
}

/// One phase of the JSON report
#[derive(Debug, Serialize)]
pub struct JsonPhase<'a> {
    pub phase: Phase,
    pub rows: Vec<&'a [ResultValue]>,
}

/// Machine-readable form of a whole evaluation
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub run: &'a RunInfo,
    pub columns: Vec<&'static str>,
    pub split: usize,
    pub root_phase: Phase,
    pub root_finished: bool,
    pub flags: DetectedFlags,
    pub phases: Vec<JsonPhase<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a EvalSummary>,
}

impl<'a> JsonReport<'a> {
    pub fn new(
        run: &'a RunInfo,
        evaluation: &'a Evaluation,
        flags: DetectedFlags,
        summary: Option<&'a EvalSummary>,
    ) -> Self {
        Self {
            run,
            columns: evaluation.layout.headers(),
            split: evaluation.layout.split,
            root_phase: evaluation.phases[evaluation.root_phase].phase,
            root_finished: evaluation.root_finished(),
            flags,
            phases: evaluation
                .phases
                .iter()
                .map(|p| JsonPhase {
                    phase: p.phase,
                    rows: p.rows.iter().map(|r| r.values.as_slice()).collect(),
                })
                .collect(),
            summary,
        }
    }
}

/// Generate JSON report
pub fn generate_json_report(report: &JsonReport<'_>, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::derive::evaluate;
    use crate::analysis::keys::MetricKey;

    fn run_info(variant: Variant) -> RunInfo {
        RunInfo {
            variant,
            scheduler: Some("alice".to_string()),
            iteration: Some("1".to_string()),
            header_id: Some(1),
            show_all: false,
            root_id: 1,
            node_count: 2,
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::with_root(1, None);
        registry.add_non_root(2, None);
        registry
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(format_value(&ResultValue::Int(7)), "7");
        assert_eq!(format_value(&ResultValue::Float(50.0)), "50.0");
        assert_eq!(format_value(&ResultValue::Float(66.67)), "66.67");
        assert_eq!(format_value(&ResultValue::NotApplicable), "NaN");
    }

    #[test]
    fn test_unfinished_root_stops_after_its_phase() {
        let mut tables = PhaseTables::new(Variant::Hk, 2);
        tables.nodes[1].phases[0].metrics.set(MetricKey::TxUp, 10);
        let evaluation = evaluate(&tables, &registry());
        let lines = console_lines(&run_info(Variant::Hk), &evaluation, false);

        assert!(lines.contains(&"----- Bootstrap period -----".to_string()));
        assert!(lines.contains(&"----- In bootstrap period -----".to_string()));
        assert!(!lines.iter().any(|l| l == "----- Data period -----"));

        let header = lines.iter().position(|l| l.starts_with("id \tboot")).unwrap();
        assert!(lines[header + 2].starts_with("2 \t0 \t10 \t0 \t0.0 \t0 \t0 \tNaN"));
    }

    #[test]
    fn test_extended_block_ends_with_id() {
        let mut tables = PhaseTables::new(Variant::Hk, 2);
        tables.root_phase = 1;
        let evaluation = evaluate(&tables, &registry());
        let lines = console_lines(&run_info(Variant::Hk), &evaluation, true);

        let header = lines.iter().position(|l| l.starts_with("SCR \t")).unwrap();
        assert!(lines[header].ends_with("PERE \tid"));
        assert!(lines[header + 1].ends_with(" \t1"));
        assert!(!lines.iter().any(|l| l.starts_with("----- In")));
    }

    #[test]
    fn test_result_file_holds_data_period() {
        let mut tables = PhaseTables::new(Variant::HkV6, 2);
        tables.nodes[1].phases[2].metrics.set(MetricKey::TxUp, 4);
        tables.root_phase = 2;
        let evaluation = evaluate(&tables, &registry());
        let lines = result_file_lines(&evaluation);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id\tbootP\tbootQ\topku\ttx_up"));
        assert!(lines[0].ends_with("PETE\tPERE"));
        assert!(lines[2].starts_with("2\t0\t0\t0\t4\t"));
    }

    #[test]
    fn test_json_renders_undefined_as_null() {
        let tables = PhaseTables::new(Variant::Hk, 2);
        let evaluation = evaluate(&tables, &registry());
        let info = run_info(Variant::Hk);
        let report = JsonReport::new(&info, &evaluation, tables.flags, None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["columns"][0], "id");
        assert_eq!(json["root_phase"], "bootstrap");
        assert!(json["phases"][0]["rows"][1][4].is_null());
        assert_eq!(json["phases"][0]["rows"][1][0], 2);
    }
}
