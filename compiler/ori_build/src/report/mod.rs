//! Build reports.
//!
//! The [`DiagnosticsAggregator`] counts errors and warnings as results come
//! in and groups diagnostics by unit, then by line. [`finish`] turns that
//! into a [`BuildReport`] whose first node is the build summary.
//!
//! [`finish`]: DiagnosticsAggregator::finish

use std::collections::BTreeMap;

use ori_diagnostic::{Diagnostic, Severity};

use crate::consumer::CompileConsumer;
use crate::unit::CompileResult;
use crate::BuildError;

/// Kind of a node in the report tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    Info,
    Warning,
    Error,
    /// The build process did not complete.
    Failure,
}

impl NodeKind {
    fn of(severity: Severity) -> Self {
        match severity {
            Severity::Error => NodeKind::Error,
            Severity::Warning => NodeKind::Warning,
            Severity::Note | Severity::Help => NodeKind::Info,
        }
    }

    fn rank(self) -> u8 {
        match self {
            NodeKind::Info => 0,
            NodeKind::Warning => 1,
            NodeKind::Error => 2,
            NodeKind::Failure => 3,
        }
    }

    /// The more severe of two kinds.
    fn max(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Severity to render this kind with.
    pub fn severity(self) -> Severity {
        match self {
            NodeKind::Info => Severity::Note,
            NodeKind::Warning => Severity::Warning,
            NodeKind::Error | NodeKind::Failure => Severity::Error,
        }
    }
}

/// One node of the report tree.
///
/// Unit nodes contain line nodes, line nodes contain diagnostic leaves.
/// Diagnostics without a line hang directly off their unit.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ReportNode {
    pub kind: NodeKind,
    pub message: String,
    pub children: Vec<ReportNode>,
    /// Set on leaves.
    pub diagnostic: Option<Diagnostic>,
}

impl ReportNode {
    fn leaf(diagnostic: Diagnostic) -> Self {
        ReportNode {
            kind: NodeKind::of(diagnostic.severity),
            message: diagnostic.message.clone(),
            children: Vec::new(),
            diagnostic: Some(diagnostic),
        }
    }

    fn group(message: String, children: Vec<ReportNode>) -> Self {
        let kind = children
            .iter()
            .map(|child| child.kind)
            .fold(NodeKind::Info, NodeKind::max);
        ReportNode {
            kind,
            message,
            children,
            diagnostic: None,
        }
    }

    /// Diagnostics in this subtree, depth first.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut out = Vec::new();
        self.collect_diagnostics(&mut out);
        out
    }

    fn collect_diagnostics<'a>(&'a self, out: &mut Vec<&'a Diagnostic>) {
        if let Some(diagnostic) = &self.diagnostic {
            out.push(diagnostic);
        }
        for child in &self.children {
            child.collect_diagnostics(out);
        }
    }
}

/// Outcome of one build, for display.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BuildReport {
    pub error_count: usize,
    pub warning_count: usize,
    /// Whether the build process ran to completion. Counts of an incomplete
    /// build cover only the units compiled before it stopped.
    pub completed: bool,
    /// Summary first, then one node per unit ordered by unit name.
    pub nodes: Vec<ReportNode>,
    /// Index of the selected node.
    pub selected: Option<usize>,
}

impl BuildReport {
    /// Report for a build that aborted with `error`.
    pub fn failed(error: &BuildError) -> Self {
        let mut aggregator = DiagnosticsAggregator::new();
        aggregator.record_diagnostic("build", error.to_diagnostic());
        aggregator.finish(false)
    }

    pub fn summary(&self) -> Option<&ReportNode> {
        self.selected.and_then(|index| self.nodes.get(index))
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Every diagnostic in the report, in tree order.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.nodes.iter().flat_map(ReportNode::diagnostics).collect()
    }
}

/// The one-line summary of a build.
pub fn summary_message(error_count: usize, warning_count: usize, completed: bool) -> String {
    if !completed {
        return "Compilation failed to complete".to_string();
    }
    format!(
        "Compilation completed with {} and {}",
        plural(error_count, "error", "errors"),
        plural(warning_count, "warning", "warnings"),
    )
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

/// Collects diagnostics of a build.
#[derive(Debug, Default)]
pub struct DiagnosticsAggregator {
    error_count: usize,
    warning_count: usize,
    /// Unit -> line -> diagnostics. Unlined diagnostics sort first.
    units: BTreeMap<String, BTreeMap<Option<u32>, Vec<Diagnostic>>>,
}

impl DiagnosticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Record every diagnostic of `result`.
    pub fn record(&mut self, result: &CompileResult) {
        for diagnostic in &result.diagnostics {
            self.record_diagnostic(result.unit.as_str(), diagnostic.clone());
        }
    }

    /// Record one diagnostic, filed under its own location's unit or under
    /// `default_unit` when it has none.
    pub fn record_diagnostic(&mut self, default_unit: &str, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note | Severity::Help => {}
        }
        let unit = diagnostic
            .location
            .as_ref()
            .map_or(default_unit, |location| location.unit.as_str())
            .to_string();
        self.units
            .entry(unit)
            .or_default()
            .entry(diagnostic.line())
            .or_default()
            .push(diagnostic);
    }

    /// Build the report. The summary node goes first and is selected.
    pub fn finish(self, completed: bool) -> BuildReport {
        let message = summary_message(self.error_count, self.warning_count, completed);
        let summary_kind = if !completed {
            NodeKind::Failure
        } else if self.error_count > 0 {
            NodeKind::Error
        } else if self.warning_count > 0 {
            NodeKind::Warning
        } else {
            NodeKind::Info
        };

        let mut nodes = Vec::with_capacity(self.units.len() + 1);
        for (unit, lines) in self.units {
            let mut children = Vec::new();
            for (line, diagnostics) in lines {
                let leaves = diagnostics.into_iter().map(ReportNode::leaf);
                match line {
                    Some(line) => {
                        children.push(ReportNode::group(format!("line {line}"), leaves.collect()));
                    }
                    None => children.extend(leaves),
                }
            }
            nodes.push(ReportNode::group(unit, children));
        }

        nodes.insert(
            0,
            ReportNode {
                kind: summary_kind,
                message,
                children: Vec::new(),
                diagnostic: None,
            },
        );

        BuildReport {
            error_count: self.error_count,
            warning_count: self.warning_count,
            completed,
            nodes,
            selected: Some(0),
        }
    }
}

impl CompileConsumer for DiagnosticsAggregator {
    fn accept(&mut self, result: &CompileResult) -> bool {
        self.record(result);
        !result.is_errant()
    }
}
