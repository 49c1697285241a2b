use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::arc::check_arc;
use crate::config::ValidatorLimits;
use crate::error::ConfigError;
use crate::finding::{Finding, FindingCode, Severity};
use crate::modal::{CutterComp, ModalState, MotionMode, Spindle};
use crate::profile::ControllerProfile;
use crate::tokenizer::{Code, ParsedLine, tokenize_program};
use crate::validators::{check_dialect, check_motion_and_feed};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MovementTally {
    pub rapid: usize,
    pub linear: usize,
    #[serde(rename = "arcCW")]
    pub arc_cw: usize,
    #[serde(rename = "arcCCW")]
    pub arc_ccw: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub line_count: usize,
    /// Occurrences per code word, keyed like `G01` or `M03`.
    pub code_usage: BTreeMap<String, usize>,
    pub tool_changes: usize,
    pub movement_tally: MovementTally,
    pub error_count: usize,
    pub warning_count: usize,
}

impl Statistics {
    fn record(&mut self, line: &ParsedLine, state: &ModalState) {
        for g in &line.g_codes {
            *self.code_usage.entry(g.label('G')).or_insert(0) += 1;
        }
        for m in &line.m_codes {
            *self.code_usage.entry(m.label('M')).or_insert(0) += 1;
        }
        if line.has_m(Code::new(6)) {
            self.tool_changes += 1;
        }
        match state.motion_block(line) {
            Some(MotionMode::Rapid) => self.movement_tally.rapid += 1,
            Some(MotionMode::Linear) => self.movement_tally.linear += 1,
            Some(MotionMode::ClockwiseArc) => self.movement_tally.arc_cw += 1,
            Some(MotionMode::CounterClockwiseArc) => self.movement_tally.arc_ccw += 1,
            None => {}
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// False iff any error-severity finding exists.
    pub valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub statistics: Statistics,
    pub final_modal_state: ModalState,
}

impl ValidationReport {
    pub fn count(&self, code: FindingCode) -> usize {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(|f| f.code == code)
            .count()
    }

    /// All findings in program order.
    pub fn findings(&self) -> Vec<&Finding> {
        let mut all: Vec<&Finding> = self.errors.iter().chain(self.warnings.iter()).collect();
        all.sort_by_key(|f| f.line);
        all
    }
}

fn end_of_program(state: &ModalState, last_line: usize, out: &mut Vec<Finding>) {
    if state.spindle != Spindle::Off {
        out.push(Finding::new(last_line, FindingCode::SpindleLeftOn, "program ends without M05"));
    }
    if state.coolant_on {
        out.push(Finding::new(last_line, FindingCode::CoolantLeftOn, "program ends without M09"));
    }
    if state.cutter_comp != CutterComp::Off {
        out.push(Finding::new(last_line, FindingCode::CutterCompLeftOn, "program ends without G40"));
    }
}

/// Runs the per-line pipeline over already tokenized lines. Configuration
/// must have been checked by the caller.
pub(crate) fn run_validation(
    lines: &[ParsedLine],
    profile: &ControllerProfile,
    limits: &ValidatorLimits,
) -> ValidationReport {
    let mut state = ModalState::default();
    let mut statistics = Statistics { line_count: lines.len(), ..Statistics::default() };
    let mut findings: Vec<Finding> = Vec::new();

    for line in lines {
        let after = state.apply(line);
        check_dialect(line, profile, &mut findings);
        check_motion_and_feed(line, &state, &after, limits, &mut findings);
        check_arc(line, &state, &after, limits.arc_tolerance, &mut findings);
        statistics.record(line, &after);
        state = after;
    }

    let last_line = lines.last().map(|l| l.line).unwrap_or(0);
    end_of_program(&state, last_line, &mut findings);

    let (errors, warnings): (Vec<Finding>, Vec<Finding>) =
        findings.into_iter().partition(|f| f.severity == Severity::Error);
    statistics.error_count = errors.len();
    statistics.warning_count = warnings.len();

    console_log!(
        "Validated {} lines against {}: {} errors, {} warnings",
        lines.len(),
        profile.name,
        errors.len(),
        warnings.len()
    );

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        statistics,
        final_modal_state: state,
    }
}

/// Validates program text against one controller profile.
pub fn validate(
    program: &str,
    profile: &ControllerProfile,
    limits: &ValidatorLimits,
) -> Result<ValidationReport, ConfigError> {
    profile.check()?;
    limits.check()?;
    Ok(run_validation(&tokenize_program(program), profile, limits))
}
