use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::finding::{Finding, FindingCode, Severity};
use crate::modal::{Positioning, Units};
use crate::tokenizer::{Axis, ParsedLine};

const MM_PER_INCH: f64 = 25.4;
const BOUND_EPSILON: f64 = 1e-9;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Millimeter,
    Inch,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct AxisLimit {
    pub min: f64,
    pub max: f64,
    /// Rotary axis with unlimited (wrap-around) travel.
    #[serde(default)]
    pub continuous: bool,
}

impl AxisLimit {
    pub const fn bounded(min: f64, max: f64) -> Self {
        Self { min, max, continuous: false }
    }

    pub const fn continuous(min: f64, max: f64) -> Self {
        Self { min, max, continuous: true }
    }
}

/// Physical travel of up to six axes. Axes without a limit are not checked.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MachineEnvelope {
    #[serde(default)]
    pub unit: LengthUnit,
    pub axes: BTreeMap<Axis, AxisLimit>,
}

impl Default for MachineEnvelope {
    fn default() -> Self {
        Self::new(LengthUnit::Millimeter)
            .with_axis(Axis::X, AxisLimit::bounded(0.0, 500.0))
            .with_axis(Axis::Y, AxisLimit::bounded(0.0, 400.0))
            .with_axis(Axis::Z, AxisLimit::bounded(-300.0, 0.0))
            .with_axis(Axis::A, AxisLimit::bounded(-120.0, 120.0))
            .with_axis(Axis::C, AxisLimit::continuous(-360.0, 360.0))
    }
}

impl MachineEnvelope {
    pub fn new(unit: LengthUnit) -> Self {
        Self { unit, axes: BTreeMap::new() }
    }

    pub fn with_axis(mut self, axis: Axis, limit: AxisLimit) -> Self {
        self.axes.insert(axis, limit);
        self
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        for (axis, limit) in &self.axes {
            if !limit.min.is_finite() || !limit.max.is_finite() {
                return Err(ConfigError::NonFiniteAxisBounds { axis: *axis });
            }
            if limit.min > limit.max {
                return Err(ConfigError::InvertedAxisBounds { axis: *axis, min: limit.min, max: limit.max });
            }
            if limit.continuous && !axis.is_rotary() {
                return Err(ConfigError::ContinuousLinearAxis { axis: *axis });
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnvelopeViolation {
    pub line: usize,
    pub axis: Axis,
    pub value: f64,
    /// The bound that was crossed.
    pub limit: f64,
    pub message: String,
    pub severity: Severity,
}

impl EnvelopeViolation {
    pub fn to_finding(&self) -> Finding {
        let code = match self.severity {
            Severity::Error => FindingCode::AxisOverTravel,
            Severity::Warning => FindingCode::RotaryOverTravel,
        };
        Finding::new(self.line, code, self.message.clone())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Extents {
    pub min: BTreeMap<Axis, f64>,
    pub max: BTreeMap<Axis, f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeReport {
    pub valid: bool,
    pub violations: Vec<EnvelopeViolation>,
    pub warnings: Vec<EnvelopeViolation>,
    pub traversed_extents: Extents,
}

/// Replays axis words against the envelope with its own position accumulator.
pub struct EnvelopeChecker<'a> {
    envelope: &'a MachineEnvelope,
    positioning: Positioning,
    units: Units,
    position: [f64; 6],
    extents: Extents,
    violations: Vec<EnvelopeViolation>,
    warnings: Vec<EnvelopeViolation>,
}

impl<'a> EnvelopeChecker<'a> {
    pub fn new(envelope: &'a MachineEnvelope) -> Self {
        Self {
            envelope,
            positioning: Positioning::Absolute,
            units: Units::Millimeter,
            position: [0.0; 6],
            extents: Extents::default(),
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Running absolute position of `axis`, in envelope units.
    pub fn position(&self, axis: Axis) -> f64 {
        self.position[axis as usize]
    }

    fn to_envelope_unit(&self, value: f64) -> f64 {
        match (self.units, self.envelope.unit) {
            (Units::Inch, LengthUnit::Millimeter) => value * MM_PER_INCH,
            (Units::Millimeter, LengthUnit::Inch) => value / MM_PER_INCH,
            _ => value,
        }
    }

    pub fn feed(&mut self, line: &ParsedLine) {
        for g in &line.g_codes {
            match g.whole() {
                Some(90) => self.positioning = Positioning::Absolute,
                Some(91) => self.positioning = Positioning::Incremental,
                Some(20) => self.units = Units::Inch,
                Some(21) => self.units = Units::Millimeter,
                _ => {}
            }
        }
        // Reference returns, machine-coordinate moves and presets are not
        // work-coordinate targets.
        if line.is_non_modal_positioning() {
            return;
        }

        for axis in Axis::ALL {
            let Some(raw) = line.axis(axis) else { continue };
            let value = if axis.is_rotary() { raw } else { self.to_envelope_unit(raw) };
            let slot = &mut self.position[axis as usize];
            *slot = match self.positioning {
                Positioning::Absolute => value,
                Positioning::Incremental => *slot + value,
            };
            let pos = *slot;

            let lo = self.extents.min.entry(axis).or_insert(0.0);
            *lo = lo.min(pos);
            let hi = self.extents.max.entry(axis).or_insert(0.0);
            *hi = hi.max(pos);

            self.check_axis(line.line, axis, pos);
        }
    }

    fn check_axis(&mut self, line: usize, axis: Axis, pos: f64) {
        let Some(limit) = self.envelope.axes.get(&axis) else { return };
        if axis.is_rotary() && limit.continuous {
            return;
        }
        let (bound, side) = if pos > limit.max + BOUND_EPSILON {
            (limit.max, "maximum")
        } else if pos < limit.min - BOUND_EPSILON {
            (limit.min, "minimum")
        } else {
            return;
        };

        let severity = if axis.is_rotary() { Severity::Warning } else { Severity::Error };
        let violation = EnvelopeViolation {
            line,
            axis,
            value: pos,
            limit: bound,
            message: format!("{axis}{pos:.3} is beyond the {side} travel of {bound:.3}"),
            severity,
        };
        match severity {
            Severity::Error => self.violations.push(violation),
            Severity::Warning => self.warnings.push(violation),
        }
    }

    pub fn finish(self) -> EnvelopeReport {
        EnvelopeReport {
            valid: self.violations.is_empty(),
            violations: self.violations,
            warnings: self.warnings,
            traversed_extents: self.extents,
        }
    }
}

pub(crate) fn scan(lines: &[ParsedLine], envelope: &MachineEnvelope) -> EnvelopeReport {
    let mut checker = EnvelopeChecker::new(envelope);
    for line in lines {
        checker.feed(line);
    }
    let report = checker.finish();
    console_log!(
        "Envelope check: {} lines, {} violations, {} warnings",
        lines.len(),
        report.violations.len(),
        report.warnings.len()
    );
    report
}

/// Checks every axis word of the program against the machine's travel.
pub fn check_envelope(lines: &[ParsedLine], envelope: &MachineEnvelope) -> Result<EnvelopeReport, ConfigError> {
    envelope.check()?;
    Ok(scan(lines, envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_program;

    fn approx_eq(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-6, "expected {b:.6}, got {a:.6}");
    }

    fn xyz_envelope() -> MachineEnvelope {
        MachineEnvelope::new(LengthUnit::Millimeter)
            .with_axis(Axis::X, AxisLimit::bounded(0.0, 500.0))
            .with_axis(Axis::Y, AxisLimit::bounded(0.0, 500.0))
            .with_axis(Axis::Z, AxisLimit::bounded(-100.0, 0.0))
    }

    #[test]
    fn coordinate_beyond_max_is_one_violation() {
        let report = check_envelope(&tokenize_program("G00 X600."), &xyz_envelope()).unwrap();
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        let v = &report.violations[0];
        assert_eq!(v.axis, Axis::X);
        approx_eq(v.value, 600.0);
        approx_eq(v.limit, 500.0);
        assert_eq!(v.line, 1);
        assert_eq!(v.to_finding().code, FindingCode::AxisOverTravel);
    }

    #[test]
    fn moves_inside_bounds_are_clean() {
        let report = check_envelope(&tokenize_program("G00 X100. Y100. Z-50."), &xyz_envelope()).unwrap();
        assert!(report.valid);
        assert!(report.violations.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn below_min_reports_min_bound() {
        let report = check_envelope(&tokenize_program("G00 Z-150."), &xyz_envelope()).unwrap();
        assert_eq!(report.violations.len(), 1);
        approx_eq(report.violations[0].limit, -100.0);
    }

    #[test]
    fn incremental_moves_accumulate() {
        let lines = tokenize_program("G91\nG01 X10. F100\nX10.\nX10.");
        let envelope = xyz_envelope();
        let mut checker = EnvelopeChecker::new(&envelope);
        for line in &lines {
            checker.feed(line);
        }
        approx_eq(checker.position(Axis::X), 30.0);
        let report = checker.finish();
        approx_eq(report.traversed_extents.max[&Axis::X], 30.0);
        approx_eq(report.traversed_extents.min[&Axis::X], 0.0);
    }

    #[test]
    fn g90_g91_toggle_applies_to_following_words() {
        let lines = tokenize_program("G00 X50.\nG91 X-20.\nG90 X5.");
        let envelope = xyz_envelope();
        let mut checker = EnvelopeChecker::new(&envelope);
        checker.feed(&lines[0]);
        checker.feed(&lines[1]);
        approx_eq(checker.position(Axis::X), 30.0);
        checker.feed(&lines[2]);
        approx_eq(checker.position(Axis::X), 5.0);
    }

    #[test]
    fn extents_track_whole_program() {
        let report = check_envelope(&tokenize_program("G00 X20. Y5.\nX400.\nX40. Y300."), &xyz_envelope()).unwrap();
        approx_eq(report.traversed_extents.max[&Axis::X], 400.0);
        approx_eq(report.traversed_extents.max[&Axis::Y], 300.0);
        assert!(!report.traversed_extents.max.contains_key(&Axis::Z));
    }

    #[test]
    fn bounded_rotary_overtravel_is_a_warning() {
        let envelope = xyz_envelope().with_axis(Axis::A, AxisLimit::bounded(-120.0, 120.0));
        let report = check_envelope(&tokenize_program("G00 A150."), &envelope).unwrap();
        assert!(report.valid);
        assert!(report.violations.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].to_finding().code, FindingCode::RotaryOverTravel);
    }

    #[test]
    fn continuous_rotary_is_never_flagged() {
        let envelope = xyz_envelope().with_axis(Axis::C, AxisLimit::continuous(-360.0, 360.0));
        let report = check_envelope(&tokenize_program("G91\nG00 C270.\nC270.\nC270."), &envelope).unwrap();
        assert!(report.valid);
        assert!(report.warnings.is_empty());
        approx_eq(report.traversed_extents.max[&Axis::C], 810.0);
    }

    #[test]
    fn inch_program_is_converted_to_millimeter_envelope() {
        let report = check_envelope(&tokenize_program("G20\nG00 X10."), &xyz_envelope()).unwrap();
        assert!(report.valid);
        approx_eq(report.traversed_extents.max[&Axis::X], 254.0);

        let report = check_envelope(&tokenize_program("G20\nG00 X20."), &xyz_envelope()).unwrap();
        assert_eq!(report.violations.len(), 1);
        approx_eq(report.violations[0].value, 508.0);
    }

    #[test]
    fn reference_return_words_are_not_targets() {
        let report = check_envelope(&tokenize_program("G91 G28 Z0.\nG90 G53 X-400."), &xyz_envelope()).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn inverted_bounds_fail_before_scanning() {
        let envelope = MachineEnvelope::new(LengthUnit::Millimeter)
            .with_axis(Axis::Y, AxisLimit::bounded(10.0, -10.0));
        let err = check_envelope(&tokenize_program("G00 Y1."), &envelope).unwrap_err();
        assert!(matches!(err, ConfigError::InvertedAxisBounds { axis: Axis::Y, .. }));
    }

    #[test]
    fn continuous_linear_axis_is_rejected() {
        let envelope = MachineEnvelope::new(LengthUnit::Millimeter)
            .with_axis(Axis::X, AxisLimit::continuous(0.0, 10.0));
        assert!(matches!(envelope.check(), Err(ConfigError::ContinuousLinearAxis { axis: Axis::X })));
    }

    #[test]
    fn default_envelope_is_valid() {
        MachineEnvelope::default().check().unwrap();
    }
}
