use serde::{Deserialize, Serialize};

use crate::tokenizer::{Code, ParsedLine};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MotionMode { Rapid, Linear, ClockwiseArc, CounterClockwiseArc }

impl MotionMode {
    fn from_code(code: Code) -> Option<Self> {
        match code.whole()? {
            0 => Some(MotionMode::Rapid),
            1 => Some(MotionMode::Linear),
            2 => Some(MotionMode::ClockwiseArc),
            3 => Some(MotionMode::CounterClockwiseArc),
            _ => None,
        }
    }

    pub fn is_cutting(self) -> bool {
        !matches!(self, MotionMode::Rapid)
    }

    pub fn is_arc(self) -> bool {
        matches!(self, MotionMode::ClockwiseArc | MotionMode::CounterClockwiseArc)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Plane { Xy, Zx, Yz }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Units { Inch, Millimeter }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Positioning { Absolute, Incremental }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FeedMode { PerMinute, PerRevolution }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LengthComp { Positive, Negative }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CutterComp { Off, Left, Right }

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Spindle { Off, Clockwise, CounterClockwise }

/// Programmed X/Y/Z in program units. An axis is `None` after a reference
/// return or machine-coordinate move until an absolute word re-establishes it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Position {
    pub const ORIGIN: Position = Position { x: Some(0.0), y: Some(0.0), z: Some(0.0) };

    /// The two in-plane coordinates, ordered as (first axis, second axis).
    pub fn in_plane(&self, plane: Plane) -> (Option<f64>, Option<f64>) {
        match plane {
            Plane::Xy => (self.x, self.y),
            Plane::Zx => (self.z, self.x),
            Plane::Yz => (self.y, self.z),
        }
    }
}

const COOLANT_ON: [u32; 3] = [7, 8, 88];
const COOLANT_OFF: [u32; 2] = [9, 89];

/// Persistent machine mode. Exactly one value per modal group is active.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModalState {
    pub motion: MotionMode,
    pub plane: Plane,
    pub units: Units,
    pub positioning: Positioning,
    pub feed_mode: FeedMode,
    /// Work offset code number, 54..=59.
    pub work_offset: u32,
    pub length_comp: Option<LengthComp>,
    pub cutter_comp: CutterComp,
    /// Active canned cycle code (81..=89), `None` after G80 or G00-G03.
    pub canned_cycle: Option<u32>,
    pub spindle: Spindle,
    pub spindle_speed: f64,
    pub coolant_on: bool,
    pub tool: Option<u32>,
    pub length_offset: Option<u32>,
    pub radius_offset: Option<u32>,
    pub feed_rate: f64,
    pub position: Position,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            motion: MotionMode::Rapid,
            plane: Plane::Xy,
            units: Units::Millimeter,
            positioning: Positioning::Absolute,
            feed_mode: FeedMode::PerMinute,
            work_offset: 54,
            length_comp: None,
            cutter_comp: CutterComp::Off,
            canned_cycle: None,
            spindle: Spindle::Off,
            spindle_speed: 0.0,
            coolant_on: false,
            tool: None,
            length_offset: None,
            radius_offset: None,
            feed_rate: 0.0,
            position: Position::ORIGIN,
        }
    }
}

fn register(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}

impl ModalState {
    /// State transition: the state after `line` has executed.
    pub fn apply(&self, line: &ParsedLine) -> ModalState {
        let mut next = self.clone();
        next.update(line);
        next
    }

    pub fn update(&mut self, line: &ParsedLine) {
        for g in &line.g_codes {
            if let Some(motion) = MotionMode::from_code(*g) {
                // G00-G03 share the canned cycle's modal group and cancel it.
                self.motion = motion;
                self.canned_cycle = None;
                continue;
            }
            let Some(number) = g.whole() else { continue };
            match number {
                17 => self.plane = Plane::Xy,
                18 => self.plane = Plane::Zx,
                19 => self.plane = Plane::Yz,
                20 => self.units = Units::Inch,
                21 => self.units = Units::Millimeter,
                90 => self.positioning = Positioning::Absolute,
                91 => self.positioning = Positioning::Incremental,
                94 => self.feed_mode = FeedMode::PerMinute,
                95 => self.feed_mode = FeedMode::PerRevolution,
                54..=59 => self.work_offset = number,
                43 => self.length_comp = Some(LengthComp::Positive),
                44 => self.length_comp = Some(LengthComp::Negative),
                49 => self.length_comp = None,
                40 => self.cutter_comp = CutterComp::Off,
                41 => self.cutter_comp = CutterComp::Left,
                42 => self.cutter_comp = CutterComp::Right,
                80 => self.canned_cycle = None,
                81..=89 => self.canned_cycle = Some(number),
                _ => {}
            }
        }

        for m in &line.m_codes {
            let Some(number) = m.whole() else { continue };
            match number {
                3 => self.spindle = Spindle::Clockwise,
                4 => self.spindle = Spindle::CounterClockwise,
                5 => self.spindle = Spindle::Off,
                6 => {
                    if let Some(t) = line.t.and_then(register) {
                        self.tool = Some(t);
                    }
                }
                n if COOLANT_ON.contains(&n) => self.coolant_on = true,
                n if COOLANT_OFF.contains(&n) => self.coolant_on = false,
                _ => {}
            }
        }

        if let Some(f) = line.f {
            self.feed_rate = f;
        }
        if let Some(s) = line.s {
            self.spindle_speed = s.max(0.0);
        }
        if let Some(t) = line.t.and_then(register) {
            self.tool = Some(t);
        }
        if let Some(h) = line.h.and_then(register) {
            self.length_offset = Some(h);
        }
        if let Some(d) = line.d.and_then(register) {
            self.radius_offset = Some(d);
        }

        self.update_position(line);
    }

    fn update_position(&mut self, line: &ParsedLine) {
        if line.is_non_modal_positioning() {
            let preset = line.has_g(Code::new(92));
            let homing = [28, 30, 53].iter().any(|n| line.has_g(Code::new(*n)));
            for (slot, word) in [
                (&mut self.position.x, line.x),
                (&mut self.position.y, line.y),
                (&mut self.position.z, line.z),
            ] {
                let Some(v) = word else { continue };
                if preset {
                    *slot = Some(v);
                } else if homing {
                    *slot = None;
                }
            }
            return;
        }

        let abs = self.positioning == Positioning::Absolute;
        // Inside a canned cycle the Z word is the hole bottom; the tool returns
        // to the initial level afterwards.
        let z_word = if self.canned_cycle.is_some() { None } else { line.z };
        for (slot, word) in [
            (&mut self.position.x, line.x),
            (&mut self.position.y, line.y),
            (&mut self.position.z, z_word),
        ] {
            let Some(v) = word else { continue };
            *slot = if abs { Some(v) } else { slot.map(|cur| cur + v) };
        }
    }

    /// The interpolation mode this line commands, if it commands any motion.
    pub fn motion_block(&self, line: &ParsedLine) -> Option<MotionMode> {
        if line.is_non_modal_positioning() || self.canned_cycle.is_some() {
            return None;
        }
        if line.has_axis_words() {
            return Some(self.motion);
        }
        let explicit_arc = line.has_g(Code::new(2)) || line.has_g(Code::new(3));
        if self.motion.is_arc() && (explicit_arc || line.has_arc_words()) {
            return Some(self.motion);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_line;

    fn run(lines: &[&str]) -> ModalState {
        lines
            .iter()
            .enumerate()
            .fold(ModalState::default(), |state, (idx, text)| state.apply(&tokenize_line(idx + 1, text)))
    }

    #[test]
    fn power_on_defaults() {
        let state = ModalState::default();
        assert_eq!(state.motion, MotionMode::Rapid);
        assert_eq!(state.plane, Plane::Xy);
        assert_eq!(state.positioning, Positioning::Absolute);
        assert_eq!(state.work_offset, 54);
        assert_eq!(state.feed_rate, 0.0);
        assert_eq!(state.position, Position::ORIGIN);
    }

    #[test]
    fn one_line_sets_several_modal_groups() {
        let state = run(&["G91 G18 G20 G95 G56 G01"]);
        assert_eq!(state.positioning, Positioning::Incremental);
        assert_eq!(state.plane, Plane::Zx);
        assert_eq!(state.units, Units::Inch);
        assert_eq!(state.feed_mode, FeedMode::PerRevolution);
        assert_eq!(state.work_offset, 56);
        assert_eq!(state.motion, MotionMode::Linear);
    }

    #[test]
    fn feed_rate_is_modal_until_changed() {
        let state = run(&["G01 X1 F250", "X2", "Y3"]);
        assert_eq!(state.feed_rate, 250.0);
        let state = run(&["G01 X1 F250", "X2 F90"]);
        assert_eq!(state.feed_rate, 90.0);
    }

    #[test]
    fn g49_clears_length_compensation() {
        let state = run(&["G43 H2"]);
        assert_eq!(state.length_comp, Some(LengthComp::Positive));
        assert_eq!(state.length_offset, Some(2));
        let state = run(&["G43 H2", "G49"]);
        assert_eq!(state.length_comp, None);
    }

    #[test]
    fn decimal_code_does_not_touch_integral_group() {
        let state = run(&["G43.4 H1"]);
        assert_eq!(state.length_comp, None);
    }

    #[test]
    fn spindle_and_coolant_codes() {
        let state = run(&["M04 S800 M08"]);
        assert_eq!(state.spindle, Spindle::CounterClockwise);
        assert_eq!(state.spindle_speed, 800.0);
        assert!(state.coolant_on);

        let state = run(&["M03 S800 M08", "M05 M09"]);
        assert_eq!(state.spindle, Spindle::Off);
        assert!(!state.coolant_on);
    }

    #[test]
    fn tool_change_with_tool_word_updates_current_tool() {
        let state = run(&["T5 M06"]);
        assert_eq!(state.tool, Some(5));
        let state = run(&["T5 M06", "T7", "M06"]);
        assert_eq!(state.tool, Some(7));
    }

    #[test]
    fn canned_cycle_group_and_cancel() {
        let state = run(&["G81 X10 Y10 Z-5 R2 F100"]);
        assert_eq!(state.canned_cycle, Some(81));
        assert_eq!(state.position.z, Some(0.0));
        let state = run(&["G81 X10 Y10 Z-5 R2 F100", "G80"]);
        assert_eq!(state.canned_cycle, None);
    }

    #[test]
    fn interpolation_code_cancels_canned_cycle() {
        let state = run(&["G81 X10 Y10 Z-5 R2 F100", "G02 X20 Y10 R5"]);
        assert_eq!(state.canned_cycle, None);
        assert_eq!(state.motion, MotionMode::ClockwiseArc);

        let state = run(&["G81 X10 Y10 Z-5 R2 F100", "G01 Z-20"]);
        assert_eq!(state.canned_cycle, None);
        assert_eq!(state.position.z, Some(-20.0));

        let state = run(&["G81 X10 Y10 Z-5 R2 F100", "X20"]);
        assert_eq!(state.canned_cycle, Some(81));
    }

    #[test]
    fn g90_g91_distance_mode_switches_absolute_incremental() {
        let state = run(&["G90 G01 X10 Y5 F100", "G91 X2 Y-1", "X2"]);
        assert_eq!(state.position.x, Some(14.0));
        assert_eq!(state.position.y, Some(4.0));
        let state = run(&["G90 G01 X10 Y5 F100", "G91 X2", "G90 X1"]);
        assert_eq!(state.position.x, Some(1.0));
    }

    #[test]
    fn reference_return_forgets_position_until_absolute_word() {
        let state = run(&["G00 Z10", "G91 G28 Z0"]);
        assert_eq!(state.position.z, None);
        let state = run(&["G00 Z10", "G91 G28 Z0", "Z5"]);
        assert_eq!(state.position.z, None);
        let state = run(&["G00 Z10", "G91 G28 Z0", "G90 Z5"]);
        assert_eq!(state.position.z, Some(5.0));
    }

    #[test]
    fn g92_presets_position_without_motion() {
        let state = run(&["G00 X40", "G92 X0"]);
        assert_eq!(state.position.x, Some(0.0));
    }

    #[test]
    fn apply_leaves_previous_state_untouched() {
        let before = ModalState::default();
        let after = before.apply(&tokenize_line(1, "G01 X5 F100 M03"));
        assert_eq!(before, ModalState::default());
        assert_eq!(after.position.x, Some(5.0));
        assert_eq!(after.spindle, Spindle::Clockwise);
    }

    #[test]
    fn motion_block_ignores_modal_arc_without_words() {
        let state = run(&["G02 X1 Y1 I1 F100"]);
        assert_eq!(state.motion_block(&tokenize_line(2, "M08")), None);
        assert_eq!(
            state.motion_block(&tokenize_line(2, "I5")),
            Some(MotionMode::ClockwiseArc)
        );
        assert_eq!(state.motion_block(&tokenize_line(2, "G28 X0")), None);
    }
}
