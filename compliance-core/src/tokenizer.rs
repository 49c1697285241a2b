use serde::{Deserialize, Serialize};
use std::fmt;

/// A G or M code number, kept in tenths so `43.4` and `43` stay distinct.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "f64", into = "f64")]
pub struct Code(u32);

impl Code {
    pub const fn new(major: u32) -> Self {
        Code(major * 10)
    }

    pub const fn with_minor(major: u32, minor: u32) -> Self {
        Code(major * 10 + minor % 10)
    }

    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value > 100_000.0 {
            return None;
        }
        Some(Code((value * 10.0).round() as u32))
    }

    pub const fn major(self) -> u32 {
        self.0 / 10
    }

    pub const fn minor(self) -> u32 {
        self.0 % 10
    }

    /// The plain code number, `None` for decimal codes such as G43.4.
    pub const fn whole(self) -> Option<u32> {
        if self.minor() == 0 { Some(self.major()) } else { None }
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn label(self, letter: char) -> String {
        format!("{letter}{self}")
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor() == 0 {
            write!(f, "{:02}", self.major())
        } else {
            write!(f, "{:02}.{}", self.major(), self.minor())
        }
    }
}

impl TryFrom<f64> for Code {
    type Error = &'static str;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Code::from_value(value).ok_or("code number must be a finite, non-negative value")
    }
}

impl From<Code> for f64 {
    fn from(code: Code) -> f64 {
        code.value()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis { X, Y, Z, A, B, C }

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    pub fn is_rotary(self) -> bool {
        matches!(self, Axis::A | Axis::B | Axis::C)
    }

    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::A => 'A',
            Axis::B => 'B',
            Axis::C => 'C',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// Codes whose axis words are not interpolation targets: dwell, data setting,
// reference return, machine coordinates and coordinate-system preset.
const NON_MODAL_AXIS_CODES: [Code; 6] = [
    Code::new(4),
    Code::new(10),
    Code::new(28),
    Code::new(30),
    Code::new(53),
    Code::new(92),
];

/// One tokenized program line. Built once, never mutated.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ParsedLine {
    /// 1-based index of the line in the program text.
    pub line: usize,
    /// Leading `N` word, if the block carries one.
    pub block_number: Option<u32>,
    pub g_codes: Vec<Code>,
    pub m_codes: Vec<Code>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub r: Option<f64>,
    pub f: Option<f64>,
    pub s: Option<f64>,
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub d: Option<f64>,
    pub p: Option<f64>,
    pub q: Option<f64>,
    pub l: Option<f64>,
}

impl ParsedLine {
    pub fn axis(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::A => self.a,
            Axis::B => self.b,
            Axis::C => self.c,
        }
    }

    pub fn has_axis_words(&self) -> bool {
        Axis::ALL.iter().any(|a| self.axis(*a).is_some())
    }

    pub fn has_arc_words(&self) -> bool {
        self.i.is_some() || self.j.is_some() || self.k.is_some() || self.r.is_some()
    }

    pub fn has_g(&self, code: Code) -> bool {
        self.g_codes.contains(&code)
    }

    pub fn has_m(&self, code: Code) -> bool {
        self.m_codes.contains(&code)
    }

    /// True when the block's axis words belong to a non-modal code (G04, G10,
    /// G28, G30, G53, G92) rather than to the active motion mode.
    pub fn is_non_modal_positioning(&self) -> bool {
        self.g_codes.iter().any(|g| NON_MODAL_AXIS_CODES.contains(g))
    }

    pub fn is_empty(&self) -> bool {
        self.g_codes.is_empty()
            && self.m_codes.is_empty()
            && self.letter_slots().iter().all(|v| v.is_none())
    }

    fn letter_slots(&self) -> [Option<f64>; 18] {
        [
            self.x, self.y, self.z, self.a, self.b, self.c, self.i, self.j, self.k,
            self.r, self.f, self.s, self.t, self.h, self.d, self.p, self.q, self.l,
        ]
    }

    fn slot_mut(&mut self, letter: u8) -> Option<&mut Option<f64>> {
        let slot = match letter {
            b'X' => &mut self.x,
            b'Y' => &mut self.y,
            b'Z' => &mut self.z,
            b'A' => &mut self.a,
            b'B' => &mut self.b,
            b'C' => &mut self.c,
            b'I' => &mut self.i,
            b'J' => &mut self.j,
            b'K' => &mut self.k,
            b'R' => &mut self.r,
            b'F' => &mut self.f,
            b'S' => &mut self.s,
            b'T' => &mut self.t,
            b'H' => &mut self.h,
            b'D' => &mut self.d,
            b'P' => &mut self.p,
            b'Q' => &mut self.q,
            b'L' => &mut self.l,
            _ => return None,
        };
        Some(slot)
    }
}

/// Tokenize one line of program text. Never fails: malformed numbers leave
/// their letter absent, unknown letters are skipped.
///
/// A repeated letter overwrites the earlier value, even when the repeat is
/// malformed: `X10 X` leaves X absent.
pub fn tokenize_line(line_number: usize, text: &str) -> ParsedLine {
    let upper = text.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut parsed = ParsedLine { line: line_number, ..ParsedLine::default() };
    let mut first_word = true;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comments: ( ... ) and ; to end-of-line
        if bytes[i] == b';' {
            break;
        }
        if bytes[i] == b'(' {
            while i < bytes.len() && bytes[i] != b')' {
                i += 1;
            }
            i += 1;
            continue;
        }

        let c = bytes[i];
        if !c.is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        i += 1;
        let (val, len) = parse_number(&bytes[i..]);
        i += len;

        match c {
            b'N' => {
                if first_word {
                    parsed.block_number = val.filter(|v| *v >= 0.0 && v.fract() == 0.0).map(|v| v as u32);
                }
            }
            b'G' => {
                if let Some(code) = val.and_then(Code::from_value) {
                    parsed.g_codes.push(code);
                }
            }
            b'M' => {
                if let Some(code) = val.and_then(Code::from_value) {
                    parsed.m_codes.push(code);
                }
            }
            other => {
                // Repeated letters: the last occurrence wins.
                if let Some(slot) = parsed.slot_mut(other) {
                    *slot = val;
                }
            }
        }
        first_word = false;
    }

    parsed
}

pub fn tokenize_program(program: &str) -> Vec<ParsedLine> {
    program
        .lines()
        .enumerate()
        .map(|(idx, text)| tokenize_line(idx + 1, text))
        .collect()
}

/// Reads the numeral following a word letter. The whole run of numeral
/// characters must parse, otherwise the value is reported absent.
fn parse_number(bytes: &[u8]) -> (Option<f64>, usize) {
    let mut start = 0usize;
    while start < bytes.len() && (bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }

    let mut end = start;
    while end < bytes.len() && matches!(bytes[end], b'0'..=b'9' | b'.' | b'+' | b'-') {
        end += 1;
    }
    if end == start {
        return (None, end);
    }

    let parsed = std::str::from_utf8(&bytes[start..end])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite());
    (parsed, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_g_code_in_order() {
        let line = tokenize_line(1, "G90 G54 G00 X10. Y-2.5");
        assert_eq!(line.g_codes, vec![Code::new(90), Code::new(54), Code::new(0)]);
        assert_eq!(line.x, Some(10.0));
        assert_eq!(line.y, Some(-2.5));
        assert_eq!(line.z, None);
    }

    #[test]
    fn decimal_g_code_is_distinct_from_integral() {
        let line = tokenize_line(1, "G43.4 H1 G43");
        assert_eq!(line.g_codes, vec![Code::with_minor(43, 4), Code::new(43)]);
        assert_ne!(line.g_codes[0], line.g_codes[1]);
        assert_eq!(line.g_codes[0].whole(), None);
        assert_eq!(line.g_codes[0].label('G'), "G43.4");
        assert_eq!(line.h, Some(1.0));
    }

    #[test]
    fn strips_parenthesized_and_semicolon_comments() {
        let line = tokenize_line(3, "G01 (X99 move) X5 F200 ; Y77 trailing");
        assert_eq!(line.x, Some(5.0));
        assert_eq!(line.y, None);
        assert_eq!(line.f, Some(200.0));
        assert_eq!(line.line, 3);
    }

    #[test]
    fn unclosed_comment_swallows_rest_of_line() {
        let line = tokenize_line(1, "M03 S1200 (spindle on X50");
        assert_eq!(line.m_codes, vec![Code::new(3)]);
        assert_eq!(line.s, Some(1200.0));
        assert_eq!(line.x, None);
    }

    #[test]
    fn leading_block_number_is_captured() {
        let line = tokenize_line(7, "N0040 G01 X1");
        assert_eq!(line.block_number, Some(40));
        assert_eq!(line.line, 7);

        let later = tokenize_line(8, "G01 N50 X1");
        assert_eq!(later.block_number, None);
    }

    #[test]
    fn repeated_letter_keeps_last_occurrence() {
        let line = tokenize_line(1, "G01 X1 X2 X3");
        assert_eq!(line.x, Some(3.0));
    }

    #[test]
    fn malformed_repeat_clears_earlier_value() {
        let line = tokenize_line(1, "G01 X10 Y5 X");
        assert_eq!(line.x, None);
        assert_eq!(line.y, Some(5.0));
        let line = tokenize_line(1, "G01 X10 X1.2.3");
        assert_eq!(line.x, None);
    }

    #[test]
    fn malformed_numeral_leaves_letter_absent() {
        let line = tokenize_line(1, "G01 X1.2.3 Y-- Z4");
        assert_eq!(line.x, None);
        assert_eq!(line.y, None);
        assert_eq!(line.z, Some(4.0));
        assert_eq!(line.g_codes, vec![Code::new(1)]);
    }

    #[test]
    fn accepts_lower_case_and_spaces_after_letter() {
        let line = tokenize_line(1, "g 1 x 12.5 f 300");
        assert_eq!(line.g_codes, vec![Code::new(1)]);
        assert_eq!(line.x, Some(12.5));
        assert_eq!(line.f, Some(300.0));
    }

    #[test]
    fn trailing_decimal_point_is_a_valid_numeral() {
        let line = tokenize_line(1, "G02 X10. Y0 R5.");
        assert_eq!(line.x, Some(10.0));
        assert_eq!(line.r, Some(5.0));
    }

    #[test]
    fn non_modal_codes_are_recognized() {
        assert!(tokenize_line(1, "G91 G28 Z0").is_non_modal_positioning());
        assert!(tokenize_line(1, "G04 X2.0").is_non_modal_positioning());
        assert!(!tokenize_line(1, "G01 X2.0").is_non_modal_positioning());
    }

    #[test]
    fn program_lines_are_numbered_from_one() {
        let lines = tokenize_program("%\nG21\n\nG00 X1");
        assert_eq!(lines.len(), 4);
        assert!(lines[0].is_empty());
        assert!(lines[2].is_empty());
        assert_eq!(lines[3].line, 4);
        assert_eq!(lines[3].x, Some(1.0));
    }

    #[test]
    fn code_display_pads_to_two_digits() {
        assert_eq!(Code::new(1).label('G'), "G01");
        assert_eq!(Code::new(3).label('M'), "M03");
        assert_eq!(Code::new(154).label('G'), "G154");
    }
}
