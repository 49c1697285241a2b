use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::tokenizer::Code;

/// How a controller expects the dwell time word.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DwellStyle {
    /// `G04 X2.` (seconds on the X address)
    XSeconds,
    /// `G04 P2.` (seconds on the P address)
    PSeconds,
    /// `G04 P2000` (milliseconds on the P address)
    PMilliseconds,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpindleCommands {
    pub clockwise: String,
    pub counter_clockwise: String,
    pub stop: String,
    pub orient: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CoolantCommands {
    pub flood: String,
    pub mist: String,
    /// May hold several words, e.g. flood and through-spindle off together.
    pub off: String,
    #[serde(default)]
    pub through_spindle: Option<String>,
    #[serde(default)]
    pub air: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CannedCycleCommands {
    pub drill: String,
    pub peck: String,
    pub tap: String,
    pub cancel: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RetractCommands {
    pub cancel_cutter_comp: String,
    pub cancel_length_comp: String,
    pub home_z: String,
    pub home_xy: String,
    pub absolute: String,
    pub program_stop: String,
    pub program_end: String,
}

/// Legal code sets and command vocabulary of one controller dialect.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControllerProfile {
    pub name: String,
    pub g_codes: BTreeSet<Code>,
    pub m_codes: BTreeSet<Code>,
    pub spindle: SpindleCommands,
    pub coolant: CoolantCommands,
    pub canned_cycles: CannedCycleCommands,
    pub retract: RetractCommands,
    pub dwell_style: DwellStyle,
    pub program_start: Vec<String>,
    pub program_end: Vec<String>,
}

fn code_set(whole: &[u32], decimal: &[(u32, u32)]) -> BTreeSet<Code> {
    whole
        .iter()
        .map(|n| Code::new(*n))
        .chain(decimal.iter().map(|(major, minor)| Code::with_minor(*major, *minor)))
        .collect()
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Formats a word value the way controllers print decimals: `2.`, `2.5`.
pub(crate) fn decimal(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    // -0.0 == 0.0, so this also drops the sign of a negative zero.
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{rounded:.3}");
    let trimmed = text.trim_end_matches('0');
    trimmed.to_string()
}

impl ControllerProfile {
    pub fn fanuc() -> Self {
        Self {
            name: "fanuc".to_string(),
            g_codes: code_set(
                &[
                    0, 1, 2, 3, 4, 9, 10, 11, 15, 16, 17, 18, 19, 20, 21, 22, 23, 27, 28, 29, 30,
                    31, 33, 37, 39, 40, 41, 42, 43, 44, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59,
                    60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 73, 74, 76, 80, 81, 82, 83, 84, 85, 86,
                    87, 88, 89, 90, 91, 92, 94, 95, 96, 97, 98, 99,
                ],
                &[(43, 4), (43, 5), (49, 1), (50, 1), (51, 1), (54, 1), (68, 2), (69, 1)],
            ),
            m_codes: code_set(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 19, 29, 30, 98, 99], &[]),
            spindle: SpindleCommands {
                clockwise: "M03".to_string(),
                counter_clockwise: "M04".to_string(),
                stop: "M05".to_string(),
                orient: "M19".to_string(),
            },
            coolant: CoolantCommands {
                flood: "M08".to_string(),
                mist: "M07".to_string(),
                off: "M09".to_string(),
                through_spindle: None,
                air: None,
            },
            canned_cycles: CannedCycleCommands {
                drill: "G81".to_string(),
                peck: "G83".to_string(),
                tap: "G84".to_string(),
                cancel: "G80".to_string(),
            },
            retract: RetractCommands {
                cancel_cutter_comp: "G40".to_string(),
                cancel_length_comp: "G49".to_string(),
                home_z: "G91 G28 Z0.".to_string(),
                home_xy: "G28 X0. Y0.".to_string(),
                absolute: "G90".to_string(),
                program_stop: "M00".to_string(),
                program_end: "M30".to_string(),
            },
            dwell_style: DwellStyle::XSeconds,
            program_start: lines(&["%", "G17 G21 G40 G49 G80 G90", "G54"]),
            program_end: lines(&["M05", "M09", "G91 G28 Z0.", "G90", "M30", "%"]),
        }
    }

    pub fn haas() -> Self {
        Self {
            name: "haas".to_string(),
            g_codes: code_set(
                &[
                    0, 1, 2, 3, 4, 9, 10, 12, 13, 17, 18, 19, 20, 21, 28, 29, 31, 35, 36, 37, 40,
                    41, 42, 43, 44, 47, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 64, 65,
                    68, 69, 70, 71, 72, 73, 74, 76, 77, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90,
                    91, 92, 93, 94, 95, 98, 99, 100, 101, 103, 107, 110, 111, 112, 113, 114, 115,
                    116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 128, 129, 136, 141,
                    143, 150, 154, 174, 184, 187, 234, 254, 255,
                ],
                &[],
            ),
            m_codes: code_set(
                &[
                    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 16, 17, 18, 19, 21, 22, 23, 24,
                    25, 26, 27, 28, 29, 30, 31, 33, 34, 35, 36, 39, 41, 42, 46, 48, 49, 59, 69, 75,
                    76, 77, 78, 79, 80, 81, 82, 83, 84, 86, 88, 89, 95, 96, 97, 98, 99, 109, 130,
                    131, 138, 139,
                ],
                &[],
            ),
            spindle: SpindleCommands {
                clockwise: "M03".to_string(),
                counter_clockwise: "M04".to_string(),
                stop: "M05".to_string(),
                orient: "M19".to_string(),
            },
            coolant: CoolantCommands {
                flood: "M08".to_string(),
                mist: "M07".to_string(),
                off: "M09 M89".to_string(),
                through_spindle: Some("M88".to_string()),
                air: Some("M83".to_string()),
            },
            canned_cycles: CannedCycleCommands {
                drill: "G81".to_string(),
                peck: "G83".to_string(),
                tap: "G84".to_string(),
                cancel: "G80".to_string(),
            },
            retract: RetractCommands {
                cancel_cutter_comp: "G40".to_string(),
                cancel_length_comp: "G49".to_string(),
                home_z: "G28 G91 Z0.".to_string(),
                home_xy: "G28 G91 X0. Y0.".to_string(),
                absolute: "G90".to_string(),
                program_stop: "M00".to_string(),
                program_end: "M30".to_string(),
            },
            dwell_style: DwellStyle::PSeconds,
            program_start: lines(&["%", "G00 G17 G40 G49 G80 G90", "G54"]),
            program_end: lines(&["M05", "M09", "G53 G49 Z0.", "G53 Y0.", "M30", "%"]),
        }
    }

    pub fn mazak() -> Self {
        Self {
            name: "mazak".to_string(),
            g_codes: code_set(
                &[
                    0, 1, 2, 3, 4, 9, 10, 11, 15, 16, 17, 18, 19, 20, 21, 22, 23, 27, 28, 29, 30,
                    31, 40, 41, 42, 43, 44, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 61, 62, 63,
                    64, 65, 66, 67, 68, 69, 73, 74, 76, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90,
                    91, 92, 94, 95, 98, 99,
                ],
                &[(43, 4), (61, 1), (68, 2)],
            ),
            m_codes: code_set(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 19, 30, 98, 99], &[]),
            spindle: SpindleCommands {
                clockwise: "M03".to_string(),
                counter_clockwise: "M04".to_string(),
                stop: "M05".to_string(),
                orient: "M19".to_string(),
            },
            coolant: CoolantCommands {
                flood: "M08".to_string(),
                mist: "M07".to_string(),
                off: "M09".to_string(),
                through_spindle: None,
                air: None,
            },
            canned_cycles: CannedCycleCommands {
                drill: "G81".to_string(),
                peck: "G83".to_string(),
                tap: "G84".to_string(),
                cancel: "G80".to_string(),
            },
            retract: RetractCommands {
                cancel_cutter_comp: "G40".to_string(),
                cancel_length_comp: "G49".to_string(),
                home_z: "G91 G28 Z0.".to_string(),
                home_xy: "G91 G28 X0. Y0.".to_string(),
                absolute: "G90".to_string(),
                program_stop: "M00".to_string(),
                program_end: "M30".to_string(),
            },
            dwell_style: DwellStyle::PMilliseconds,
            program_start: lines(&["%", "G17 G21 G40 G49 G80 G90 G94", "G54"]),
            program_end: lines(&["M05", "M09", "G91 G28 Z0.", "G90", "M30", "%"]),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let profile: ControllerProfile = serde_json::from_str(json)?;
        profile.check()?;
        Ok(profile)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidProfile("profile name is empty".to_string()));
        }
        if self.g_codes.is_empty() || self.m_codes.is_empty() {
            return Err(ConfigError::InvalidProfile(format!(
                "profile {} has no legal G or M codes",
                self.name
            )));
        }
        for (field, text) in self.command_fields() {
            if text.trim().is_empty() {
                return Err(ConfigError::InvalidProfile(format!(
                    "profile {}: {field} is empty",
                    self.name
                )));
            }
            if text.contains(['{', '}', '<', '>']) {
                return Err(ConfigError::InvalidProfile(format!(
                    "profile {}: {field} holds placeholder text {text:?}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Every command string that can reach generated output.
    fn command_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("spindle.clockwise", self.spindle.clockwise.as_str()),
            ("spindle.counter_clockwise", self.spindle.counter_clockwise.as_str()),
            ("spindle.stop", self.spindle.stop.as_str()),
            ("spindle.orient", self.spindle.orient.as_str()),
            ("coolant.flood", self.coolant.flood.as_str()),
            ("coolant.mist", self.coolant.mist.as_str()),
            ("coolant.off", self.coolant.off.as_str()),
            ("canned_cycles.drill", self.canned_cycles.drill.as_str()),
            ("canned_cycles.peck", self.canned_cycles.peck.as_str()),
            ("canned_cycles.tap", self.canned_cycles.tap.as_str()),
            ("canned_cycles.cancel", self.canned_cycles.cancel.as_str()),
            ("retract.cancel_cutter_comp", self.retract.cancel_cutter_comp.as_str()),
            ("retract.cancel_length_comp", self.retract.cancel_length_comp.as_str()),
            ("retract.home_z", self.retract.home_z.as_str()),
            ("retract.home_xy", self.retract.home_xy.as_str()),
            ("retract.absolute", self.retract.absolute.as_str()),
            ("retract.program_stop", self.retract.program_stop.as_str()),
            ("retract.program_end", self.retract.program_end.as_str()),
        ];
        if let Some(tsc) = &self.coolant.through_spindle {
            fields.push(("coolant.through_spindle", tsc.as_str()));
        }
        if let Some(air) = &self.coolant.air {
            fields.push(("coolant.air", air.as_str()));
        }
        fields.extend(self.program_start.iter().map(|l| ("program_start", l.as_str())));
        fields.extend(self.program_end.iter().map(|l| ("program_end", l.as_str())));
        fields
    }

    pub fn is_legal_g(&self, code: Code) -> bool {
        self.g_codes.contains(&code)
    }

    pub fn is_legal_m(&self, code: Code) -> bool {
        self.m_codes.contains(&code)
    }

    pub fn program_start(&self) -> Vec<String> {
        self.program_start.clone()
    }

    pub fn program_end(&self) -> Vec<String> {
        self.program_end.clone()
    }

    /// Spindle off, coolant off, cancel compensation and cycles, home Z then
    /// XY, back to absolute positioning.
    pub fn safe_retract(&self) -> Vec<String> {
        vec![
            self.spindle.stop.clone(),
            self.coolant.off.clone(),
            format!(
                "{} {} {}",
                self.retract.cancel_cutter_comp,
                self.retract.cancel_length_comp,
                self.canned_cycles.cancel
            ),
            self.retract.home_z.clone(),
            self.retract.home_xy.clone(),
            self.retract.absolute.clone(),
        ]
    }

    pub fn dwell(&self, seconds: f64) -> String {
        let seconds = seconds.max(0.0);
        match self.dwell_style {
            DwellStyle::XSeconds => format!("G04 X{}", decimal(seconds)),
            DwellStyle::PSeconds => format!("G04 P{}", decimal(seconds)),
            DwellStyle::PMilliseconds => format!("G04 P{}", (seconds * 1000.0).round() as u64),
        }
    }

    /// Work offset select word. Only the standard G54-G59 registers are
    /// emitted; any other number is refused rather than substituted.
    pub fn work_offset(&self, number: u32) -> Result<String, ConfigError> {
        if !(54..=59).contains(&number) {
            return Err(ConfigError::InvalidRecoveryContext(format!(
                "work offset G{number} is outside G54-G59"
            )));
        }
        Ok(format!("G{number}"))
    }

    pub fn tool_length_offset(&self, tool: u32) -> String {
        format!("G43 H{tool:02}")
    }

    pub fn block_label(&self, number: u32) -> String {
        format!("N{number}")
    }
}

fn registry_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Named profiles. Lookups hand out `Arc`s, so replacing a profile never
/// alters a validation already holding the previous one.
#[derive(Clone, Debug)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Arc<ControllerProfile>>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        for profile in [ControllerProfile::fanuc(), ControllerProfile::haas(), ControllerProfile::mazak()] {
            profiles.insert(registry_key(&profile.name), Arc::new(profile));
        }
        Self { profiles }
    }
}

impl ProfileRegistry {
    pub fn register(&mut self, profile: ControllerProfile) -> Result<Arc<ControllerProfile>, ConfigError> {
        if let Err(err) = profile.check() {
            console_warn!("Rejected controller profile: {}", err);
            return Err(err);
        }
        let key = registry_key(&profile.name);
        let profile = Arc::new(profile);
        console_log!("Registered controller profile {}", key);
        self.profiles.insert(key, Arc::clone(&profile));
        Ok(profile)
    }

    pub fn get(&self, name: &str) -> Result<Arc<ControllerProfile>, ConfigError> {
        self.profiles
            .get(&registry_key(name))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDialect(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|k| k.as_str())
    }
}
