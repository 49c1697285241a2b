use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasm_bindgen::prelude::*;

use crate::error::ConfigError;
use crate::profile::{ControllerProfile, decimal};

#[wasm_bindgen]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    SafeRetract,
    ToolBreakage,
    PowerFailureRestart,
    EmergencyStop,
    CoolantFailure,
}

impl FailureClass {
    pub const ALL: [FailureClass; 5] = [
        FailureClass::SafeRetract,
        FailureClass::ToolBreakage,
        FailureClass::PowerFailureRestart,
        FailureClass::EmergencyStop,
        FailureClass::CoolantFailure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FailureClass::SafeRetract => "safe-retract",
            FailureClass::ToolBreakage => "tool-breakage",
            FailureClass::PowerFailureRestart => "power-failure-restart",
            FailureClass::EmergencyStop => "emergency-stop",
            FailureClass::CoolantFailure => "coolant-failure",
        }
    }
}

impl FromStr for FailureClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        FailureClass::ALL
            .into_iter()
            .find(|f| f.name() == key)
            .ok_or_else(|| ConfigError::UnknownFailureClass(s.to_string()))
    }
}

/// Reduced-speed parameters offered for a dry run after a coolant loss.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DryRunParameters {
    pub spindle_percent: u32,
    pub feed_percent: u32,
}

/// Inputs the sequences are parameterized on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RecoveryContext {
    pub work_offset: u32,
    pub tool: u32,
    /// Last programmed feed; when known the resume block commands the reduced feed.
    pub last_feed: Option<f64>,
    pub resume_feed_percent: u32,
    pub dwell_seconds: f64,
    pub estop_label: u32,
}

impl Default for RecoveryContext {
    fn default() -> Self {
        Self {
            work_offset: 54,
            tool: 1,
            last_feed: None,
            resume_feed_percent: 50,
            dwell_seconds: 2.0,
            estop_label: 9000,
        }
    }
}

impl RecoveryContext {
    pub fn check(&self) -> Result<(), ConfigError> {
        if !(54..=59).contains(&self.work_offset) {
            return Err(ConfigError::InvalidRecoveryContext(format!(
                "work offset G{} is outside G54-G59",
                self.work_offset
            )));
        }
        if self.tool == 0 {
            return Err(ConfigError::InvalidRecoveryContext("tool number must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.resume_feed_percent) {
            return Err(ConfigError::InvalidRecoveryContext(format!(
                "resume feed of {} percent is outside 1-100",
                self.resume_feed_percent
            )));
        }
        if self.last_feed.is_some_and(|f| !f.is_finite()) {
            return Err(ConfigError::InvalidRecoveryContext("last feed must be finite".to_string()));
        }
        if !self.dwell_seconds.is_finite() || self.dwell_seconds < 0.0 {
            return Err(ConfigError::InvalidRecoveryContext(format!(
                "dwell of {} seconds is not a finite, non-negative time",
                self.dwell_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPlan {
    pub failure: FailureClass,
    pub controller: String,
    pub description: String,
    pub commands: Vec<String>,
    /// Manual steps; only tool breakage and power failure carry one.
    pub checklist: Vec<String>,
    pub dry_run: Option<DryRunParameters>,
}

pub fn generate(failure: FailureClass, profile: &ControllerProfile) -> Result<RecoveryPlan, ConfigError> {
    generate_with(failure, profile, &RecoveryContext::default())
}

/// Fails on a context that would command the wrong setup, e.g. a work
/// offset the controller has no G54-G59 word for.
pub fn generate_with(
    failure: FailureClass,
    profile: &ControllerProfile,
    context: &RecoveryContext,
) -> Result<RecoveryPlan, ConfigError> {
    context.check()?;
    let mut plan = RecoveryPlan {
        failure,
        controller: profile.name.clone(),
        description: String::new(),
        commands: Vec::new(),
        checklist: Vec::new(),
        dry_run: None,
    };

    match failure {
        FailureClass::SafeRetract => {
            plan.description = "Stop spindle and coolant, cancel compensation and cycles, retract Z then XY to home".to_string();
            plan.commands = profile.safe_retract();
        }
        FailureClass::ToolBreakage => {
            plan.description = "Retract clear of the part and stop for replacement of the broken tool".to_string();
            plan.commands = profile.safe_retract();
            plan.commands.push(profile.retract.program_stop.clone());
            plan.checklist = vec![
                "Remove the broken tool and any fragments from the part and spindle".to_string(),
                format!("Load replacement tool T{:02}", context.tool),
                format!("Re-touch-off the tool length offset H{:02}", context.tool),
                "Resume with block search at the interrupted block".to_string(),
            ];
        }
        FailureClass::PowerFailureRestart => {
            let work_offset = profile.work_offset(context.work_offset)?;
            plan.description = "Re-home, re-orient and re-verify setup before resuming at reduced feed".to_string();
            plan.commands = vec![
                profile.spindle.stop.clone(),
                profile.coolant.off.clone(),
                format!(
                    "{} {} {}",
                    profile.retract.cancel_cutter_comp,
                    profile.retract.cancel_length_comp,
                    profile.canned_cycles.cancel
                ),
                profile.retract.home_z.clone(),
                profile.retract.home_xy.clone(),
                profile.retract.absolute.clone(),
                profile.spindle.orient.clone(),
                work_offset.clone(),
                profile.tool_length_offset(context.tool),
            ];
            match context.last_feed {
                Some(feed) if feed > 0.0 => {
                    let reduced = feed * f64::from(context.resume_feed_percent) / 100.0;
                    plan.commands.push(format!("G01 F{}", decimal(reduced)));
                }
                _ => plan.commands.push(format!(
                    "(SET FEED OVERRIDE TO {} PERCENT)",
                    context.resume_feed_percent
                )),
            }
            plan.checklist = vec![
                "Home all axes".to_string(),
                "Confirm spindle orientation".to_string(),
                format!("Confirm work offset {work_offset}"),
                format!("Re-verify tool length H{:02}", context.tool),
                format!("Resume by block search at {} percent feed", context.resume_feed_percent),
            ];
        }
        FailureClass::EmergencyStop => {
            plan.description = "Jump target block: stop, retract and end the program".to_string();
            plan.commands = vec![
                format!(
                    "{} {} {}",
                    profile.block_label(context.estop_label),
                    profile.spindle.stop,
                    profile.coolant.off
                ),
                profile.retract.home_z.clone(),
                profile.retract.absolute.clone(),
                profile.retract.program_end.clone(),
            ];
        }
        FailureClass::CoolantFailure => {
            let dry_run = DryRunParameters { spindle_percent: 50, feed_percent: 50 };
            plan.description = "Stop cutting, disable coolant and continue only as a reduced-speed dry run".to_string();
            plan.commands = vec![
                profile.spindle.stop.clone(),
                profile.dwell(context.dwell_seconds),
                profile.coolant.off.clone(),
                format!(
                    "(DRY RUN AT {} PERCENT SPINDLE {} PERCENT FEED)",
                    dry_run.spindle_percent, dry_run.feed_percent
                ),
            ];
            plan.dry_run = Some(dry_run);
        }
    }

    Ok(plan)
}
