use crate::arc::has_arc_definition;
use crate::config::ValidatorLimits;
use crate::finding::{Finding, FindingCode};
use crate::modal::{FeedMode, ModalState, MotionMode};
use crate::profile::ControllerProfile;
use crate::tokenizer::{Code, ParsedLine};

/// Codes outside the controller's legal sets are warnings, never errors:
/// they may be vendor extensions the machine still accepts.
pub fn check_dialect(line: &ParsedLine, profile: &ControllerProfile, out: &mut Vec<Finding>) {
    for g in &line.g_codes {
        if !profile.is_legal_g(*g) {
            out.push(Finding::new(
                line.line,
                FindingCode::UnsupportedGCode,
                format!("{} is not in the {} G-code set", g.label('G'), profile.name),
            ));
        }
    }
    for m in &line.m_codes {
        if !profile.is_legal_m(*m) {
            out.push(Finding::new(
                line.line,
                FindingCode::UnsupportedMCode,
                format!("{} is not in the {} M-code set", m.label('M'), profile.name),
            ));
        }
    }
}

/// Feed presence for cutting moves, unguarded plunges, and plausibility of
/// feed and spindle magnitudes. `before` is the state entering the line,
/// `after` the state once the line's words are applied.
pub fn check_motion_and_feed(
    line: &ParsedLine,
    before: &ModalState,
    after: &ModalState,
    limits: &ValidatorLimits,
    out: &mut Vec<Finding>,
) {
    let no_feed = after.feed_rate <= 0.0;

    if let Some(cycle) = after.canned_cycle {
        if no_feed && line.has_axis_words() && !line.is_non_modal_positioning() {
            out.push(Finding::new(
                line.line,
                FindingCode::NoFeedRate,
                format!("canned cycle G{cycle} positioned without an active feed rate"),
            ));
        }
    } else if let Some(motion) = after.motion_block(line) {
        // An undefined arc is reported by the arc check alone.
        let defined = !motion.is_arc() || has_arc_definition(line, after.plane, limits.arc_tolerance);
        if motion.is_cutting() && no_feed && defined {
            out.push(Finding::new(
                line.line,
                FindingCode::NoFeedRate,
                format!("{} motion with feed rate {}", motion_label(motion), after.feed_rate),
            ));
        }
        if motion == MotionMode::Linear && no_feed {
            if let (Some(from), Some(to)) = (before.position.z, after.position.z) {
                if to < from {
                    out.push(Finding::new(
                        line.line,
                        FindingCode::PlungeWithoutFeed,
                        format!("Z moves down from {from:.3} to {to:.3} with zero feed"),
                    ));
                }
            }
        }
    }

    if let Some(f) = line.f {
        let (limit, unit) = match after.feed_mode {
            FeedMode::PerMinute => (limits.max_feed_rate, "per minute"),
            FeedMode::PerRevolution => (limits.max_feed_per_rev, "per revolution"),
        };
        if f > limit {
            out.push(Finding::new(
                line.line,
                FindingCode::FeedRateHigh,
                format!("feed F{f} exceeds {limit} {unit}"),
            ));
        }
    }

    if let Some(s) = line.s {
        if s > limits.max_spindle_speed {
            out.push(Finding::new(
                line.line,
                FindingCode::SpindleSpeedHigh,
                format!("S{s} exceeds maximum spindle speed {}", limits.max_spindle_speed),
            ));
        } else if s > 0.0 && s < limits.min_spindle_speed {
            out.push(Finding::new(
                line.line,
                FindingCode::SpindleSpeedLow,
                format!("S{s} is below minimum spindle speed {}", limits.min_spindle_speed),
            ));
        }
    }

    if line.has_m(Code::new(6)) && after.tool.is_none() {
        out.push(Finding::new(
            line.line,
            FindingCode::ToolChangeWithoutTool,
            "M06 with no tool number selected",
        ));
    }
}

fn motion_label(motion: MotionMode) -> &'static str {
    match motion {
        MotionMode::Rapid => "G00",
        MotionMode::Linear => "G01",
        MotionMode::ClockwiseArc => "G02",
        MotionMode::CounterClockwiseArc => "G03",
    }
}
