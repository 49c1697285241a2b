use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity { Error, Warning }

/// Closed taxonomy of validation outcomes. Each code has a fixed severity.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    // --- errors ---
    NoFeedRate,
    PlungeWithoutFeed,
    ArcNoCenter,
    ArcRadiusMismatch,
    ArcZeroRadius,
    ArcRadiusTooSmall,
    AxisOverTravel,
    // --- warnings ---
    UnsupportedGCode,
    UnsupportedMCode,
    FeedRateHigh,
    SpindleSpeedHigh,
    SpindleSpeedLow,
    ArcFullCircle,
    ToolChangeWithoutTool,
    SpindleLeftOn,
    CoolantLeftOn,
    CutterCompLeftOn,
    RotaryOverTravel,
}

impl FindingCode {
    pub const fn severity(self) -> Severity {
        match self {
            FindingCode::NoFeedRate
            | FindingCode::PlungeWithoutFeed
            | FindingCode::ArcNoCenter
            | FindingCode::ArcRadiusMismatch
            | FindingCode::ArcZeroRadius
            | FindingCode::ArcRadiusTooSmall
            | FindingCode::AxisOverTravel => Severity::Error,
            FindingCode::UnsupportedGCode
            | FindingCode::UnsupportedMCode
            | FindingCode::FeedRateHigh
            | FindingCode::SpindleSpeedHigh
            | FindingCode::SpindleSpeedLow
            | FindingCode::ArcFullCircle
            | FindingCode::ToolChangeWithoutTool
            | FindingCode::SpindleLeftOn
            | FindingCode::CoolantLeftOn
            | FindingCode::CutterCompLeftOn
            | FindingCode::RotaryOverTravel => Severity::Warning,
        }
    }

    /// Short human-readable category name.
    pub const fn category(self) -> &'static str {
        match self {
            FindingCode::NoFeedRate => "cutting motion without feed rate",
            FindingCode::PlungeWithoutFeed => "Z plunge without feed rate",
            FindingCode::ArcNoCenter => "arc has no center or radius",
            FindingCode::ArcRadiusMismatch => "arc radius mismatch",
            FindingCode::ArcZeroRadius => "arc has zero or near-zero radius",
            FindingCode::ArcRadiusTooSmall => "arc radius too small for chord",
            FindingCode::AxisOverTravel => "coordinate exceeds axis travel",
            FindingCode::UnsupportedGCode => "G-code not supported by controller",
            FindingCode::UnsupportedMCode => "M-code not supported by controller",
            FindingCode::FeedRateHigh => "feed rate unusually high",
            FindingCode::SpindleSpeedHigh => "spindle speed above maximum",
            FindingCode::SpindleSpeedLow => "spindle speed below minimum",
            FindingCode::ArcFullCircle => "arc without endpoint is a full circle",
            FindingCode::ToolChangeWithoutTool => "tool change without tool number",
            FindingCode::SpindleLeftOn => "spindle left on",
            FindingCode::CoolantLeftOn => "coolant left on",
            FindingCode::CutterCompLeftOn => "cutter compensation left active",
            FindingCode::RotaryOverTravel => "rotary coordinate exceeds axis travel",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Finding {
    pub line: usize,
    pub code: FindingCode,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    pub fn new(line: usize, code: FindingCode, message: impl Into<String>) -> Self {
        Self { line, code, message: message.into(), severity: code.severity() }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
