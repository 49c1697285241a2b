use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wasm_bindgen::prelude::*;

// --- LOGGING ---
#[cfg(target_arch = "wasm32")]
pub(crate) fn log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn warn(s: &str) {
    web_sys::console::warn_1(&JsValue::from_str(s));
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn log(_s: &str) {}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn warn(_s: &str) {}

macro_rules! console_log {
    ($($t:tt)*) => ($crate::log(&format!($($t)*)))
}

macro_rules! console_warn {
    ($($t:tt)*) => ($crate::warn(&format!($($t)*)))
}

pub mod arc;
pub mod config;
pub mod envelope;
pub mod error;
pub mod finding;
pub mod modal;
pub mod profile;
pub mod recovery;
pub mod report;
pub mod tokenizer;
pub mod validators;

pub use config::{EngineConfig, ValidatorLimits};
pub use envelope::{AxisLimit, EnvelopeReport, EnvelopeViolation, LengthUnit, MachineEnvelope, check_envelope};
pub use error::ConfigError;
pub use finding::{Finding, FindingCode, Severity};
pub use modal::ModalState;
pub use profile::{ControllerProfile, ProfileRegistry};
pub use recovery::{FailureClass, RecoveryContext, RecoveryPlan};
pub use report::{Statistics, ValidationReport, validate};
pub use tokenizer::{Axis, Code, ParsedLine, tokenize_line, tokenize_program};

/// Semantic validation and envelope compliance of one program, side by side.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub validation: ValidationReport,
    pub envelope: EnvelopeReport,
    /// True only when neither report carries an error.
    pub go: bool,
}

/// A configured validator: active dialect, plausibility limits and machine
/// envelope. Settings are held behind `Arc`s so a run in progress keeps the
/// configuration it started with.
#[wasm_bindgen]
#[derive(Clone, Debug)]
pub struct ComplianceEngine {
    registry: ProfileRegistry,
    profile: Arc<ControllerProfile>,
    limits: Arc<ValidatorLimits>,
    envelope: Arc<MachineEnvelope>,
}

impl ComplianceEngine {
    pub fn with_dialect(dialect: &str) -> Result<Self, ConfigError> {
        Self::from_config(EngineConfig::for_dialect(dialect))
    }

    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let mut registry = ProfileRegistry::default();
        for profile in config.profiles {
            registry.register(profile)?;
        }
        let profile = registry.get(&config.dialect).inspect_err(|err| console_warn!("{}", err))?;
        config.limits.check()?;
        let envelope = config.envelope.unwrap_or_default();
        envelope.check()?;

        console_log!("ComplianceEngine ready: dialect {}", profile.name);
        Ok(Self {
            registry,
            profile,
            limits: Arc::new(config.limits),
            envelope: Arc::new(envelope),
        })
    }

    pub fn profile(&self) -> Arc<ControllerProfile> {
        Arc::clone(&self.profile)
    }

    pub fn limits(&self) -> &ValidatorLimits {
        &self.limits
    }

    pub fn envelope(&self) -> &MachineEnvelope {
        &self.envelope
    }

    pub fn dialects(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    pub fn select_dialect(&mut self, dialect: &str) -> Result<(), ConfigError> {
        self.profile = self.registry.get(dialect)?;
        console_log!("Active dialect: {}", self.profile.name);
        Ok(())
    }

    /// Adds or replaces a profile. Replacing the active dialect switches the
    /// engine to the new definition.
    pub fn register_profile(&mut self, profile: ControllerProfile) -> Result<Arc<ControllerProfile>, ConfigError> {
        let registered = self.registry.register(profile)?;
        if registered.name.eq_ignore_ascii_case(&self.profile.name) {
            self.profile = Arc::clone(&registered);
        }
        Ok(registered)
    }

    pub fn set_limits(&mut self, limits: ValidatorLimits) -> Result<(), ConfigError> {
        limits.check()?;
        self.limits = Arc::new(limits);
        Ok(())
    }

    pub fn set_envelope(&mut self, envelope: MachineEnvelope) -> Result<(), ConfigError> {
        envelope.check()?;
        self.envelope = Arc::new(envelope);
        Ok(())
    }

    pub fn validate_program(&self, program: &str) -> ValidationReport {
        report::run_validation(&tokenize_program(program), &self.profile, &self.limits)
    }

    pub fn check_program_envelope(&self, program: &str) -> EnvelopeReport {
        envelope::scan(&tokenize_program(program), &self.envelope)
    }

    /// Tokenizes once and runs both the semantic and the envelope pass.
    pub fn run_program(&self, program: &str) -> ComplianceReport {
        let lines = tokenize_program(program);
        let validation = report::run_validation(&lines, &self.profile, &self.limits);
        let envelope = envelope::scan(&lines, &self.envelope);
        let go = validation.valid && envelope.valid;
        ComplianceReport { validation, envelope, go }
    }

    pub fn recovery_plan(&self, failure: FailureClass) -> Result<RecoveryPlan, ConfigError> {
        recovery::generate(failure, &self.profile)
    }

    pub fn recovery_plan_with(
        &self,
        failure: FailureClass,
        context: &RecoveryContext,
    ) -> Result<RecoveryPlan, ConfigError> {
        recovery::generate_with(failure, &self.profile, context)
    }
}

fn js_error(err: ConfigError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
impl ComplianceEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(dialect: &str) -> Result<ComplianceEngine, JsValue> {
        Self::with_dialect(dialect).map_err(js_error)
    }

    pub fn from_config_json(json: &str) -> Result<ComplianceEngine, JsValue> {
        EngineConfig::from_json(json)
            .and_then(Self::from_config)
            .map_err(js_error)
    }

    pub fn register_profile_json(&mut self, json: &str) -> Result<(), JsValue> {
        let profile = ControllerProfile::from_json(json).map_err(js_error)?;
        self.register_profile(profile).map(|_| ()).map_err(js_error)
    }

    pub fn use_dialect(&mut self, dialect: &str) -> Result<(), JsValue> {
        self.select_dialect(dialect).map_err(js_error)
    }

    pub fn dialect(&self) -> String {
        self.profile.name.clone()
    }

    pub fn validate(&self, program: &str) -> JsValue {
        serde_wasm_bindgen::to_value(&self.validate_program(program)).unwrap_or(JsValue::NULL)
    }

    pub fn check_envelope(&self, program: &str) -> JsValue {
        serde_wasm_bindgen::to_value(&self.check_program_envelope(program)).unwrap_or(JsValue::NULL)
    }

    pub fn run(&self, program: &str) -> JsValue {
        serde_wasm_bindgen::to_value(&self.run_program(program)).unwrap_or(JsValue::NULL)
    }

    pub fn recovery(&self, failure: FailureClass) -> Result<JsValue, JsValue> {
        let plan = self.recovery_plan(failure).map_err(js_error)?;
        Ok(serde_wasm_bindgen::to_value(&plan).unwrap_or(JsValue::NULL))
    }

    /// `context` is a `RecoveryContext` object; missing fields take defaults.
    pub fn recovery_in_context(&self, failure: FailureClass, context: JsValue) -> Result<JsValue, JsValue> {
        let context: RecoveryContext = serde_wasm_bindgen::from_value(context)?;
        let plan = self.recovery_plan_with(failure, &context).map_err(js_error)?;
        Ok(serde_wasm_bindgen::to_value(&plan).unwrap_or(JsValue::NULL))
    }

    pub fn recovery_by_name(&self, failure: &str) -> Result<JsValue, JsValue> {
        let failure: FailureClass = failure.parse().map_err(js_error)?;
        self.recovery(failure)
    }

    pub fn program_start(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.profile.program_start()).unwrap_or(JsValue::NULL)
    }

    pub fn program_end(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.profile.program_end()).unwrap_or(JsValue::NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "G90 G21\nG00 X10 Y10 Z-5\nG01 X50 F400\nG02 X60 Y20 I0 J10\nG00 Z-1\nM30";

    #[test]
    fn engine_starts_on_requested_dialect() {
        let engine = ComplianceEngine::with_dialect("HAAS").unwrap();
        assert_eq!(engine.profile().name, "haas");
        assert_eq!(engine.dialects(), vec!["fanuc", "haas", "mazak"]);
    }

    #[test]
    fn unknown_dialect_is_rejected_at_construction() {
        let err = ComplianceEngine::with_dialect("heidenhain").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDialect(ref name) if name == "heidenhain"));
    }

    #[test]
    fn run_combines_both_passes() {
        let engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let report = engine.run_program(SAMPLE);
        assert!(report.validation.valid, "{:?}", report.validation.errors);
        assert!(report.envelope.valid, "{:?}", report.envelope.violations);
        assert!(report.go);
    }

    #[test]
    fn envelope_violation_blocks_go_but_not_validation() {
        let engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let report = engine.run_program("G00 X600 Y10 Z-5");
        assert!(report.validation.valid);
        assert!(!report.envelope.valid);
        assert!(!report.go);
        assert_eq!(report.envelope.violations[0].to_finding().code, FindingCode::AxisOverTravel);
    }

    #[test]
    fn config_json_drives_dialect_limits_and_profiles() {
        let mut shop = ControllerProfile::fanuc();
        shop.name = "shop-mill".to_string();
        shop.m_codes.insert(Code::new(250));
        let config = serde_json::json!({
            "dialect": "shop-mill",
            "limits": { "max_feed_rate": 1000.0 },
            "profiles": [shop],
        });
        let engine = ComplianceEngine::from_config(serde_json::from_value(config).unwrap()).unwrap();
        let report = engine.validate_program("M250\nG01 X1 F1500");
        assert_eq!(report.count(FindingCode::UnsupportedMCode), 0);
        assert_eq!(report.count(FindingCode::FeedRateHigh), 1);
    }

    #[test]
    fn invalid_settings_leave_engine_unchanged() {
        let mut engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let limits = ValidatorLimits { max_spindle_speed: -1.0, ..ValidatorLimits::default() };
        assert!(engine.set_limits(limits).is_err());
        assert_eq!(engine.limits(), &ValidatorLimits::default());

        let envelope = MachineEnvelope::new(LengthUnit::Millimeter).with_axis(Axis::X, AxisLimit::bounded(10.0, -10.0));
        assert!(engine.set_envelope(envelope).is_err());
        assert_eq!(engine.envelope(), &MachineEnvelope::default());
    }

    #[test]
    fn replacing_active_profile_applies_to_later_runs_only() {
        let mut engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let held = engine.profile();
        let mut strict = ControllerProfile::fanuc();
        strict.m_codes.remove(&Code::new(8));
        engine.register_profile(strict).unwrap();

        assert!(held.is_legal_m(Code::new(8)));
        let report = engine.validate_program("M08\nM09");
        assert_eq!(report.count(FindingCode::UnsupportedMCode), 1);
    }

    #[test]
    fn switching_dialect_changes_recovery_vocabulary() {
        let mut engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let fanuc = engine.recovery_plan(FailureClass::SafeRetract).unwrap();
        engine.select_dialect("haas").unwrap();
        let haas = engine.recovery_plan(FailureClass::SafeRetract).unwrap();
        assert_ne!(fanuc.commands, haas.commands);
        assert_eq!(haas.controller, "haas");
        assert!(engine.select_dialect("unknown").is_err());
        assert_eq!(engine.profile().name, "haas");
    }

    #[test]
    fn recovery_with_unsupported_work_offset_fails() {
        let engine = ComplianceEngine::with_dialect("haas").unwrap();
        let context = RecoveryContext { work_offset: 154, ..RecoveryContext::default() };
        let err = engine.recovery_plan_with(FailureClass::PowerFailureRestart, &context).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecoveryContext(_)));

        let context = RecoveryContext { work_offset: 57, ..RecoveryContext::default() };
        let plan = engine.recovery_plan_with(FailureClass::PowerFailureRestart, &context).unwrap();
        assert!(plan.commands.contains(&"G57".to_string()));
    }

    #[test]
    fn concurrent_validations_share_one_engine() {
        let engine = ComplianceEngine::with_dialect("mazak").unwrap();
        let expected = engine.validate_program(SAMPLE);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| engine.validate_program(SAMPLE)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn compliance_report_serializes_with_camel_case_keys() {
        let engine = ComplianceEngine::with_dialect("fanuc").unwrap();
        let json = serde_json::to_value(engine.run_program("G01 X1")).unwrap();
        assert_eq!(json["go"], false);
        assert_eq!(json["validation"]["errors"][0]["code"], "NO_FEED_RATE");
        assert!(json["validation"]["finalModalState"].is_object());
        assert!(json["envelope"]["traversedExtents"].is_object());
    }
}
