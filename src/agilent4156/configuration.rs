//! JSON channel configuration.
//!
//! A configuration document maps slot names to objects of attribute settings:
//!
//! ```json
//! {
//!     "SMU1": { "voltage_name": "VC", "channel_function": "VAR1", "channel_mode": "V" },
//!     "VAR1": { "start": 1, "stop": 2, "step": 0.1, "compliance": 0.1, "spacing": "LINEAR" }
//! }
//! ```
//!
//! Settings are applied in document order.

use super::sweep::SweepField;
use super::types::{
    ChannelKind, ChannelSlot, Function, Mode, ScpiToken, SeriesResistance, SignalKind, Spacing,
    SweepRole,
};
use super::Agilent4156;
use crate::error::ScpiError;
use crate::scpi::Adapter;
use log::{debug, info};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationDocument {
    channels: Map<String, Value>,
}

impl ConfigurationDocument {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScpiError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(ScpiError::io(format!(
            "reading channel configuration {}",
            path.display()
        )))?;
        text.parse()
    }

    pub fn from_value(value: Value) -> Result<Self, ScpiError> {
        match value {
            Value::Object(channels) => Ok(Self { channels }),
            other => Err(ScpiError::Type(format!(
                "channel configuration must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Resolve every entry into a typed setting, keeping document order.
    ///
    /// # Errors
    /// [`ScpiError::Lookup`] for unknown slots and for attributes the slot does not
    /// have, [`ScpiError::Type`] for values of the wrong JSON type and
    /// [`ScpiError::Validation`] for unknown enumerated labels.
    pub fn resolve(&self) -> Result<Vec<(ChannelSlot, ChannelSetting)>, ScpiError> {
        let mut resolved = Vec::new();
        for (name, attributes) in &self.channels {
            let slot: ChannelSlot = name.parse()?;
            let Value::Object(attributes) = attributes else {
                return Err(ScpiError::Type(format!(
                    "settings of {slot} must be a JSON object, found {}",
                    json_kind(attributes)
                )));
            };
            for (attribute, value) in attributes {
                let setting = ChannelSetting::parse(attribute, value)?;
                if !setting.supported_by(slot) {
                    return Err(ScpiError::Lookup(format!(
                        "{slot} has no attribute '{attribute}'"
                    )));
                }
                resolved.push((slot, setting));
            }
        }
        Ok(resolved)
    }
}

impl FromStr for ConfigurationDocument {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

/// One attribute assignment from a configuration document.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSetting {
    VoltageName(String),
    CurrentName(String),
    Function(Function),
    Mode(Mode),
    SeriesResistance(SeriesResistance),
    ConstantValue(f64),
    Compliance(f64),
    Start(f64),
    Stop(f64),
    Step(f64),
    Spacing(Spacing),
    Points(u32),
    Offset(f64),
    Ratio(f64),
}

impl ChannelSetting {
    pub fn parse(attribute: &str, value: &Value) -> Result<Self, ScpiError> {
        Ok(match attribute {
            "voltage_name" => Self::VoltageName(string(attribute, value)?.to_string()),
            "current_name" => Self::CurrentName(string(attribute, value)?.to_string()),
            "channel_function" => Self::Function(token(attribute, value)?),
            "channel_mode" => Self::Mode(token(attribute, value)?),
            "series_resistance" => Self::SeriesResistance(token(attribute, value)?),
            "constant_value" => Self::ConstantValue(number(attribute, value)?),
            "compliance" => Self::Compliance(number(attribute, value)?),
            "start" => Self::Start(number(attribute, value)?),
            "stop" => Self::Stop(number(attribute, value)?),
            "step" => Self::Step(number(attribute, value)?),
            "spacing" => Self::Spacing(token(attribute, value)?),
            "points" => {
                let points = value.as_u64().ok_or_else(|| wrong_type(attribute, "an integer", value))?;
                Self::Points(u32::try_from(points).map_err(|_| {
                    ScpiError::Validation(format!("points {points} out of range"))
                })?)
            }
            "offset" => Self::Offset(number(attribute, value)?),
            "ratio" => Self::Ratio(number(attribute, value)?),
            other => return Err(ScpiError::Lookup(format!("unknown attribute '{other}'"))),
        })
    }

    /// Attribute name as written in configuration documents.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::VoltageName(_) => "voltage_name",
            Self::CurrentName(_) => "current_name",
            Self::Function(_) => "channel_function",
            Self::Mode(_) => "channel_mode",
            Self::SeriesResistance(_) => "series_resistance",
            Self::ConstantValue(_) => "constant_value",
            Self::Compliance(_) => "compliance",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Step(_) => "step",
            Self::Spacing(_) => "spacing",
            Self::Points(_) => "points",
            Self::Offset(_) => "offset",
            Self::Ratio(_) => "ratio",
        }
    }

    pub fn supported_by(&self, slot: ChannelSlot) -> bool {
        match slot.kind() {
            ChannelKind::SourceMeasure => matches!(
                self,
                Self::VoltageName(_)
                    | Self::CurrentName(_)
                    | Self::Function(_)
                    | Self::Mode(_)
                    | Self::SeriesResistance(_)
                    | Self::ConstantValue(_)
                    | Self::Compliance(_)
            ),
            ChannelKind::VoltageSense => {
                matches!(self, Self::VoltageName(_) | Self::Function(_) | Self::Mode(_))
            }
            ChannelKind::VoltageSource => matches!(
                self,
                Self::VoltageName(_) | Self::Function(_) | Self::Mode(_) | Self::ConstantValue(_)
            ),
            ChannelKind::Sweep(SweepRole::Var1) => matches!(
                self,
                Self::Start(_) | Self::Stop(_) | Self::Step(_) | Self::Compliance(_) | Self::Spacing(_)
            ),
            ChannelKind::Sweep(SweepRole::Var2) => matches!(
                self,
                Self::Start(_) | Self::Stop(_) | Self::Step(_) | Self::Compliance(_) | Self::Points(_)
            ),
            ChannelKind::Sweep(SweepRole::Vard) => {
                matches!(self, Self::Compliance(_) | Self::Offset(_) | Self::Ratio(_))
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn wrong_type(attribute: &str, expected: &str, value: &Value) -> ScpiError {
    ScpiError::Type(format!(
        "'{attribute}' must be {expected}, found {}",
        json_kind(value)
    ))
}

fn number(attribute: &str, value: &Value) -> Result<f64, ScpiError> {
    value
        .as_f64()
        .ok_or_else(|| wrong_type(attribute, "a number", value))
}

fn string<'v>(attribute: &str, value: &'v Value) -> Result<&'v str, ScpiError> {
    value
        .as_str()
        .ok_or_else(|| wrong_type(attribute, "a string", value))
}

fn token<T: ScpiToken>(attribute: &str, value: &Value) -> Result<T, ScpiError> {
    T::from_label(string(attribute, value)?)
}

impl<A: Adapter> Agilent4156<A> {
    /// Reset all measurement channels, then apply a configuration document.
    ///
    /// Each setting is followed by the settle delay. The first failing setting aborts
    /// the run; settings applied before it stay applied.
    pub fn configure(&mut self, document: &ConfigurationDocument) -> Result<(), ScpiError> {
        info!("Configuring {} channel entries", document.len());
        self.reset_all_channels()?;
        let settings = document.resolve()?;
        for (slot, setting) in &settings {
            debug!("{slot}.{} <- {setting:?}", setting.attribute());
            self.apply_setting(*slot, setting)?;
            self.settle();
        }
        info!("Applied {} channel settings", settings.len());
        Ok(())
    }

    /// Read a JSON document from `path` and [`configure`](Self::configure) with it.
    pub fn configure_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), ScpiError> {
        let document = ConfigurationDocument::from_path(path)?;
        self.configure(&document)
    }

    /// Apply a single setting to `slot`.
    pub fn apply_setting(&mut self, slot: ChannelSlot, setting: &ChannelSetting) -> Result<(), ScpiError> {
        if !setting.supported_by(slot) {
            return Err(ScpiError::Lookup(format!(
                "{slot} has no attribute '{}'",
                setting.attribute()
            )));
        }
        match setting {
            ChannelSetting::VoltageName(name) => self.set_signal_name(slot, SignalKind::Voltage, name),
            ChannelSetting::CurrentName(name) => self.set_signal_name(slot, SignalKind::Current, name),
            ChannelSetting::Function(function) => self.set_channel_function(slot, *function),
            ChannelSetting::Mode(mode) => self.set_channel_mode(slot, *mode),
            ChannelSetting::SeriesResistance(r) => self.set_series_resistance(slot, *r),
            ChannelSetting::ConstantValue(v) => self.set_constant_value(slot, *v),
            ChannelSetting::Compliance(v) => match slot.sweep_role() {
                Some(role) => self.set_sweep_value(role, SweepField::Compliance, *v),
                None => self.set_constant_compliance(slot, *v),
            },
            ChannelSetting::Start(v) => self.set_sweep_field(slot, SweepField::Start, *v),
            ChannelSetting::Stop(v) => self.set_sweep_field(slot, SweepField::Stop, *v),
            ChannelSetting::Step(v) => self.set_sweep_field(slot, SweepField::Step, *v),
            ChannelSetting::Spacing(spacing) => self.var1().set_spacing(*spacing),
            ChannelSetting::Points(points) => self.var2().set_points(*points),
            ChannelSetting::Offset(v) => self.vard().set_offset(*v),
            ChannelSetting::Ratio(v) => self.vard().set_ratio(*v),
        }
    }

    fn set_sweep_field(&mut self, slot: ChannelSlot, field: SweepField, value: f64) -> Result<(), ScpiError> {
        let role = slot
            .sweep_role()
            .ok_or_else(|| ScpiError::Lookup(format!("{slot} is not a sweep variable")))?;
        self.set_sweep_value(role, field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agilent4156::tests::analyzer;
    use serde_json::json;
    use std::io::Write;

    const BJT_SWEEP: &str = r#"{
        "SMU1": {
            "voltage_name": "VC",
            "current_name": "IC",
            "channel_function": "VAR1",
            "channel_mode": "V",
            "series_resistance": "0OHM"
        },
        "VAR1": {
            "start": 1,
            "stop": 2,
            "step": 0.5,
            "compliance": 0.1,
            "spacing": "LINEAR"
        }
    }"#;

    #[test]
    fn configure_resets_then_applies_in_document_order() {
        let mut a = analyzer();
        let document: ConfigurationDocument = BJT_SWEEP.parse().unwrap();
        a.configure(&document).unwrap();

        assert_eq!(
            a.adapter().set_commands(),
            vec![
                ":PAGE:CHAN:SMU1:DIS",
                ":PAGE:CHAN:SMU2:DIS",
                ":PAGE:CHAN:SMU3:DIS",
                ":PAGE:CHAN:SMU4:DIS",
                ":PAGE:CHAN:VMU1:DIS",
                ":PAGE:CHAN:VMU2:DIS",
                ":PAGE:CHAN:SMU1:VNAME 'VC'",
                ":PAGE:CHAN:SMU1:INAME 'IC'",
                ":PAGE:CHAN:SMU1:FUNC VAR1",
                ":PAGE:CHAN:SMU1:MODE V",
                ":PAGE:CHAN:SMU1:SRES 0OHM",
                ":PAGE:MEAS:VAR1:STAR 1",
                ":PAGE:MEAS:VAR1:STOP 2",
                ":PAGE:MEAS:VAR1:STEP 0.5",
                ":PAGE:MEAS:VAR1:COMP 0.1",
                ":PAGE:MEAS:VAR1:SPAC LIN",
            ]
        );
    }

    #[test]
    fn out_of_range_step_stops_the_run() {
        let mut a = analyzer();
        let document = ConfigurationDocument::from_value(json!({
            "SMU1": { "channel_function": "VAR1", "channel_mode": "V" },
            "VAR1": { "step": 450, "stop": 2 }
        }))
        .unwrap();

        assert!(matches!(a.configure(&document), Err(ScpiError::Validation(_))));
        assert!(!a
            .adapter()
            .set_commands()
            .iter()
            .any(|c| c.starts_with(":PAGE:MEAS:VAR1")));
    }

    #[test]
    fn unknown_slots_and_attributes_are_lookup_errors() {
        let unknown_slot = ConfigurationDocument::from_value(json!({ "SMU9": {} })).unwrap();
        assert!(matches!(unknown_slot.resolve(), Err(ScpiError::Lookup(_))));

        let wrong_kind =
            ConfigurationDocument::from_value(json!({ "SMU1": { "spacing": "LINEAR" } })).unwrap();
        assert!(matches!(wrong_kind.resolve(), Err(ScpiError::Lookup(_))));

        let vmu_constant =
            ConfigurationDocument::from_value(json!({ "VMU1": { "constant_value": 1 } })).unwrap();
        assert!(matches!(vmu_constant.resolve(), Err(ScpiError::Lookup(_))));

        let unknown =
            ConfigurationDocument::from_value(json!({ "VAR2": { "slope": 1 } })).unwrap();
        assert!(matches!(unknown.resolve(), Err(ScpiError::Lookup(_))));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            ChannelSetting::parse("points", &json!("ten")),
            Err(ScpiError::Type(_))
        ));
        assert!(matches!(
            ChannelSetting::parse("start", &json!([1, 2])),
            Err(ScpiError::Type(_))
        ));
        assert!(matches!(
            ChannelSetting::parse("channel_mode", &json!("X")),
            Err(ScpiError::Validation(_))
        ));
        assert_eq!(
            ChannelSetting::parse("spacing", &json!("LOG50")).unwrap(),
            ChannelSetting::Spacing(Spacing::Log50)
        );
        assert!(matches!(
            ConfigurationDocument::from_value(json!([1])),
            Err(ScpiError::Type(_))
        ));
        assert!(matches!(
            "{\"SMU1\": 3}".parse::<ConfigurationDocument>().and_then(|d| d.resolve()),
            Err(ScpiError::Type(_))
        ));
    }

    #[test]
    fn configure_from_path_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BJT_SWEEP.as_bytes()).unwrap();

        let document = ConfigurationDocument::from_path(file.path()).unwrap();
        assert_eq!(document.resolve().unwrap().len(), 10);

        let mut a = analyzer();
        a.configure_from_path(file.path()).unwrap();
        assert_eq!(a.adapter().state(":PAGE:MEAS:VAR1:SPAC"), Some("LIN"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ConfigurationDocument::from_path("/nonexistent/channels.json"),
            Err(ScpiError::Io { .. })
        ));
    }

    #[test]
    fn compliance_dispatches_by_slot_kind() {
        let mut a = analyzer();
        a.adapter_mut().set_state(":PAGE:CHAN:SMU2:MODE", "I");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU2:FUNC", "CONS");
        a.apply_setting(ChannelSlot::Smu2, &ChannelSetting::Compliance(5.0))
            .unwrap();
        assert_eq!(a.adapter().state(":PAGE:MEAS:CONS:SMU2:COMP"), Some("5"));

        a.adapter_mut().set_state(":PAGE:CHAN:SMU3:MODE", "V");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU3:FUNC", "VAR2");
        a.apply_setting(ChannelSlot::Var2, &ChannelSetting::Compliance(0.5))
            .unwrap();
        assert_eq!(a.adapter().state(":PAGE:MEAS:VAR2:COMP"), Some("0.5"));
    }
}
