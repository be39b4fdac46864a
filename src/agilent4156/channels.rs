//! Measurement channels (SMU, VMU, VSU) and the capability traits they share.

use super::types::{ChannelKind, ChannelSlot, Function, Mode, ScpiToken, SeriesResistance, SignalKind};
use super::{AnalyzerMode, Agilent4156};
use crate::error::ScpiError;
use crate::scpi::instrument::{parse_number, unquote};
use crate::scpi::Adapter;
use crate::validators::{valid_compliance_range, valid_value_range, Range};
use log::warn;
use std::borrow::Cow;

const MAX_SIGNAL_NAME_LEN: usize = 6;
const SIGNAL_NAME_FILLER: char = 'a';
const VSU_OUTPUT_RANGE: Range = Range::new(-200.0, 200.0);

/// Make `name` acceptable as an instrument signal name.
///
/// Names of at most six characters that start with a letter pass unchanged. Anything
/// else becomes `a` followed by the first five characters of `name`, and the rename is
/// logged.
///
/// ```
/// use rusty_scpi::agilent4156::normalize_signal_name;
///
/// assert_eq!(normalize_signal_name("VC"), "VC");
/// assert_eq!(normalize_signal_name("1base"), "a1base");
/// assert_eq!(normalize_signal_name("collector"), "acolle");
/// ```
pub fn normalize_signal_name(name: &str) -> Cow<'_, str> {
    let legal = name.chars().count() <= MAX_SIGNAL_NAME_LEN
        && name.chars().next().is_some_and(char::is_alphabetic);
    if legal {
        return Cow::Borrowed(name);
    }
    let renamed: String = std::iter::once(SIGNAL_NAME_FILLER)
        .chain(name.chars().take(MAX_SIGNAL_NAME_LEN - 1))
        .collect();
    warn!("Renaming signal '{name}' to '{renamed}'");
    Cow::Owned(renamed)
}

/// A typed view of one slot of the analyzer.
pub trait ChannelHandle<A: Adapter> {
    fn slot(&self) -> ChannelSlot;
    fn analyzer(&mut self) -> &mut Agilent4156<A>;
}

pub trait ModeBearing<A: Adapter>: ChannelHandle<A> {
    fn mode(&mut self) -> Result<Mode, ScpiError> {
        let slot = self.slot();
        self.analyzer().channel_mode(slot)
    }

    /// Set the channel mode. Modes outside the channel kind's legal set are rejected
    /// before anything is written.
    fn set_mode(&mut self, mode: Mode) -> Result<(), ScpiError> {
        let slot = self.slot();
        self.analyzer().set_channel_mode(slot, mode)
    }
}

pub trait FunctionBearing<A: Adapter>: ChannelHandle<A> {
    fn function(&mut self) -> Result<Function, ScpiError> {
        let slot = self.slot();
        self.analyzer().channel_function(slot)
    }

    fn set_function(&mut self, function: Function) -> Result<(), ScpiError> {
        let slot = self.slot();
        self.analyzer().set_channel_function(slot, function)
    }
}

pub trait MeasurementChannel<A: Adapter>: ModeBearing<A> + FunctionBearing<A> {
    fn voltage_name(&mut self) -> Result<String, ScpiError> {
        let slot = self.slot();
        self.analyzer().signal_name(slot, SignalKind::Voltage)
    }

    fn set_voltage_name(&mut self, name: &str) -> Result<(), ScpiError> {
        let slot = self.slot();
        self.analyzer().set_signal_name(slot, SignalKind::Voltage, name)
    }

    /// Disable the channel, returning its settings to their defaults.
    fn reset(&mut self) -> Result<(), ScpiError> {
        let slot = self.slot();
        self.analyzer().reset_channel(slot)
    }
}

macro_rules! measurement_handle {
    ($($(#[$meta:meta])* $name:ident),*) => {
        $(
            $(#[$meta])*
            pub struct $name<'a, A: Adapter> {
                analyzer: &'a mut Agilent4156<A>,
                slot: ChannelSlot,
            }

            impl<'a, A: Adapter> $name<'a, A> {
                pub(crate) fn new(analyzer: &'a mut Agilent4156<A>, slot: ChannelSlot) -> Self {
                    Self { analyzer, slot }
                }
            }

            impl<A: Adapter> ChannelHandle<A> for $name<'_, A> {
                fn slot(&self) -> ChannelSlot {
                    self.slot
                }

                fn analyzer(&mut self) -> &mut Agilent4156<A> {
                    self.analyzer
                }
            }

            impl<A: Adapter> ModeBearing<A> for $name<'_, A> {}
            impl<A: Adapter> FunctionBearing<A> for $name<'_, A> {}
            impl<A: Adapter> MeasurementChannel<A> for $name<'_, A> {}
        )*
    };
}

measurement_handle!(
    /// Source-measure unit.
    Smu,
    /// Voltage-sense unit.
    Vmu,
    /// Voltage-source unit.
    Vsu
);

impl<A: Adapter> Smu<'_, A> {
    pub fn current_name(&mut self) -> Result<String, ScpiError> {
        self.analyzer.signal_name(self.slot, SignalKind::Current)
    }

    pub fn set_current_name(&mut self, name: &str) -> Result<(), ScpiError> {
        self.analyzer
            .set_signal_name(self.slot, SignalKind::Current, name)
    }

    pub fn series_resistance(&mut self) -> Result<SeriesResistance, ScpiError> {
        self.analyzer.series_resistance(self.slot)
    }

    pub fn set_series_resistance(&mut self, value: SeriesResistance) -> Result<(), ScpiError> {
        self.analyzer.set_series_resistance(self.slot, value)
    }

    /// Constant source value, in volts or amperes depending on the mode.
    pub fn constant_value(&mut self) -> Result<f64, ScpiError> {
        self.analyzer.constant_value(self.slot)
    }

    /// Set the constant source value.
    ///
    /// # Errors
    /// [`ScpiError::Precondition`] unless the channel function is CONS and the mode is
    /// not COMM; [`ScpiError::Validation`] if `value` is outside ±200 V or ±1 A.
    pub fn set_constant_value(&mut self, value: f64) -> Result<(), ScpiError> {
        self.analyzer.set_constant_value(self.slot, value)
    }

    /// Compliance of a constant channel. Sweep compliance lives on the sweep variable.
    pub fn compliance(&mut self) -> Result<f64, ScpiError> {
        self.analyzer.constant_compliance(self.slot)
    }

    pub fn set_compliance(&mut self, value: f64) -> Result<(), ScpiError> {
        self.analyzer.set_constant_compliance(self.slot, value)
    }
}

impl<A: Adapter> Vsu<'_, A> {
    pub fn constant_value(&mut self) -> Result<f64, ScpiError> {
        self.analyzer.constant_value(self.slot)
    }

    /// Set the constant output voltage, limited to ±200 V.
    pub fn set_constant_value(&mut self, value: f64) -> Result<(), ScpiError> {
        self.analyzer.set_constant_value(self.slot, value)
    }
}

impl<A: Adapter> Agilent4156<A> {
    pub(crate) fn channel_mode(&mut self, slot: ChannelSlot) -> Result<Mode, ScpiError> {
        let reply = self
            .instrument
            .ask_checked(&format!(":PAGE:CHAN:{slot}:MODE?"))?;
        Mode::from_scpi(&reply)
    }

    pub(crate) fn set_channel_mode(&mut self, slot: ChannelSlot, mode: Mode) -> Result<(), ScpiError> {
        if let Some(allowed) = slot.kind().allowed_modes() {
            if !allowed.contains(&mode) {
                return Err(ScpiError::Validation(format!(
                    "{slot} does not support mode {mode}, expected one of {allowed:?}"
                )));
            }
        }
        self.instrument
            .write_checked(&format!(":PAGE:CHAN:{slot}:MODE {}", mode.as_scpi()))
    }

    pub(crate) fn channel_function(&mut self, slot: ChannelSlot) -> Result<Function, ScpiError> {
        let reply = self
            .instrument
            .ask_checked(&format!(":PAGE:CHAN:{slot}:FUNC?"))?;
        Function::from_scpi(&reply)
    }

    pub(crate) fn set_channel_function(
        &mut self,
        slot: ChannelSlot,
        function: Function,
    ) -> Result<(), ScpiError> {
        self.instrument
            .write_checked(&format!(":PAGE:CHAN:{slot}:FUNC {}", function.as_scpi()))?;
        self.roles.assign(slot, function);
        Ok(())
    }

    pub(crate) fn signal_name(&mut self, slot: ChannelSlot, kind: SignalKind) -> Result<String, ScpiError> {
        let reply = self
            .instrument
            .ask_checked(&format!(":PAGE:CHAN:{slot}:{}?", kind.header()))?;
        Ok(unquote(&reply).to_string())
    }

    pub(crate) fn set_signal_name(
        &mut self,
        slot: ChannelSlot,
        kind: SignalKind,
        name: &str,
    ) -> Result<(), ScpiError> {
        let name = normalize_signal_name(name);
        self.instrument
            .write_checked(&format!(":PAGE:CHAN:{slot}:{} '{name}'", kind.header()))
    }

    pub(crate) fn reset_channel(&mut self, slot: ChannelSlot) -> Result<(), ScpiError> {
        if !slot.kind().is_measurement() {
            return Err(ScpiError::Lookup(format!("{slot} is not a channel that can be disabled")));
        }
        self.instrument.write(&format!(":PAGE:CHAN:{slot}:DIS"))?;
        self.roles.clear_slot(slot);
        self.instrument.ensure_no_errors()
    }

    pub(crate) fn series_resistance(&mut self, slot: ChannelSlot) -> Result<SeriesResistance, ScpiError> {
        let reply = self
            .instrument
            .ask_checked(&format!(":PAGE:CHAN:{slot}:SRES?"))?;
        SeriesResistance::from_scpi(&reply)
    }

    pub(crate) fn set_series_resistance(
        &mut self,
        slot: ChannelSlot,
        value: SeriesResistance,
    ) -> Result<(), ScpiError> {
        self.instrument
            .write_checked(&format!(":PAGE:CHAN:{slot}:SRES {}", value.as_scpi()))
    }

    /// Constant-source settings are only accepted for a CONS channel that is not
    /// grounded. Returns the current mode.
    fn constant_gate(&mut self, slot: ChannelSlot) -> Result<Mode, ScpiError> {
        let mode = self.channel_mode(slot)?;
        let function = self.channel_function(slot)?;
        if mode == Mode::Common || function != Function::Constant {
            return Err(ScpiError::Precondition(format!(
                "{slot} must be a CONS channel outside COMM mode to take a constant setting \
                 (mode {mode}, function {function})"
            )));
        }
        Ok(mode)
    }

    fn constant_path(&mut self, slot: ChannelSlot) -> Result<String, ScpiError> {
        Ok(match self.analyzer_mode()? {
            AnalyzerMode::Sweep => format!(":PAGE:MEAS:CONS:{slot}"),
            AnalyzerMode::Sampling => format!(":PAGE:MEAS:SAMP:CONS:{slot}"),
        })
    }

    pub(crate) fn constant_value(&mut self, slot: ChannelSlot) -> Result<f64, ScpiError> {
        let path = self.constant_path(slot)?;
        let reply = self.instrument.ask_checked(&format!("{path}?"))?;
        parse_number(&reply)
    }

    pub(crate) fn set_constant_value(&mut self, slot: ChannelSlot, value: f64) -> Result<(), ScpiError> {
        let mode = self.constant_gate(slot)?;
        let range = match slot.kind() {
            ChannelKind::VoltageSource => VSU_OUTPUT_RANGE,
            _ => valid_value_range(Some(mode))?,
        };
        let value = range.check(value, &format!("{slot} constant value"))?;
        let path = self.constant_path(slot)?;
        self.instrument.write_checked(&format!("{path} {value}"))
    }

    pub(crate) fn constant_compliance(&mut self, slot: ChannelSlot) -> Result<f64, ScpiError> {
        let path = self.constant_path(slot)?;
        let reply = self.instrument.ask_checked(&format!("{path}:COMP?"))?;
        parse_number(&reply)
    }

    pub(crate) fn set_constant_compliance(
        &mut self,
        slot: ChannelSlot,
        value: f64,
    ) -> Result<(), ScpiError> {
        let mode = self.constant_gate(slot)?;
        let value = valid_compliance_range(Some(mode))?
            .check(value, &format!("{slot} compliance"))?;
        let path = self.constant_path(slot)?;
        self.instrument.write_checked(&format!("{path}:COMP {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agilent4156::tests::analyzer;

    #[test]
    fn legal_names_are_kept() {
        for name in ["VC", "IB", "Vbase", "abcdef"] {
            assert_eq!(normalize_signal_name(name), name);
        }
    }

    #[test]
    fn illegal_names_are_rewritten() {
        assert_eq!(normalize_signal_name("2ndgate"), "a2ndga");
        assert_eq!(normalize_signal_name("collector"), "acolle");
        assert_eq!(normalize_signal_name(""), "a");
        for name in ["9", "emitter_current", "_x"] {
            let renamed = normalize_signal_name(name);
            assert!(renamed.chars().count() <= MAX_SIGNAL_NAME_LEN);
            assert!(renamed.starts_with('a'));
        }
    }

    #[test]
    fn renames_are_logged() {
        testing_logger::setup();
        normalize_signal_name("VC");
        testing_logger::validate(|logs| assert!(logs.is_empty()));

        normalize_signal_name("collector");
        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Warn);
            assert!(logs[0].body.contains("'collector'"));
            assert!(logs[0].body.contains("'acolle'"));
        });
    }

    #[test]
    fn sweep_slots_cannot_be_reset() {
        let mut a = analyzer();
        assert!(matches!(
            a.reset_channel(ChannelSlot::Var1),
            Err(ScpiError::Lookup(_))
        ));
        assert!(a.adapter().written().is_empty());
    }

    #[test]
    fn signal_name_queries_drain_the_error_queue() {
        let mut a = analyzer();
        a.adapter_mut().push_error(-113, "Undefined header");
        assert!(matches!(
            a.vmu(2).unwrap().voltage_name(),
            Err(ScpiError::Instrument(_))
        ));
    }

    #[test]
    fn signal_names_are_quoted_on_the_wire() {
        let mut a = analyzer();
        let mut smu = a.smu(1).unwrap();
        smu.set_voltage_name("VC").unwrap();
        smu.set_current_name("collector").unwrap();
        assert_eq!(smu.voltage_name().unwrap(), "VC");
        assert_eq!(smu.current_name().unwrap(), "acolle");
        assert_eq!(
            a.adapter().set_commands(),
            vec![":PAGE:CHAN:SMU1:VNAME 'VC'", ":PAGE:CHAN:SMU1:INAME 'acolle'"]
        );
    }

    #[test]
    fn constant_value_requires_constant_function() {
        let mut a = analyzer();
        a.adapter_mut().set_state(":PAGE:CHAN:SMU1:MODE", "V");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU1:FUNC", "VAR1");

        let mut smu = a.smu(1).unwrap();
        assert!(matches!(
            smu.set_constant_value(1.0),
            Err(ScpiError::Precondition(_))
        ));
        assert!(matches!(
            smu.set_compliance(0.1),
            Err(ScpiError::Precondition(_))
        ));
        assert!(a.adapter().set_commands().is_empty());
    }

    #[test]
    fn common_mode_blocks_constant_settings() {
        let mut a = analyzer();
        a.adapter_mut().set_state(":PAGE:CHAN:VSU1:MODE", "COMM");
        a.adapter_mut().set_state(":PAGE:CHAN:VSU1:FUNC", "CONS");

        assert!(matches!(
            a.vsu(1).unwrap().set_constant_value(1.0),
            Err(ScpiError::Precondition(_))
        ));
        assert!(a.adapter().set_commands().is_empty());
    }

    #[test]
    fn constant_settings_follow_the_analyzer_mode() {
        let mut a = analyzer();
        a.adapter_mut().set_state(":PAGE:CHAN:MODE", "SWE");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU2:MODE", "V");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU2:FUNC", "CONS");

        a.smu(2).unwrap().set_constant_value(5.0).unwrap();
        a.smu(2).unwrap().set_compliance(0.01).unwrap();
        a.set_analyzer_mode(AnalyzerMode::Sampling).unwrap();
        a.smu(2).unwrap().set_constant_value(-3.0).unwrap();

        assert_eq!(
            a.adapter().set_commands(),
            vec![
                ":PAGE:MEAS:CONS:SMU2 5",
                ":PAGE:MEAS:CONS:SMU2:COMP 0.01",
                ":PAGE:CHAN:MODE SAMP",
                ":PAGE:MEAS:SAMP:CONS:SMU2 -3",
            ]
        );
        assert_eq!(a.smu(2).unwrap().constant_value().unwrap(), -3.0);
    }

    #[test]
    fn constant_ranges_depend_on_mode_and_kind() {
        let mut a = analyzer();
        a.adapter_mut().set_state(":PAGE:CHAN:SMU1:MODE", "I");
        a.adapter_mut().set_state(":PAGE:CHAN:SMU1:FUNC", "CONS");
        a.adapter_mut().set_state(":PAGE:CHAN:VSU2:MODE", "V");
        a.adapter_mut().set_state(":PAGE:CHAN:VSU2:FUNC", "CONS");

        assert!(matches!(
            a.smu(1).unwrap().set_constant_value(2.0),
            Err(ScpiError::Validation(_))
        ));
        assert!(a.smu(1).unwrap().set_compliance(150.0).is_ok());
        assert!(a.vsu(2).unwrap().set_constant_value(150.0).is_ok());
        assert!(matches!(
            a.vsu(2).unwrap().set_constant_value(201.0),
            Err(ScpiError::Validation(_))
        ));
    }

    #[test]
    fn vmu_rejects_current_mode() {
        let mut a = analyzer();
        let mut vmu = a.vmu(1).unwrap();
        assert!(matches!(
            vmu.set_mode(Mode::Current),
            Err(ScpiError::Validation(_))
        ));
        vmu.set_mode(Mode::DerivedVoltage).unwrap();
        assert_eq!(vmu.mode().unwrap(), Mode::DerivedVoltage);
        assert_eq!(a.adapter().set_commands(), vec![":PAGE:CHAN:VMU1:MODE DVOL"]);
    }

    #[test]
    fn vsu_passes_any_mode_through() {
        let mut a = analyzer();
        a.vsu(1).unwrap().set_mode(Mode::Current).unwrap();
        assert_eq!(a.adapter().state(":PAGE:CHAN:VSU1:MODE"), Some("I"));
    }

    #[test]
    fn instrument_errors_surface_after_a_set() {
        let mut a = analyzer();
        a.adapter_mut().push_error(-224, "Illegal parameter value");
        match a.smu(3).unwrap().set_series_resistance(SeriesResistance::OneMegaOhm) {
            Err(ScpiError::Instrument(entries)) => assert_eq!(entries[0].code, -224),
            other => panic!("expected instrument error, got {other:?}"),
        }
    }

    #[test]
    fn series_resistance_round_trips() {
        let mut a = analyzer();
        let mut smu = a.smu(4).unwrap();
        smu.set_series_resistance(SeriesResistance::TenKiloOhm).unwrap();
        assert_eq!(smu.series_resistance().unwrap(), SeriesResistance::TenKiloOhm);
    }
}
