//! Agilent 4155/4156 semiconductor parameter analyzer.
//!
//! The analyzer has four source-measure units (SMU1-4), two voltage-sense units
//! (VMU1-2), two voltage-source units (VSU1-2) and three sweep variables (VAR1, VAR2 and
//! the linked VARD). [`Agilent4156`] owns the connection; typed handles such as
//! [`Smu`] or [`Var1`] borrow it to read and write one slot at a time.
//!
//! ```no_run
//! use rusty_scpi::agilent4156::prelude::*;
//! use rusty_scpi::TcpAdapter;
//! use std::path::Path;
//!
//! let adapter = TcpAdapter::new("192.168.1.20", 5025)?;
//! let mut analyzer = Agilent4156::new(adapter);
//!
//! analyzer.configure_from_path("configuration_file.json")?;
//! analyzer.save_display_variables(["VC", "IC", "VB", "IB"])?;
//! analyzer.measure()?;
//! let data = analyzer.get_measured_data(Some(Path::new("t1.csv")))?;
//! println!("{} rows of {:?}", data.n_rows(), data.columns());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod channels;
pub mod configuration;
pub mod data;
pub mod sweep;
pub mod types;

pub use channels::{
    normalize_signal_name, ChannelHandle, FunctionBearing, MeasurementChannel, ModeBearing,
    Smu, Vmu, Vsu,
};
pub use configuration::{ChannelSetting, ConfigurationDocument};
pub use data::{MeasuredData, VariableSelection, MAX_DISPLAY_VARIABLES, MAX_EXTRA_VARIABLES};
pub use sweep::{SteppedSweep, SweepRanged, Var1, Var2, Vard};
pub use types::{
    AnalyzerMode, ChannelKind, ChannelSlot, Function, IntegrationTime, Mode, SamplingPeriod,
    ScpiToken, SeriesResistance, SignalKind, Spacing, SweepRole, Timing,
    DEFAULT_SAMPLING_POINTS, MAX_SAMPLING_PERIOD, MAX_SAMPLING_POINTS, MIN_SAMPLING_PERIOD,
};

/// Everything needed to drive the analyzer, including the capability traits.
pub mod prelude {
    pub use super::{
        AnalyzerMode, Agilent4156, ChannelHandle, ChannelSlot, ConfigurationDocument, Function,
        IntegrationTime, MeasuredData, MeasurementChannel, Mode, ModeBearing, FunctionBearing,
        SamplingPeriod, SeriesResistance, Spacing, SteppedSweep, SweepRanged, Timing,
    };
}

use crate::error::ScpiError;
use crate::scpi::instrument::parse_number;
use crate::scpi::{Adapter, ScpiInstrument};
use crate::validators::{truncated_discrete_set, Range};
use log::{debug, info};
use std::thread;
use std::time::Duration;
use sweep::RoleTable;

const MAX_DELAY_TIME: f64 = 65.0;
const MAX_HOLD_TIME: f64 = 654.0;

/// Driver for the Agilent 4155/4156.
///
/// Every getter re-queries the instrument. The only state kept locally is the
/// assignment of sweep roles to channels, which lets sweep variables find their
/// source channel without scanning all six candidates on every access.
pub struct Agilent4156<A: Adapter> {
    instrument: ScpiInstrument<A>,
    roles: RoleTable,
    timing: Timing,
}

impl<A: Adapter> Agilent4156<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_timing(adapter, Timing::default())
    }

    pub fn with_timing(adapter: A, timing: Timing) -> Self {
        Self {
            instrument: ScpiInstrument::new(
                adapter,
                "Agilent 4155/4156 Semiconductor Parameter Analyzer",
            ),
            roles: RoleTable::default(),
            timing,
        }
    }

    /// Raw access to the SCPI layer.
    ///
    /// Commands sent this way may change channel functions, so the sweep role table
    /// is dropped and re-read on the next sweep lookup.
    pub fn instrument(&mut self) -> &mut ScpiInstrument<A> {
        self.roles = RoleTable::default();
        &mut self.instrument
    }

    pub fn adapter(&self) -> &A {
        self.instrument.adapter()
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        self.instrument.adapter_mut()
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub(crate) fn settle(&self) {
        pause(self.timing.settle_delay);
    }

    /// Borrow a source-measure unit.
    ///
    /// # Arguments
    /// * `index` - SMU number, 1 to 4
    ///
    /// # Errors
    /// [`ScpiError::Lookup`] for any other index.
    ///
    /// # Examples
    /// ```no_run
    /// use rusty_scpi::agilent4156::prelude::*;
    /// use rusty_scpi::TcpAdapter;
    ///
    /// let mut analyzer = Agilent4156::new(TcpAdapter::new("192.168.1.20", 5025)?);
    /// let mut smu = analyzer.smu(1)?;
    /// smu.set_function(Function::Constant)?;
    /// smu.set_mode(Mode::Voltage)?;
    /// smu.set_constant_value(0.7)?;
    /// # Ok::<(), rusty_scpi::ScpiError>(())
    /// ```
    pub fn smu(&mut self, index: u8) -> Result<Smu<'_, A>, ScpiError> {
        let slot = match index {
            1 => ChannelSlot::Smu1,
            2 => ChannelSlot::Smu2,
            3 => ChannelSlot::Smu3,
            4 => ChannelSlot::Smu4,
            _ => return Err(ScpiError::Lookup(format!("no SMU{index} on this analyzer"))),
        };
        Ok(Smu::new(self, slot))
    }

    /// Borrow a voltage-sense unit, 1 or 2.
    ///
    /// # Errors
    /// [`ScpiError::Lookup`] for any other index.
    pub fn vmu(&mut self, index: u8) -> Result<Vmu<'_, A>, ScpiError> {
        let slot = match index {
            1 => ChannelSlot::Vmu1,
            2 => ChannelSlot::Vmu2,
            _ => return Err(ScpiError::Lookup(format!("no VMU{index} on this analyzer"))),
        };
        Ok(Vmu::new(self, slot))
    }

    /// Borrow a voltage-source unit, 1 or 2.
    ///
    /// # Errors
    /// [`ScpiError::Lookup`] for any other index.
    pub fn vsu(&mut self, index: u8) -> Result<Vsu<'_, A>, ScpiError> {
        let slot = match index {
            1 => ChannelSlot::Vsu1,
            2 => ChannelSlot::Vsu2,
            _ => return Err(ScpiError::Lookup(format!("no VSU{index} on this analyzer"))),
        };
        Ok(Vsu::new(self, slot))
    }

    pub fn var1(&mut self) -> Var1<'_, A> {
        Var1::new(self)
    }

    pub fn var2(&mut self) -> Var2<'_, A> {
        Var2::new(self)
    }

    pub fn vard(&mut self) -> Vard<'_, A> {
        Vard::new(self)
    }

    /// Operating mode of the analyzer, sweep or sampling.
    ///
    /// # Errors
    /// Returns `ScpiError` if:
    /// - The query fails or leaves an entry in the error queue
    /// - The reply is neither `SWE` nor `SAMP`
    pub fn analyzer_mode(&mut self) -> Result<AnalyzerMode, ScpiError> {
        let reply = self.instrument.ask_checked(":PAGE:CHAN:MODE?")?;
        AnalyzerMode::from_scpi(&reply)
    }

    pub fn set_analyzer_mode(&mut self, mode: AnalyzerMode) -> Result<(), ScpiError> {
        self.instrument
            .write_checked(&format!(":PAGE:CHAN:MODE {}", mode.as_scpi()))
    }

    pub fn integration_time(&mut self) -> Result<IntegrationTime, ScpiError> {
        let reply = self.instrument.ask_checked(":PAGE:MEAS:MSET:ITIM?")?;
        IntegrationTime::from_scpi(&reply)
    }

    /// Set the A/D integration time used for every measurement channel.
    ///
    /// # Arguments
    /// * `time` - Short, medium or long integration
    ///
    /// # Errors
    /// [`ScpiError::Instrument`] if the analyzer rejects the command.
    ///
    /// # Examples
    /// ```no_run
    /// use rusty_scpi::agilent4156::{Agilent4156, IntegrationTime};
    /// use rusty_scpi::TcpAdapter;
    ///
    /// let mut analyzer = Agilent4156::new(TcpAdapter::new("192.168.1.20", 5025)?);
    /// analyzer.set_integration_time(IntegrationTime::Long)?;
    /// # Ok::<(), rusty_scpi::ScpiError>(())
    /// ```
    pub fn set_integration_time(&mut self, time: IntegrationTime) -> Result<(), ScpiError> {
        self.instrument
            .write_checked(&format!(":PAGE:MEAS:MSET:ITIM {}", time.as_scpi()))
    }

    /// Measurement delay time in seconds.
    pub fn delay_time(&mut self) -> Result<f64, ScpiError> {
        let reply = self.instrument.ask_checked(":PAGE:MEAS:DEL?")?;
        parse_number(&reply)
    }

    /// Set the delay time; the value is rounded up onto the instrument's 0.1 s grid
    /// between 0 and 65 s.
    pub fn set_delay_time(&mut self, seconds: f64) -> Result<(), ScpiError> {
        let grid: Vec<f64> = (0..=(MAX_DELAY_TIME * 10.0) as u32)
            .map(|i| f64::from(i) / 10.0)
            .collect();
        let value = truncated_discrete_set(seconds, &grid)?;
        self.instrument
            .write_checked(&format!(":PAGE:MEAS:DEL {value}"))
    }

    /// Measurement hold time in seconds.
    pub fn hold_time(&mut self) -> Result<f64, ScpiError> {
        let reply = self.instrument.ask_checked(":PAGE:MEAS:HTIME?")?;
        parse_number(&reply)
    }

    /// Set the hold time; the value is rounded up onto whole seconds between 0 and
    /// 654 s.
    pub fn set_hold_time(&mut self, seconds: f64) -> Result<(), ScpiError> {
        let grid: Vec<f64> = (0..=MAX_HOLD_TIME as u32).map(f64::from).collect();
        let value = truncated_discrete_set(seconds, &grid)?;
        self.instrument
            .write_checked(&format!(":PAGE:MEAS:HTIME {value}"))
    }

    /// Reset the instrument to its power-on state (`*RST`).
    ///
    /// All sweep role assignments are forgotten; the next sweep lookup reads them
    /// from the instrument again.
    pub fn reset(&mut self) -> Result<(), ScpiError> {
        info!("Resetting analyzer");
        self.roles = RoleTable::default();
        self.instrument.reset()?;
        self.instrument.ensure_no_errors()
    }

    /// Stop a running measurement. Required before reading data from a sampling run
    /// with an infinite period.
    pub fn stop(&mut self) -> Result<(), ScpiError> {
        self.instrument.write(":PAGE:SCON:STOP")
    }

    /// Run one measurement and block until the instrument reports completion.
    ///
    /// In sampling mode this uses an infinite period and
    /// [`DEFAULT_SAMPLING_POINTS`]; see [`measure_with`](Self::measure_with).
    pub fn measure(&mut self) -> Result<(), ScpiError> {
        self.measure_with(SamplingPeriod::Infinite, DEFAULT_SAMPLING_POINTS)
    }

    /// Run one measurement. `period` and `points` only apply in sampling mode.
    pub fn measure_with(&mut self, period: SamplingPeriod, points: u32) -> Result<(), ScpiError> {
        match self.analyzer_mode()? {
            AnalyzerMode::Sweep => {
                debug!("Starting single sweep measurement");
            }
            AnalyzerMode::Sampling => {
                if let SamplingPeriod::Seconds(s) = period {
                    Range::new(MIN_SAMPLING_PERIOD, MAX_SAMPLING_PERIOD)
                        .check(s, "sampling period")?;
                }
                if !(1..=MAX_SAMPLING_POINTS).contains(&points) {
                    return Err(ScpiError::Validation(format!(
                        "sampling points {points} not in 1..={MAX_SAMPLING_POINTS}"
                    )));
                }
                debug!("Starting sampling measurement: period {period}, {points} points");
                self.instrument
                    .write(&format!(":PAGE:MEAS:SAMP:PER {period}"))?;
                self.instrument
                    .write(&format!(":PAGE:MEAS:SAMP:POIN {points}"))?;
            }
        }

        let reply = self.instrument.ask(":PAGE:SCON:MEAS:SING; *OPC?")?;
        if parse_number(&reply)? as i64 == 1 {
            Ok(())
        } else {
            Err(ScpiError::instrument(format!(
                "measurement did not report completion (reply '{reply}')"
            )))
        }
    }

    /// Disable all SMUs and VMUs, pausing after each.
    ///
    /// Not atomic: the first failing channel aborts the sequence and channels reset
    /// before it stay reset.
    pub fn reset_all_channels(&mut self) -> Result<(), ScpiError> {
        info!("Resetting all SMU and VMU channels");
        for slot in ChannelSlot::RESETTABLE {
            self.reset_channel(slot)?;
            self.settle();
        }
        Ok(())
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scpi::FakeAdapter;

    /// Analyzer on a fake transport, in sweep mode and without pauses.
    pub(crate) fn analyzer() -> Agilent4156<FakeAdapter> {
        let mut fake = FakeAdapter::new();
        fake.set_state(":PAGE:CHAN:MODE", "SWE");
        Agilent4156::with_timing(fake, Timing::immediate())
    }

    #[test]
    fn sampling_measure_programs_period_and_points_first() {
        let mut a = analyzer();
        a.set_analyzer_mode(AnalyzerMode::Sampling).unwrap();
        a.adapter_mut().clear_written();

        a.measure_with(SamplingPeriod::Seconds(100.0), 50).unwrap();

        assert_eq!(
            a.adapter().set_commands(),
            vec![":PAGE:MEAS:SAMP:PER 100", ":PAGE:MEAS:SAMP:POIN 50"]
        );
        assert_eq!(
            a.adapter().written().last().map(String::as_str),
            Some(":PAGE:SCON:MEAS:SING; *OPC?")
        );
    }

    #[test]
    fn sweep_measure_only_issues_the_blocking_command() {
        let mut a = analyzer();
        a.set_analyzer_mode(AnalyzerMode::Sweep).unwrap();
        a.adapter_mut().clear_written();

        a.measure().unwrap();

        assert!(a.adapter().set_commands().is_empty());
        assert!(a
            .adapter()
            .written()
            .iter()
            .any(|c| c == ":PAGE:SCON:MEAS:SING; *OPC?"));
    }

    #[test]
    fn sampling_measure_rejects_bad_points_before_writing() {
        let mut a = analyzer();
        a.set_analyzer_mode(AnalyzerMode::Sampling).unwrap();
        a.adapter_mut().clear_written();

        assert!(matches!(
            a.measure_with(SamplingPeriod::Infinite, 0),
            Err(ScpiError::Validation(_))
        ));
        assert!(matches!(
            a.measure_with(SamplingPeriod::Seconds(1e-9), 10),
            Err(ScpiError::Validation(_))
        ));
        assert!(a.adapter().set_commands().is_empty());
    }

    #[test]
    fn incomplete_measurement_is_an_instrument_error() {
        let mut a = analyzer();
        a.set_analyzer_mode(AnalyzerMode::Sweep).unwrap();
        a.adapter_mut()
            .push_reply(":PAGE:SCON:MEAS:SING; *OPC?", "0");
        assert!(matches!(a.measure(), Err(ScpiError::Instrument(_))));
    }

    #[test]
    fn reset_all_channels_disables_smus_and_vmus_in_order() {
        let mut a = analyzer();
        a.reset_all_channels().unwrap();
        assert_eq!(
            a.adapter().set_commands(),
            vec![
                ":PAGE:CHAN:SMU1:DIS",
                ":PAGE:CHAN:SMU2:DIS",
                ":PAGE:CHAN:SMU3:DIS",
                ":PAGE:CHAN:SMU4:DIS",
                ":PAGE:CHAN:VMU1:DIS",
                ":PAGE:CHAN:VMU2:DIS",
            ]
        );
    }

    #[test]
    fn reset_all_channels_stops_at_first_instrument_error() {
        let mut a = analyzer();
        a.adapter_mut().push_error(-200, "Execution error");
        assert!(matches!(
            a.reset_all_channels(),
            Err(ScpiError::Instrument(_))
        ));
        assert_eq!(a.adapter().set_commands(), vec![":PAGE:CHAN:SMU1:DIS"]);
    }

    #[test]
    fn timing_controls_snap_onto_their_grids() {
        let mut a = analyzer();
        a.set_delay_time(1.04).unwrap();
        a.set_hold_time(2.2).unwrap();
        a.set_delay_time(99.0).unwrap();
        assert_eq!(
            a.adapter().set_commands(),
            vec![":PAGE:MEAS:DEL 1.1", ":PAGE:MEAS:HTIME 3", ":PAGE:MEAS:DEL 65"]
        );
        assert_eq!(a.delay_time().unwrap(), 65.0);
        assert_eq!(a.hold_time().unwrap(), 3.0);
    }

    #[test]
    fn analyzer_mode_and_integration_time_round_trip() {
        let mut a = analyzer();
        a.set_analyzer_mode(AnalyzerMode::Sampling).unwrap();
        a.set_integration_time(IntegrationTime::Long).unwrap();
        assert_eq!(a.adapter().state(":PAGE:CHAN:MODE"), Some("SAMP"));
        assert_eq!(a.analyzer_mode().unwrap(), AnalyzerMode::Sampling);
        assert_eq!(a.integration_time().unwrap(), IntegrationTime::Long);
    }

    #[test]
    fn handle_accessors_reject_missing_units() {
        let mut a = analyzer();
        assert!(a.smu(4).is_ok());
        assert!(matches!(a.smu(5), Err(ScpiError::Lookup(_))));
        assert!(matches!(a.vmu(0), Err(ScpiError::Lookup(_))));
        assert!(matches!(a.vsu(3), Err(ScpiError::Lookup(_))));
    }
}
