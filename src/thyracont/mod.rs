//! Thyracont Smartline V2 vacuum transmitters.
//!
//! Protocol v2 frames are plain ASCII, terminated by a carriage return:
//!
//! | bytes | content |
//! |---|---|
//! | 0-2 | device address, `001` to `016` |
//! | 3 | access code (`0` read, `2` write, `4` factory default; replies use `1`, `3`, `5`, and `7` for errors) |
//! | 4-5 | two-letter command |
//! | 6-7 | data length, zero padded |
//! | 8.. | data |
//! | last | [`checksum`] of everything before it |
//!
//! Any [`Adapter`] with `\r` terminations carries the frames, for example a
//! [`TcpAdapter`](crate::TcpAdapter) talking to an RS485 gateway.
//!
//! ```no_run
//! use rusty_scpi::TcpAdapter;
//! use rusty_scpi::thyracont::{Sensor, SmartlineV2};
//!
//! let adapter = TcpAdapter::builder()
//!     .address("192.168.1.30")
//!     .port(4001)
//!     .read_termination(b'\r')
//!     .write_termination("\r")
//!     .build()?;
//! let mut gauge = SmartlineV2::new(adapter, 1)?;
//! println!("{} mbar", gauge.pressure()?);
//! println!("Pirani: {} mbar", gauge.pirani().pressure()?);
//! # Ok::<(), rusty_scpi::ScpiError>(())
//! ```

pub mod sensors;

pub use sensors::{
    Ambient, ColdCathode, FilamentMode, FilamentStatus, GasCorrected, HotCathode, Piezo,
    Pirani, PiraniStatistics, Relative, Sensor,
};

use crate::error::ScpiError;
use crate::scpi::Adapter;
use crate::validators::strict_discrete_set;
use log::{debug, info};
use std::fmt;
use std::ops::RangeInclusive;

const ADDRESSES: RangeInclusive<u8> = 1..=16;
const BAUD_RATES: [u32; 7] = [9600, 14400, 19200, 28800, 38400, 57600, 115200];
/// Address, access code, command and data length.
const HEADER_LEN: usize = 8;
const ERROR_ACCESS_CODE: char = '7';

/// Checksum character of a frame: the byte sum modulo 64, shifted into the
/// printable range.
///
/// ```
/// assert_eq!(rusty_scpi::thyracont::checksum("0010MV00"), 'D');
/// ```
pub fn checksum(message: &str) -> char {
    let sum: u32 = message.bytes().map(u32::from).sum();
    char::from((sum % 64 + 64) as u8)
}

/// Prefix `value` with its two-digit length.
pub fn compose_data(value: &str) -> String {
    format!("{:02}{value}", value.len())
}

fn device_error(code: &str) -> &'static str {
    match code {
        "NO_DEF" => "Invalid command for this device.",
        "_LOGIC" => "Access code is invalid or illogical command.",
        "_RANGE" => "Value sent is out of range.",
        "ERROR1" => "Sensor defect or stacked out.",
        "SYNTAX" => "Wrong syntax or mode in data is invalid for this device.",
        "LENGTH" => "Length of data is out of expected range.",
        "_CD_RE" => "Calibration data read error.",
        "_EP_RE" => "EEPROM read error.",
        "_UNSUP" => "Unsupported data for that command.",
        "_SEDIS" => "Sensor element disabled.",
        _ => "Unknown device error.",
    }
}

/// Request access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCode {
    Read,
    Write,
    FactoryDefault,
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessCode::Read => "0",
            AccessCode::Write => "2",
            AccessCode::FactoryDefault => "4",
        })
    }
}

/// Pressure source, either a single sensor or a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Combination,
    Pirani,
    Piezo,
    HotCathode,
    ColdCathode,
    Ambient,
    Relative,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::Combination,
        Source::Pirani,
        Source::Piezo,
        Source::HotCathode,
        Source::ColdCathode,
        Source::Ambient,
        Source::Relative,
    ];

    pub fn id(self) -> u8 {
        match self {
            Source::Combination => 0,
            Source::Pirani => 1,
            Source::Piezo => 2,
            Source::HotCathode => 3,
            Source::ColdCathode => 4,
            Source::Ambient => 6,
            Source::Relative => 7,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, ScpiError> {
        Source::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| ScpiError::Protocol(format!("unknown pressure source {id}")))
    }
}

/// Unit of the pressure shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressureUnit {
    Mbar,
    Torr,
    HectoPascal,
}

impl PressureUnit {
    pub const ALL: [PressureUnit; 3] =
        [PressureUnit::Mbar, PressureUnit::Torr, PressureUnit::HectoPascal];

    pub fn label(self) -> &'static str {
        match self {
            PressureUnit::Mbar => "mbar",
            PressureUnit::Torr => "Torr",
            PressureUnit::HectoPascal => "hPa",
        }
    }
}

impl fmt::Display for PressureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Orientation of the display relative to the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayOrientation {
    Top,
    Bottom,
}

/// Hand-over between the low- and high-pressure sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorTransition {
    /// Switch at 1 mbar.
    Direct,
    /// Blend between 5 and 15 mbar.
    Continuous,
    /// Blend between `low` and `high` mbar.
    ContinuousBetween { low: f64, high: f64 },
    /// Switch at the given pressure in mbar.
    DirectAt(f64),
}

impl SensorTransition {
    fn parse(reply: &str) -> Result<Self, ScpiError> {
        let bad = || ScpiError::Protocol(format!("unexpected sensor transition '{reply}'"));
        match reply {
            "0" => Ok(SensorTransition::Direct),
            "1" => Ok(SensorTransition::Continuous),
            _ => {
                if let Some(bounds) = reply.strip_prefix('F') {
                    let (low, high) = bounds.split_once('T').ok_or_else(bad)?;
                    Ok(SensorTransition::ContinuousBetween {
                        low: parse_f64(low)?,
                        high: parse_f64(high)?,
                    })
                } else if let Some(point) = reply.strip_prefix('D') {
                    Ok(SensorTransition::DirectAt(parse_f64(point)?))
                } else {
                    Err(bad())
                }
            }
        }
    }

    fn data(self) -> Result<String, ScpiError> {
        match self {
            SensorTransition::Continuous => Ok("1".to_string()),
            SensorTransition::ContinuousBetween { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(ScpiError::Validation(format!(
                        "transition bounds must satisfy low < high, got {low} and {high}"
                    )));
                }
                Ok(format!("F{low}T{high}"))
            }
            SensorTransition::DirectAt(point) if point.is_finite() => Ok(format!("D{point}")),
            SensorTransition::DirectAt(point) => Err(ScpiError::Validation(format!(
                "transition point {point} is not finite"
            ))),
            SensorTransition::Direct => Err(ScpiError::Validation(
                "direct switching needs a transition point, use DirectAt".to_string(),
            )),
        }
    }
}

fn parse_f64(reply: &str) -> Result<f64, ScpiError> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|_| ScpiError::Protocol(format!("cannot parse '{reply}' as a number")))
}

fn parse_int(reply: &str) -> Result<i64, ScpiError> {
    reply
        .trim()
        .parse::<i64>()
        .map_err(|_| ScpiError::Protocol(format!("cannot parse '{reply}' as an integer")))
}

fn parse_ints(reply: &str, separator: char) -> Result<Vec<i64>, ScpiError> {
    reply.split(separator).map(parse_int).collect()
}

fn parse_flag(reply: &str) -> Result<bool, ScpiError> {
    match reply.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ScpiError::Protocol(format!("expected 0 or 1, got '{other}'"))),
    }
}

/// Pressure in mbar; underrange reads as 0 and overrange as infinity.
fn parse_pressure(reply: &str) -> Result<f64, ScpiError> {
    parse_f64(&reply.replace("UR", "0").replace("OR", "inf"))
}

/// A Smartline V2 transmitter on an RS485 bus.
///
/// Which sensors exist depends on the model (a VSH carries a Pirani and a hot
/// cathode, a VSR a piezo and a Pirani). Asking a sensor the device lacks fails with
/// the device's `NO_DEF` error.
pub struct SmartlineV2<A: Adapter> {
    adapter: A,
    address: u8,
}

impl<A: Adapter> SmartlineV2<A> {
    /// Create a driver for the transmitter at `address`.
    ///
    /// # Arguments
    /// * `adapter` - Link with `\r` read and write terminations
    /// * `address` - Bus address of the transmitter, 1 to 16
    ///
    /// # Errors
    /// [`ScpiError::Validation`] for an address outside 1 to 16.
    pub fn new(adapter: A, address: u8) -> Result<Self, ScpiError> {
        if !ADDRESSES.contains(&address) {
            return Err(ScpiError::Validation(format!(
                "address {address} not in {}..={}",
                ADDRESSES.start(),
                ADDRESSES.end()
            )));
        }
        Ok(Self { adapter, address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Send `command` (access code onwards) with the address prefix and checksum.
    pub fn write(&mut self, command: &str) -> Result<(), ScpiError> {
        let message = format!("{:03}{command}", self.address);
        let frame = format!("{message}{}", checksum(&message));
        debug!("[Smartline {}] -> {frame}", self.address);
        self.adapter.write(&frame)
    }

    /// Send a command built from an access code, a two-letter command and data.
    pub fn write_composition(
        &mut self,
        access: AccessCode,
        command: &str,
        data: &str,
    ) -> Result<(), ScpiError> {
        self.write(&format!("{access}{command}{}", compose_data(data)))
    }

    /// Read one reply frame and return its data.
    ///
    /// Bytes outside printable ASCII are dropped first; the transmitters emit them
    /// now and then.
    ///
    /// # Errors
    /// - [`ScpiError::Instrument`] for an error reply, with the device's error text
    /// - [`ScpiError::Protocol`] for a short frame, a reply to a different command
    ///   than `expected`, or a wrong checksum
    pub fn read(&mut self, expected: Option<&str>) -> Result<String, ScpiError> {
        let raw = self.adapter.read()?;
        let frame: String = raw.chars().filter(|c| c.is_ascii() && *c != '\0').collect();
        debug!("[Smartline {}] <- {frame}", self.address);

        if frame.len() <= HEADER_LEN {
            return Err(ScpiError::Protocol(format!("reply '{frame}' is too short")));
        }
        let (body, sum) = frame.split_at(frame.len() - 1);
        let data = &body[HEADER_LEN..];

        if body[3..4].starts_with(ERROR_ACCESS_CODE) {
            return Err(ScpiError::instrument(format!(
                "{data}: {}",
                device_error(data)
            )));
        }
        if let Some(command) = expected {
            if &body[4..6] != command {
                return Err(ScpiError::Protocol(format!(
                    "wrong response to {command}: '{frame}'"
                )));
            }
        }
        if !sum.starts_with(checksum(body)) {
            return Err(ScpiError::Protocol(format!(
                "checksum of '{frame}' is wrong"
            )));
        }
        Ok(data.to_string())
    }

    /// Send a complete message (access code, command, length and data) and read the
    /// reply, which must answer the same command.
    pub fn ask(&mut self, message: &str) -> Result<String, ScpiError> {
        let command = message
            .get(1..3)
            .ok_or_else(|| ScpiError::Validation(format!("message '{message}' has no command")))?
            .to_string();
        self.write(message)?;
        self.read(Some(&command))
    }

    /// Compose a message, send it and read the checked reply.
    pub fn ask_manually(
        &mut self,
        access: AccessCode,
        command: &str,
        data: &str,
    ) -> Result<String, ScpiError> {
        self.write_composition(access, command, data)?;
        self.read(Some(command))
    }

    fn get(&mut self, command: &str) -> Result<String, ScpiError> {
        self.ask_manually(AccessCode::Read, command, "")
    }

    /// Write and consume the acknowledgement, surfacing device errors.
    fn set(&mut self, command: &str, data: &str) -> Result<(), ScpiError> {
        self.ask_manually(AccessCode::Write, command, data)?;
        Ok(())
    }

    /// Upper and lower limit of the measurement range in mbar.
    pub fn measurement_range(&mut self) -> Result<Vec<f64>, ScpiError> {
        let reply = self.get("MR")?;
        reply
            .get(1..)
            .unwrap_or_default()
            .split('L')
            .map(parse_f64)
            .collect()
    }

    /// Pressure of the default sensor in mbar.
    ///
    /// Underrange reads as `0.0`, overrange as `f64::INFINITY`.
    ///
    /// # Examples
    /// ```
    /// use rusty_scpi::FakeAdapter;
    /// use rusty_scpi::thyracont::{checksum, SmartlineV2};
    ///
    /// let mut fake = FakeAdapter::new();
    /// fake.push_reply("0010MV00D", &format!("0011MV02UR{}", checksum("0011MV02UR")));
    /// let mut gauge = SmartlineV2::new(fake, 1)?;
    /// assert_eq!(gauge.pressure()?, 0.0);
    /// # Ok::<(), rusty_scpi::ScpiError>(())
    /// ```
    pub fn pressure(&mut self) -> Result<f64, ScpiError> {
        let reply = self.get("MV")?;
        parse_pressure(&reply)
    }

    pub fn display_unit(&mut self) -> Result<PressureUnit, ScpiError> {
        let reply = self.get("DU")?;
        PressureUnit::ALL
            .into_iter()
            .find(|u| u.label() == reply)
            .ok_or_else(|| ScpiError::Protocol(format!("unknown display unit '{reply}'")))
    }

    pub fn set_display_unit(&mut self, unit: PressureUnit) -> Result<(), ScpiError> {
        self.set("DU", unit.label())
    }

    pub fn display_orientation(&mut self) -> Result<DisplayOrientation, ScpiError> {
        let reply = self.get("DO")?;
        Ok(if parse_flag(&reply)? {
            DisplayOrientation::Bottom
        } else {
            DisplayOrientation::Top
        })
    }

    pub fn set_display_orientation(
        &mut self,
        orientation: DisplayOrientation,
    ) -> Result<(), ScpiError> {
        let data = match orientation {
            DisplayOrientation::Top => "0",
            DisplayOrientation::Bottom => "1",
        };
        self.set("DO", data)
    }

    /// Source of the value shown on the display.
    pub fn display_data(&mut self) -> Result<Source, ScpiError> {
        let reply = self.get("DD")?;
        let id = u8::try_from(parse_int(&reply)?)
            .map_err(|_| ScpiError::Protocol(format!("unknown pressure source '{reply}'")))?;
        Source::from_id(id)
    }

    pub fn set_display_data(&mut self, source: Source) -> Result<(), ScpiError> {
        self.set("DD", &source.id().to_string())
    }

    /// Set the upper switching threshold in mbar.
    pub fn set_high_pressure(&mut self, mbar: f64) -> Result<(), ScpiError> {
        self.set("AH", &mbar.to_string())
    }

    /// Set the lower switching threshold in mbar.
    pub fn set_low_pressure(&mut self, mbar: f64) -> Result<(), ScpiError> {
        self.set("AL", &mbar.to_string())
    }

    pub fn sensor_transition(&mut self) -> Result<SensorTransition, ScpiError> {
        let reply = self.get("ST")?;
        SensorTransition::parse(&reply)
    }

    /// Choose how the transmitter hands over between its sensors.
    ///
    /// # Errors
    /// [`ScpiError::Validation`] for [`SensorTransition::Direct`], which has no
    /// settable form, and for inverted or non-finite bounds.
    pub fn set_sensor_transition(&mut self, transition: SensorTransition) -> Result<(), ScpiError> {
        let data = transition.data()?;
        self.set("ST", &data)
    }

    /// Restore the device's default transition.
    pub fn set_default_sensor_transition(&mut self) -> Result<(), ScpiError> {
        self.set_sensor_transition(SensorTransition::Continuous)
    }

    /// Device type, such as `VSR205`.
    pub fn device_type(&mut self) -> Result<String, ScpiError> {
        self.get("TD")
    }

    /// Product name (article number).
    pub fn product_name(&mut self) -> Result<String, ScpiError> {
        self.get("PN")
    }

    pub fn device_serial(&mut self) -> Result<String, ScpiError> {
        self.get("SD")
    }

    pub fn sensor_serial(&mut self) -> Result<String, ScpiError> {
        self.get("SH")
    }

    /// Hardware version.
    pub fn device_version(&mut self) -> Result<String, ScpiError> {
        self.get("VD")
    }

    pub fn firmware_version(&mut self) -> Result<String, ScpiError> {
        self.get("VF")
    }

    pub fn bootloader_version(&mut self) -> Result<String, ScpiError> {
        self.get("VB")
    }

    pub fn analog_output_setting(&mut self) -> Result<String, ScpiError> {
        self.get("OC")
    }

    /// Operating hours counters, in hours.
    pub fn operating_hours(&mut self) -> Result<Vec<f64>, ScpiError> {
        let reply = self.get("OH")?;
        Ok(parse_ints(&reply, 'C')?
            .into_iter()
            .map(|quarters| quarters as f64 / 4.0)
            .collect())
    }

    /// Change the serial baud rate. The link has to follow before the next command.
    pub fn set_baud_rate(&mut self, baud: u32) -> Result<(), ScpiError> {
        let baud = strict_discrete_set(baud, &BAUD_RATES)?;
        info!("[Smartline {}] switching to {baud} baud", self.address);
        self.set("BR", &baud.to_string())
    }

    /// Move the transmitter to a new bus address; later commands use it.
    pub fn set_device_address(&mut self, address: u8) -> Result<(), ScpiError> {
        if !ADDRESSES.contains(&address) {
            return Err(ScpiError::Validation(format!(
                "address {address} not in {}..={}",
                ADDRESSES.start(),
                ADDRESSES.end()
            )));
        }
        self.set("DA", &address.to_string())?;
        info!("[Smartline {}] moved to address {address}", self.address);
        self.address = address;
        Ok(())
    }

    pub fn pirani(&mut self) -> Pirani<'_, A> {
        Pirani::new(self)
    }

    pub fn piezo(&mut self) -> Piezo<'_, A> {
        Piezo::new(self)
    }

    pub fn hot_cathode(&mut self) -> HotCathode<'_, A> {
        HotCathode::new(self)
    }

    pub fn cold_cathode(&mut self) -> ColdCathode<'_, A> {
        ColdCathode::new(self)
    }

    pub fn ambient(&mut self) -> Ambient<'_, A> {
        Ambient::new(self)
    }

    pub fn relative(&mut self) -> Relative<'_, A> {
        Relative::new(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scpi::FakeAdapter;

    pub(crate) fn frame(body: &str) -> String {
        format!("{body}{}", checksum(body))
    }

    /// Queue the device's reply to one request, both given without checksum.
    pub(crate) fn script(
        gauge: &mut SmartlineV2<FakeAdapter>,
        request: &str,
        reply_access: char,
        command: &str,
        data: &str,
    ) {
        let reply = format!("001{reply_access}{command}{}", compose_data(data));
        gauge
            .adapter_mut()
            .push_reply(&frame(request), &frame(&reply));
    }

    pub(crate) fn gauge() -> SmartlineV2<FakeAdapter> {
        SmartlineV2::new(FakeAdapter::new(), 1).unwrap()
    }

    #[test]
    fn checksum_and_data_framing() {
        assert_eq!(checksum("0010MV00"), 'D');
        assert!(('@'..='\u{7f}').contains(&checksum("0012DU04Torr")));
        assert_eq!(compose_data("1.5"), "031.5");
        assert_eq!(compose_data(""), "00");
    }

    #[test]
    fn frames_carry_address_and_checksum() {
        let mut g = SmartlineV2::new(FakeAdapter::new(), 12).unwrap();
        g.write_composition(AccessCode::Write, "DU", "mbar").unwrap();
        assert_eq!(g.adapter().written(), &[frame("0122DU04mbar")]);
    }

    #[test]
    fn address_is_validated() {
        assert!(matches!(
            SmartlineV2::new(FakeAdapter::new(), 0),
            Err(ScpiError::Validation(_))
        ));
        assert!(matches!(
            SmartlineV2::new(FakeAdapter::new(), 17),
            Err(ScpiError::Validation(_))
        ));
    }

    #[test]
    fn pressure_maps_under_and_overrange() {
        let mut g = gauge();
        script(&mut g, "0010MV00", '1', "MV", "1.2E-3");
        script(&mut g, "0010MV00", '1', "MV", "UR");
        script(&mut g, "0010MV00", '1', "MV", "OR");
        assert_eq!(g.pressure().unwrap(), 1.2e-3);
        assert_eq!(g.pressure().unwrap(), 0.0);
        assert_eq!(g.pressure().unwrap(), f64::INFINITY);
    }

    #[test]
    fn reply_validation() {
        let mut g = gauge();
        g.adapter_mut()
            .push_reply(&frame("0010MV00"), &format!("0011MV0211{}", 'A'));
        assert!(matches!(g.pressure(), Err(ScpiError::Protocol(_))));

        script(&mut g, "0010MV00", '1', "MR", "1");
        assert!(matches!(g.pressure(), Err(ScpiError::Protocol(_))));

        g.adapter_mut().push_reply(&frame("0010MV00"), "001");
        assert!(matches!(g.pressure(), Err(ScpiError::Protocol(_))));

        script(&mut g, "0010MV00", '7', "MV", "NO_DEF");
        match g.pressure() {
            Err(ScpiError::Instrument(entries)) => {
                assert!(entries[0].message.starts_with("NO_DEF: Invalid command"))
            }
            other => panic!("expected device error, got {other:?}"),
        }
    }

    #[test]
    fn stray_bytes_are_ignored() {
        let mut g = gauge();
        let reply = frame("0011MV045E-4");
        g.adapter_mut()
            .push_reply(&frame("0010MV00"), &format!("\0{reply}\u{fffd}"));
        assert_eq!(g.pressure().unwrap(), 5e-4);
    }

    #[test]
    fn range_and_display() {
        let mut g = gauge();
        script(&mut g, "0010MR00", '1', "MR", "U1000L1E-4");
        script(&mut g, "0012DU04Torr", '3', "DU", "");
        script(&mut g, "0010DU00", '1', "DU", "Torr");
        script(&mut g, "0012DO011", '3', "DO", "");
        script(&mut g, "0010DO00", '1', "DO", "1");
        script(&mut g, "0012DD013", '3', "DD", "");
        script(&mut g, "0010DD00", '1', "DD", "3");

        assert_eq!(g.measurement_range().unwrap(), vec![1000.0, 1e-4]);
        g.set_display_unit(PressureUnit::Torr).unwrap();
        assert_eq!(g.display_unit().unwrap(), PressureUnit::Torr);
        g.set_display_orientation(DisplayOrientation::Bottom).unwrap();
        assert_eq!(g.display_orientation().unwrap(), DisplayOrientation::Bottom);
        g.set_display_data(Source::HotCathode).unwrap();
        assert_eq!(g.display_data().unwrap(), Source::HotCathode);
    }

    #[test]
    fn set_errors_are_reported() {
        let mut g = gauge();
        script(&mut g, "0012DD016", '7', "DD", "_RANGE");
        assert!(matches!(
            g.set_display_data(Source::Ambient),
            Err(ScpiError::Instrument(_))
        ));
    }

    #[test]
    fn sensor_transitions() {
        let mut g = gauge();
        script(&mut g, "0010ST00", '1', "ST", "0");
        script(&mut g, "0010ST00", '1', "ST", "1");
        script(&mut g, "0010ST00", '1', "ST", "F5T15");
        script(&mut g, "0010ST00", '1', "ST", "D2.5");
        assert_eq!(g.sensor_transition().unwrap(), SensorTransition::Direct);
        assert_eq!(g.sensor_transition().unwrap(), SensorTransition::Continuous);
        assert_eq!(
            g.sensor_transition().unwrap(),
            SensorTransition::ContinuousBetween { low: 5.0, high: 15.0 }
        );
        assert_eq!(g.sensor_transition().unwrap(), SensorTransition::DirectAt(2.5));

        script(&mut g, "0012ST011", '3', "ST", "");
        script(&mut g, "0012ST04F2T8", '3', "ST", "");
        script(&mut g, "0012ST04D1.5", '3', "ST", "");
        g.set_default_sensor_transition().unwrap();
        g.set_sensor_transition(SensorTransition::ContinuousBetween { low: 2.0, high: 8.0 })
            .unwrap();
        g.set_sensor_transition(SensorTransition::DirectAt(1.5)).unwrap();

        g.adapter_mut().clear_written();
        assert!(matches!(
            g.set_sensor_transition(SensorTransition::Direct),
            Err(ScpiError::Validation(_))
        ));
        assert!(matches!(
            g.set_sensor_transition(SensorTransition::ContinuousBetween { low: 15.0, high: 5.0 }),
            Err(ScpiError::Validation(_))
        ));
        assert!(g.adapter().written().is_empty());
    }

    #[test]
    fn device_information() {
        let mut g = gauge();
        script(&mut g, "0010TD00", '1', "TD", "VSH89D");
        script(&mut g, "0010PN00", '1', "PN", "211200");
        script(&mut g, "0010SD00", '1', "SD", "12345");
        script(&mut g, "0010SH00", '1', "SH", "67890");
        script(&mut g, "0010VD00", '1', "VD", "1.0");
        script(&mut g, "0010VF00", '1', "VF", "2.3");
        script(&mut g, "0010VB00", '1', "VB", "1.1");
        script(&mut g, "0010OC00", '1', "OC", "0");
        script(&mut g, "0010OH00", '1', "OH", "400C20");

        assert_eq!(g.device_type().unwrap(), "VSH89D");
        assert_eq!(g.product_name().unwrap(), "211200");
        assert_eq!(g.device_serial().unwrap(), "12345");
        assert_eq!(g.sensor_serial().unwrap(), "67890");
        assert_eq!(g.device_version().unwrap(), "1.0");
        assert_eq!(g.firmware_version().unwrap(), "2.3");
        assert_eq!(g.bootloader_version().unwrap(), "1.1");
        assert_eq!(g.analog_output_setting().unwrap(), "0");
        assert_eq!(g.operating_hours().unwrap(), vec![100.0, 5.0]);
    }

    #[test]
    fn baud_rate_and_address() {
        let mut g = gauge();
        assert!(matches!(g.set_baud_rate(12345), Err(ScpiError::Validation(_))));
        assert!(g.adapter().written().is_empty());

        script(&mut g, "0012BR0519200", '3', "BR", "");
        g.set_baud_rate(19200).unwrap();

        script(&mut g, "0012DA015", '3', "DA", "");
        g.set_device_address(5).unwrap();
        assert_eq!(g.address(), 5);
        assert!(matches!(g.set_device_address(20), Err(ScpiError::Validation(_))));

        g.adapter_mut().clear_written();
        let _ = g.pressure();
        assert_eq!(g.adapter().written(), &[frame("0050MV00")]);
    }
}
