use crate::error::ScpiError;
use crate::scpi::instrument::unquote;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Enumerated attribute with a fixed SCPI short code and a user-facing label.
///
/// Labels are what configuration documents and the CLI use; codes are what goes on the
/// wire. Both are accepted, case-insensitively, when parsing instrument replies.
pub trait ScpiToken: Sized + Copy + PartialEq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn as_scpi(self) -> &'static str;

    fn label(self) -> &'static str {
        self.as_scpi()
    }

    fn from_scpi(reply: &str) -> Result<Self, ScpiError> {
        let reply = unquote(reply);
        Self::ALL
            .iter()
            .copied()
            .find(|t| {
                t.as_scpi().eq_ignore_ascii_case(reply) || t.label().eq_ignore_ascii_case(reply)
            })
            .ok_or_else(|| {
                ScpiError::Protocol(format!(
                    "unexpected reply '{reply}', expected one of {:?}",
                    Self::ALL.iter().map(|t| t.label()).collect::<Vec<_>>()
                ))
            })
    }

    /// Parse a user-supplied label, reporting unknown values as validation errors.
    fn from_label(label: &str) -> Result<Self, ScpiError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.label() == label || t.as_scpi() == label)
            .ok_or_else(|| {
                ScpiError::Validation(format!(
                    "'{label}' is not one of {:?}",
                    Self::ALL.iter().map(|t| t.label()).collect::<Vec<_>>()
                ))
            })
    }
}

/// Electrical mode of a measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "V")]
    Voltage,
    #[serde(rename = "I")]
    Current,
    #[serde(rename = "COMM")]
    Common,
    /// Differential voltage measurement, VMU only
    #[serde(rename = "DVOL")]
    DerivedVoltage,
}

impl ScpiToken for Mode {
    const ALL: &'static [Self] = &[
        Mode::Voltage,
        Mode::Current,
        Mode::Common,
        Mode::DerivedVoltage,
    ];

    fn as_scpi(self) -> &'static str {
        match self {
            Mode::Voltage => "V",
            Mode::Current => "I",
            Mode::Common => "COMM",
            Mode::DerivedVoltage => "DVOL",
        }
    }
}

/// Role a channel plays in a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    #[serde(rename = "VAR1")]
    Var1,
    #[serde(rename = "VAR2")]
    Var2,
    #[serde(rename = "VARD")]
    Vard,
    #[serde(rename = "CONS")]
    Constant,
}

impl ScpiToken for Function {
    const ALL: &'static [Self] = &[
        Function::Var1,
        Function::Var2,
        Function::Vard,
        Function::Constant,
    ];

    fn as_scpi(self) -> &'static str {
        match self {
            Function::Var1 => "VAR1",
            Function::Var2 => "VAR2",
            Function::Vard => "VARD",
            Function::Constant => "CONS",
        }
    }
}

/// Instrument-wide measurement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalyzerMode {
    #[default]
    Sweep,
    Sampling,
}

impl ScpiToken for AnalyzerMode {
    const ALL: &'static [Self] = &[AnalyzerMode::Sweep, AnalyzerMode::Sampling];

    fn as_scpi(self) -> &'static str {
        match self {
            AnalyzerMode::Sweep => "SWE",
            AnalyzerMode::Sampling => "SAMP",
        }
    }

    fn label(self) -> &'static str {
        match self {
            AnalyzerMode::Sweep => "SWEEP",
            AnalyzerMode::Sampling => "SAMPLING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrationTime {
    Short,
    #[default]
    Medium,
    Long,
}

impl ScpiToken for IntegrationTime {
    const ALL: &'static [Self] = &[
        IntegrationTime::Short,
        IntegrationTime::Medium,
        IntegrationTime::Long,
    ];

    fn as_scpi(self) -> &'static str {
        match self {
            IntegrationTime::Short => "SHOR",
            IntegrationTime::Medium => "MED",
            IntegrationTime::Long => "LONG",
        }
    }

    fn label(self) -> &'static str {
        match self {
            IntegrationTime::Short => "SHORT",
            IntegrationTime::Medium => "MEDIUM",
            IntegrationTime::Long => "LONG",
        }
    }
}

/// Series resistor band of an SMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesResistance {
    #[serde(rename = "0OHM")]
    Zero,
    #[serde(rename = "10KOHM")]
    TenKiloOhm,
    #[serde(rename = "100KOHM")]
    HundredKiloOhm,
    #[serde(rename = "1MOHM")]
    OneMegaOhm,
}

impl ScpiToken for SeriesResistance {
    const ALL: &'static [Self] = &[
        SeriesResistance::Zero,
        SeriesResistance::TenKiloOhm,
        SeriesResistance::HundredKiloOhm,
        SeriesResistance::OneMegaOhm,
    ];

    fn as_scpi(self) -> &'static str {
        match self {
            SeriesResistance::Zero => "0OHM",
            SeriesResistance::TenKiloOhm => "10KOHM",
            SeriesResistance::HundredKiloOhm => "100KOHM",
            SeriesResistance::OneMegaOhm => "1MOHM",
        }
    }
}

/// Point spacing of the primary sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Spacing {
    Linear,
    Log10,
    Log25,
    Log50,
}

impl ScpiToken for Spacing {
    const ALL: &'static [Self] = &[
        Spacing::Linear,
        Spacing::Log10,
        Spacing::Log25,
        Spacing::Log50,
    ];

    fn as_scpi(self) -> &'static str {
        match self {
            Spacing::Linear => "LIN",
            Spacing::Log10 => "L10",
            Spacing::Log25 => "L25",
            Spacing::Log50 => "L50",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Spacing::Linear => "LINEAR",
            Spacing::Log10 => "LOG10",
            Spacing::Log25 => "LOG25",
            Spacing::Log50 => "LOG50",
        }
    }
}

macro_rules! token_display_fromstr {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }

            impl FromStr for $ty {
                type Err = ScpiError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty as ScpiToken>::from_label(s)
                }
            }
        )*
    };
}

token_display_fromstr!(
    Mode,
    Function,
    AnalyzerMode,
    IntegrationTime,
    SeriesResistance,
    Spacing
);

/// Sweep-variable roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SweepRole {
    /// Primary sweep
    Var1,
    /// Secondary sweep
    Var2,
    /// Linked sweep, `VARD = VAR1 * ratio + offset`
    Vard,
}

impl SweepRole {
    pub fn function(self) -> Function {
        match self {
            SweepRole::Var1 => Function::Var1,
            SweepRole::Var2 => Function::Var2,
            SweepRole::Vard => Function::Vard,
        }
    }

    pub fn slot(self) -> ChannelSlot {
        match self {
            SweepRole::Var1 => ChannelSlot::Var1,
            SweepRole::Var2 => ChannelSlot::Var2,
            SweepRole::Vard => ChannelSlot::Vard,
        }
    }
}

impl fmt::Display for SweepRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function().as_scpi())
    }
}

/// Hardware family of a channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    SourceMeasure,
    VoltageSense,
    VoltageSource,
    Sweep(SweepRole),
}

const SMU_MODES: &[Mode] = &[Mode::Voltage, Mode::Current, Mode::Common];
const VMU_MODES: &[Mode] = &[Mode::Voltage, Mode::DerivedVoltage];
const NO_MODES: &[Mode] = &[];

impl ChannelKind {
    /// Modes the kind accepts; `None` means any mode is passed through to the
    /// instrument.
    pub fn allowed_modes(self) -> Option<&'static [Mode]> {
        match self {
            ChannelKind::SourceMeasure => Some(SMU_MODES),
            ChannelKind::VoltageSense => Some(VMU_MODES),
            ChannelKind::VoltageSource => None,
            ChannelKind::Sweep(_) => Some(NO_MODES),
        }
    }

    pub fn is_measurement(self) -> bool {
        !matches!(self, ChannelKind::Sweep(_))
    }
}

/// One of the eleven addressable slots of the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelSlot {
    Smu1,
    Smu2,
    Smu3,
    Smu4,
    Vmu1,
    Vmu2,
    Vsu1,
    Vsu2,
    Var1,
    Var2,
    Vard,
}

impl ChannelSlot {
    pub const ALL: [ChannelSlot; 11] = [
        ChannelSlot::Smu1,
        ChannelSlot::Smu2,
        ChannelSlot::Smu3,
        ChannelSlot::Smu4,
        ChannelSlot::Vmu1,
        ChannelSlot::Vmu2,
        ChannelSlot::Vsu1,
        ChannelSlot::Vsu2,
        ChannelSlot::Var1,
        ChannelSlot::Var2,
        ChannelSlot::Vard,
    ];

    /// Slots that can source a sweep, in scan order.
    pub const SWEEP_SOURCES: [ChannelSlot; 6] = [
        ChannelSlot::Smu1,
        ChannelSlot::Smu2,
        ChannelSlot::Smu3,
        ChannelSlot::Smu4,
        ChannelSlot::Vsu1,
        ChannelSlot::Vsu2,
    ];

    /// Slots cleared by a full channel reset, in reset order.
    pub const RESETTABLE: [ChannelSlot; 6] = [
        ChannelSlot::Smu1,
        ChannelSlot::Smu2,
        ChannelSlot::Smu3,
        ChannelSlot::Smu4,
        ChannelSlot::Vmu1,
        ChannelSlot::Vmu2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelSlot::Smu1 => "SMU1",
            ChannelSlot::Smu2 => "SMU2",
            ChannelSlot::Smu3 => "SMU3",
            ChannelSlot::Smu4 => "SMU4",
            ChannelSlot::Vmu1 => "VMU1",
            ChannelSlot::Vmu2 => "VMU2",
            ChannelSlot::Vsu1 => "VSU1",
            ChannelSlot::Vsu2 => "VSU2",
            ChannelSlot::Var1 => "VAR1",
            ChannelSlot::Var2 => "VAR2",
            ChannelSlot::Vard => "VARD",
        }
    }

    pub fn kind(self) -> ChannelKind {
        match self {
            ChannelSlot::Smu1 | ChannelSlot::Smu2 | ChannelSlot::Smu3 | ChannelSlot::Smu4 => {
                ChannelKind::SourceMeasure
            }
            ChannelSlot::Vmu1 | ChannelSlot::Vmu2 => ChannelKind::VoltageSense,
            ChannelSlot::Vsu1 | ChannelSlot::Vsu2 => ChannelKind::VoltageSource,
            ChannelSlot::Var1 => ChannelKind::Sweep(SweepRole::Var1),
            ChannelSlot::Var2 => ChannelKind::Sweep(SweepRole::Var2),
            ChannelSlot::Vard => ChannelKind::Sweep(SweepRole::Vard),
        }
    }

    pub fn sweep_role(self) -> Option<SweepRole> {
        match self.kind() {
            ChannelKind::Sweep(role) => Some(role),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelSlot {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScpiError::Lookup(format!("unknown channel slot '{s}'")))
    }
}

/// Which measured signal of a channel a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Voltage,
    Current,
}

impl SignalKind {
    pub(crate) fn header(self) -> &'static str {
        match self {
            SignalKind::Voltage => "VNAME",
            SignalKind::Current => "INAME",
        }
    }
}

/// Period of a sampling-mode measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SamplingPeriod {
    /// Runs until [`stop`](super::Agilent4156::stop) is sent
    #[default]
    Infinite,
    Seconds(f64),
}

pub const MIN_SAMPLING_PERIOD: f64 = 6e-6;
pub const MAX_SAMPLING_PERIOD: f64 = 1e11;
pub const MAX_SAMPLING_POINTS: u32 = 10001;
pub const DEFAULT_SAMPLING_POINTS: u32 = 100;

impl fmt::Display for SamplingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingPeriod::Infinite => f.write_str("INF"),
            SamplingPeriod::Seconds(s) => write!(f, "{s}"),
        }
    }
}

/// Pauses the driver inserts between consecutive commands.
///
/// The analyzer drops commands that arrive while it is still applying a channel
/// setting, so bulk operations wait `settle_delay` after every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub settle_delay: Duration,
    pub fetch_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            fetch_delay: Duration::from_millis(10),
        }
    }
}

impl Timing {
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            fetch_delay: Duration::ZERO,
        }
    }
}
