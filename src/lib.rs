pub mod agilent4156;
pub mod anritsu;
pub mod error;
pub mod fakes;
pub mod plotting;
pub mod scpi;
pub mod thyracont;
pub mod validators;

pub use agilent4156::{
    Agilent4156, AnalyzerMode, ChannelSlot, ConfigurationDocument, IntegrationTime,
    MeasuredData, SamplingPeriod, Timing, VariableSelection,
};
pub use anritsu::AnritsuMG3692C;
pub use error::{InstrumentErrorEntry, ScpiError};
pub use fakes::{FakeInstrument, FrameFormat, SwissArmyFake};
pub use plotting::{plot_columns, plot_values};
pub use thyracont::SmartlineV2;
pub use scpi::{Adapter, ConnectionConfig, FakeAdapter, ScpiInstrument, TcpAdapter, TcpAdapterBuilder};
