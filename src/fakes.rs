//! Software-only instruments for tests and dry runs.

use crate::error::ScpiError;
use crate::scpi::{FakeAdapter, ScpiInstrument};
use ndarray::Array2;
use rand::Rng;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

/// A [`ScpiInstrument`] over a [`FakeAdapter`]: every set command is stored and echoed
/// back by the matching query.
pub struct FakeInstrument {
    instrument: ScpiInstrument<FakeAdapter>,
}

impl FakeInstrument {
    pub fn new() -> Self {
        Self::with_name("Fake Instrument")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            instrument: ScpiInstrument::new(FakeAdapter::new(), name),
        }
    }
}

impl Default for FakeInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for FakeInstrument {
    type Target = ScpiInstrument<FakeAdapter>;

    fn deref(&self) -> &Self::Target {
        &self.instrument
    }
}

impl DerefMut for FakeInstrument {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.instrument
    }
}

/// Pixel format of [`SwissArmyFake::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    #[default]
    Mono8,
    Mono16,
}

impl FrameFormat {
    pub fn max_value(self) -> u16 {
        match self {
            FrameFormat::Mono8 => u16::from(u8::MAX),
            FrameFormat::Mono16 => u16::MAX,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameFormat::Mono8 => "mono_8",
            FrameFormat::Mono16 => "mono_16",
        })
    }
}

impl FromStr for FrameFormat {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mono_8" => Ok(FrameFormat::Mono8),
            "mono_16" => Ok(FrameFormat::Mono16),
            other => Err(ScpiError::Validation(format!(
                "frame format '{other}' is not one of [\"mono_8\", \"mono_16\"]"
            ))),
        }
    }
}

/// Mock instrument producing several kinds of fake data: a constant voltage, a sine
/// wave over elapsed time and random image frames.
///
/// Most accessors sleep for `wait` to imitate instrument latency.
pub struct SwissArmyFake {
    instrument: FakeInstrument,
    wait: Duration,
    start: Option<Instant>,
    voltage: f64,
    output_voltage: f64,
    width: usize,
    height: usize,
    format: FrameFormat,
}

impl SwissArmyFake {
    pub fn new(wait: Duration) -> Self {
        Self {
            instrument: FakeInstrument::with_name("Mock instrument"),
            wait,
            start: None,
            voltage: 10.0,
            output_voltage: 0.0,
            width: 1920,
            height: 1080,
            format: FrameFormat::default(),
        }
    }

    pub fn instrument(&mut self) -> &mut FakeInstrument {
        &mut self.instrument
    }

    fn delay(&self) {
        if !self.wait.is_zero() {
            thread::sleep(self.wait);
        }
    }

    /// Seconds since the first call.
    pub fn time(&mut self) -> f64 {
        self.start.get_or_insert_with(Instant::now).elapsed().as_secs_f64()
    }

    /// `0` restarts the clock; any other value blocks until that time has passed.
    pub fn set_time(&mut self, seconds: f64) {
        if seconds == 0.0 {
            self.start = None;
            return;
        }
        while self.time() < seconds {
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn wave(&mut self) -> f64 {
        self.time().sin()
    }

    pub fn voltage(&self) -> f64 {
        self.delay();
        self.voltage
    }

    pub fn output_voltage(&self) -> f64 {
        self.output_voltage
    }

    pub fn set_output_voltage(&mut self, volts: f64) {
        self.delay();
        self.output_voltage = volts;
    }

    pub fn frame_width(&self) -> usize {
        self.delay();
        self.width
    }

    pub fn set_frame_width(&mut self, width: usize) {
        self.delay();
        self.width = width;
    }

    pub fn frame_height(&self) -> usize {
        self.delay();
        self.height
    }

    pub fn set_frame_height(&mut self, height: usize) {
        self.delay();
        self.height = height;
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.delay();
        self.format
    }

    /// Set the frame format from its name, `mono_8` or `mono_16`.
    pub fn set_frame_format(&mut self, format: &str) -> Result<(), ScpiError> {
        self.format = format.parse()?;
        Ok(())
    }

    /// A new frame of uniformly random pixels within the format's range.
    pub fn frame(&self) -> Array2<u16> {
        let max = self.frame_format().max_value();
        let shape = (self.frame_height(), self.frame_width());
        self.delay();
        let mut rng = rand::thread_rng();
        Array2::from_shape_fn(shape, |_| rng.gen_range(0..=max))
    }
}

impl Default for SwissArmyFake {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_instrument_echoes_settings() {
        let mut fake = FakeInstrument::new();
        fake.write(":VOLT 1.5").unwrap();
        assert_eq!(fake.ask_f64(":VOLT?").unwrap(), 1.5);
        assert_eq!(fake.name(), "Fake Instrument");
    }

    #[test]
    fn swiss_army_defaults() {
        let mut fake = SwissArmyFake::new(Duration::ZERO);
        assert_eq!(fake.voltage(), 10.0);
        assert_eq!(fake.output_voltage(), 0.0);
        fake.set_output_voltage(3.3);
        assert_eq!(fake.output_voltage(), 3.3);
        assert_eq!((fake.frame_width(), fake.frame_height()), (1920, 1080));
        assert_eq!(fake.frame_format(), FrameFormat::Mono8);
    }

    #[test]
    fn time_and_wave_advance() {
        let mut fake = SwissArmyFake::new(Duration::ZERO);
        fake.set_time(0.01);
        let t = fake.time();
        assert!(t >= 0.01);
        assert!((fake.wave() - fake.time().sin()).abs() < 1e-2);
        fake.set_time(0.0);
        assert!(fake.time() < 0.01);
    }

    #[test]
    fn frames_follow_format_and_size() {
        let mut fake = SwissArmyFake::new(Duration::ZERO);
        fake.set_frame_width(8);
        fake.set_frame_height(4);
        let frame = fake.frame();
        assert_eq!(frame.dim(), (4, 8));
        assert!(frame.iter().all(|&p| p <= 255));

        fake.set_frame_format("mono_16").unwrap();
        assert_eq!(fake.frame_format(), FrameFormat::Mono16);
        assert!(matches!(
            fake.set_frame_format("rgb_24"),
            Err(ScpiError::Validation(_))
        ));
    }
}
