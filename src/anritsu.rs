//! Anritsu MG3692C signal generator.

use crate::error::ScpiError;
use crate::scpi::instrument::parse_number;
use crate::scpi::{Adapter, ScpiInstrument};
use log::info;

pub struct AnritsuMG3692C<A: Adapter> {
    instrument: ScpiInstrument<A>,
}

impl<A: Adapter> AnritsuMG3692C<A> {
    /// Wrap a link to the generator.
    ///
    /// # Examples
    /// ```no_run
    /// use rusty_scpi::{AnritsuMG3692C, TcpAdapter};
    ///
    /// let mut generator = AnritsuMG3692C::new(TcpAdapter::new("192.168.1.40", 5025)?);
    /// generator.set_frequency(2.4e9)?;
    /// generator.set_power(-10.0)?;
    /// generator.enable()?;
    /// # Ok::<(), rusty_scpi::ScpiError>(())
    /// ```
    pub fn new(adapter: A) -> Self {
        Self {
            instrument: ScpiInstrument::new(adapter, "Anritsu MG3692C Signal Generator"),
        }
    }

    pub fn instrument(&mut self) -> &mut ScpiInstrument<A> {
        &mut self.instrument
    }

    /// Output power in dBm.
    pub fn power(&mut self) -> Result<f64, ScpiError> {
        self.instrument.ask_f64(":POWER?;")
    }

    pub fn set_power(&mut self, dbm: f64) -> Result<(), ScpiError> {
        self.instrument.write(&format!(":POWER {dbm} dBm;"))
    }

    /// Output frequency in Hz.
    pub fn frequency(&mut self) -> Result<f64, ScpiError> {
        self.instrument.ask_f64(":FREQUENCY?;")
    }

    pub fn set_frequency(&mut self, hz: f64) -> Result<(), ScpiError> {
        self.instrument.write(&format!(":FREQUENCY {hz:e} Hz;"))
    }

    pub fn output(&mut self) -> Result<bool, ScpiError> {
        let reply = self.instrument.ask(":OUTPUT?")?;
        if reply.eq_ignore_ascii_case("ON") {
            return Ok(true);
        }
        Ok(parse_number(&reply)? as i64 == 1)
    }

    pub fn set_output(&mut self, on: bool) -> Result<(), ScpiError> {
        self.instrument
            .write(if on { ":OUTPUT ON;" } else { ":OUTPUT OFF;" })
    }

    pub fn enable(&mut self) -> Result<(), ScpiError> {
        self.set_output(true)
    }

    pub fn disable(&mut self) -> Result<(), ScpiError> {
        self.set_output(false)
    }

    /// Turn the RF output off and mark the generator as shut down.
    pub fn shutdown(&mut self) -> Result<(), ScpiError> {
        info!("Disabling RF output before shutdown");
        self.disable()?;
        self.instrument.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scpi::FakeAdapter;

    fn generator() -> AnritsuMG3692C<FakeAdapter> {
        AnritsuMG3692C::new(FakeAdapter::new())
    }

    #[test]
    fn power_and_frequency_use_units() {
        let mut g = generator();
        g.set_power(-10.5).unwrap();
        g.set_frequency(2.4e9).unwrap();
        assert_eq!(
            g.instrument().adapter().set_commands(),
            vec![":POWER -10.5 dBm;", ":FREQUENCY 2.4e9 Hz;"]
        );
        assert_eq!(g.power().unwrap(), -10.5);
        assert_eq!(g.frequency().unwrap(), 2.4e9);
    }

    #[test]
    fn output_state() {
        let mut g = generator();
        g.instrument().adapter_mut().push_reply(":OUTPUT?", "1");
        assert!(g.output().unwrap());
        g.instrument().adapter_mut().push_reply(":OUTPUT?", "0");
        assert!(!g.output().unwrap());

        g.enable().unwrap();
        assert!(g.output().unwrap());
    }

    #[test]
    fn shutdown_disables_output_first() {
        let mut g = generator();
        g.enable().unwrap();
        g.shutdown().unwrap();
        assert_eq!(
            g.instrument().adapter().set_commands(),
            vec![":OUTPUT ON;", ":OUTPUT OFF;"]
        );
        assert!(g.instrument().is_shut_down());
    }
}
