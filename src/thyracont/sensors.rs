//! Individual pressure sensors of a transmitter.

use super::{parse_flag, parse_int, parse_ints, parse_pressure, compose_data, SmartlineV2, Source};
use crate::error::ScpiError;
use crate::scpi::Adapter;
use crate::validators::Range;

const GAS_FACTOR_RANGE: Range = Range::new(0.2, 8.0);

/// A sensor channel, addressed by its [`Source`] id.
pub trait Sensor<A: Adapter> {
    const SOURCE: Source;

    fn transmitter(&mut self) -> &mut SmartlineV2<A>;

    /// Pressure of this sensor in mbar; underrange reads as `0.0`, overrange as
    /// infinity.
    fn pressure(&mut self) -> Result<f64, ScpiError> {
        let reply = self.transmitter().get(&format!("M{}", Self::SOURCE.id()))?;
        parse_pressure(&reply)
    }
}

/// Sensors whose reading depends on the gas and can be corrected for it.
pub trait GasCorrected<A: Adapter>: Sensor<A> {
    fn gas_factor(&mut self) -> Result<f64, ScpiError> {
        let reply = self.transmitter().get(&format!("C{}", Self::SOURCE.id()))?;
        super::parse_f64(&reply)
    }

    /// Gas correction factor, 0.2 to 8.
    fn set_gas_factor(&mut self, factor: f64) -> Result<(), ScpiError> {
        let factor = GAS_FACTOR_RANGE.check(factor, "gas factor")?;
        self.transmitter()
            .set(&format!("C{}", Self::SOURCE.id()), &factor.to_string())
    }
}

macro_rules! sensor_handle {
    ($($(#[$meta:meta])* $name:ident => $source:expr),*) => {
        $(
            $(#[$meta])*
            pub struct $name<'a, A: Adapter> {
                transmitter: &'a mut SmartlineV2<A>,
            }

            impl<'a, A: Adapter> $name<'a, A> {
                pub(crate) fn new(transmitter: &'a mut SmartlineV2<A>) -> Self {
                    Self { transmitter }
                }
            }

            impl<A: Adapter> Sensor<A> for $name<'_, A> {
                const SOURCE: Source = $source;

                fn transmitter(&mut self) -> &mut SmartlineV2<A> {
                    self.transmitter
                }
            }
        )*
    };
}

sensor_handle!(
    /// Thermal conductivity gauge; linear below about 1 mbar and gas dependent.
    Pirani => Source::Pirani,
    /// Diaphragm gauge, independent of the gas.
    Piezo => Source::Piezo,
    /// Hot cathode ionisation gauge with two filaments.
    HotCathode => Source::HotCathode,
    ColdCathode => Source::ColdCathode,
    Ambient => Source::Ambient,
    Relative => Source::Relative
);

impl<A: Adapter> GasCorrected<A> for Pirani<'_, A> {}
impl<A: Adapter> GasCorrected<A> for HotCathode<'_, A> {}
impl<A: Adapter> GasCorrected<A> for ColdCathode<'_, A> {}

/// Pirani wear and calibration age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiraniStatistics {
    /// Negative for corrosion, positive for contamination
    pub wear_percent: i64,
    pub hours_since_adjustment: f64,
}

impl<A: Adapter> Pirani<'_, A> {
    pub fn statistics(&mut self) -> Result<PiraniStatistics, ScpiError> {
        let reply = self.transmitter.ask_statistics(Source::Pirani)?;
        let values = parse_ints(reply.trim_matches('W'), 'A')?;
        match values.as_slice() {
            [wear, quarters] => Ok(PiraniStatistics {
                wear_percent: *wear,
                hours_since_adjustment: *quarters as f64 / 4.0,
            }),
            _ => Err(ScpiError::Protocol(format!(
                "unexpected Pirani statistics '{reply}'"
            ))),
        }
    }
}

/// Which hot cathode filament is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilamentMode {
    /// Filament 2 once filament 1 is defective
    SecondIfFirstDefective,
    Filament1,
    Filament2,
    /// Alternate above 1 mbar
    Toggle,
}

impl FilamentMode {
    const ALL: [FilamentMode; 4] = [
        FilamentMode::SecondIfFirstDefective,
        FilamentMode::Filament1,
        FilamentMode::Filament2,
        FilamentMode::Toggle,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilamentStatus {
    BothOk,
    Filament1Defective,
    Filament2Defective,
    BothDefective,
}

impl FilamentStatus {
    const ALL: [FilamentStatus; 4] = [
        FilamentStatus::BothOk,
        FilamentStatus::Filament1Defective,
        FilamentStatus::Filament2Defective,
        FilamentStatus::BothDefective,
    ];
}

fn indexed<T: Copy>(all: &[T], reply: &str, what: &str) -> Result<T, ScpiError> {
    usize::try_from(parse_int(reply)?)
        .ok()
        .and_then(|i| all.get(i).copied())
        .ok_or_else(|| ScpiError::Protocol(format!("unknown {what} '{reply}'")))
}

fn flag_data(on: bool) -> &'static str {
    if on { "1" } else { "0" }
}

impl<A: Adapter> HotCathode<'_, A> {
    pub fn filament_mode(&mut self) -> Result<FilamentMode, ScpiError> {
        let reply = self.transmitter.get("FC")?;
        indexed(&FilamentMode::ALL, &reply, "filament mode")
    }

    pub fn set_filament_mode(&mut self, mode: FilamentMode) -> Result<(), ScpiError> {
        let index = FilamentMode::ALL
            .iter()
            .position(|m| *m == mode)
            .unwrap_or_default();
        self.transmitter.set("FC", &index.to_string())
    }

    pub fn degas(&mut self) -> Result<bool, ScpiError> {
        let reply = self.transmitter.get("DG")?;
        parse_flag(&reply)
    }

    pub fn set_degas(&mut self, on: bool) -> Result<(), ScpiError> {
        self.transmitter.set("DG", flag_data(on))
    }

    /// Whether the cathode is switched on.
    pub fn sensor_enabled(&mut self) -> Result<bool, ScpiError> {
        let reply = self.transmitter.get("CC")?;
        parse_flag(&reply)
    }

    pub fn set_sensor_enabled(&mut self, on: bool) -> Result<(), ScpiError> {
        self.transmitter.set("CC", flag_data(on))
    }

    /// Number of the filament in use.
    pub fn active_filament(&mut self) -> Result<u8, ScpiError> {
        let reply = self.transmitter.get("FN")?;
        u8::try_from(parse_int(&reply)?)
            .map_err(|_| ScpiError::Protocol(format!("invalid filament number '{reply}'")))
    }

    pub fn filament_status(&mut self) -> Result<FilamentStatus, ScpiError> {
        let reply = self.transmitter.get("FS")?;
        indexed(&FilamentStatus::ALL, &reply, "filament status")
    }

    /// Wear of each filament in percent.
    pub fn statistics(&mut self) -> Result<Vec<f64>, ScpiError> {
        let reply = self.transmitter.ask_statistics(Source::HotCathode)?;
        Ok(parse_ints(&reply, 'A')?
            .into_iter()
            .map(|quarters| quarters as f64 / 4.0)
            .collect())
    }
}

impl<A: Adapter> SmartlineV2<A> {
    fn ask_statistics(&mut self, source: Source) -> Result<String, ScpiError> {
        let message = format!("0PM{}", compose_data(&source.id().to_string()));
        self.ask(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thyracont::tests::{frame, gauge, script};

    #[test]
    fn sensor_pressures_use_source_ids() {
        let mut g = gauge();
        script(&mut g, "0010M100", '1', "M1", "2.5E-2");
        script(&mut g, "0010M200", '1', "M2", "OR");
        script(&mut g, "0010M300", '1', "M3", "UR");
        script(&mut g, "0010M600", '1', "M6", "1013");

        assert_eq!(g.pirani().pressure().unwrap(), 2.5e-2);
        assert_eq!(g.piezo().pressure().unwrap(), f64::INFINITY);
        assert_eq!(g.hot_cathode().pressure().unwrap(), 0.0);
        assert_eq!(g.ambient().pressure().unwrap(), 1013.0);
    }

    #[test]
    fn gas_factor_is_bounded() {
        let mut g = gauge();
        script(&mut g, "0012C1031.5", '3', "C1", "");
        script(&mut g, "0010C100", '1', "C1", "1.5");

        g.pirani().set_gas_factor(1.5).unwrap();
        assert_eq!(g.pirani().gas_factor().unwrap(), 1.5);

        g.adapter_mut().clear_written();
        assert!(matches!(
            g.cold_cathode().set_gas_factor(0.1),
            Err(ScpiError::Validation(_))
        ));
        assert!(matches!(
            g.hot_cathode().set_gas_factor(8.5),
            Err(ScpiError::Validation(_))
        ));
        assert!(g.adapter().written().is_empty());
    }

    #[test]
    fn pirani_statistics() {
        let mut g = gauge();
        script(&mut g, "0010PM011", '1', "PM", "W-5A400");
        let stats = g.pirani().statistics().unwrap();
        assert_eq!(
            stats,
            PiraniStatistics {
                wear_percent: -5,
                hours_since_adjustment: 100.0
            }
        );
        assert_eq!(g.adapter().written(), &[frame("0010PM011")]);
    }

    #[test]
    fn hot_cathode_controls() {
        let mut g = gauge();
        script(&mut g, "0012FC012", '3', "FC", "");
        script(&mut g, "0010FC00", '1', "FC", "2");
        script(&mut g, "0012DG011", '3', "DG", "");
        script(&mut g, "0010DG00", '1', "DG", "1");
        script(&mut g, "0012CC010", '3', "CC", "");
        script(&mut g, "0010CC00", '1', "CC", "0");
        script(&mut g, "0010FN00", '1', "FN", "1");
        script(&mut g, "0010FS00", '1', "FS", "2");
        script(&mut g, "0010PM013", '1', "PM", "40A12");

        let mut hc = g.hot_cathode();
        hc.set_filament_mode(FilamentMode::Filament2).unwrap();
        assert_eq!(hc.filament_mode().unwrap(), FilamentMode::Filament2);
        hc.set_degas(true).unwrap();
        assert!(hc.degas().unwrap());
        hc.set_sensor_enabled(false).unwrap();
        assert!(!hc.sensor_enabled().unwrap());
        assert_eq!(hc.active_filament().unwrap(), 1);
        assert_eq!(hc.filament_status().unwrap(), FilamentStatus::Filament2Defective);
        assert_eq!(hc.statistics().unwrap(), vec![10.0, 3.0]);
    }

    #[test]
    fn out_of_table_replies_are_protocol_errors() {
        let mut g = gauge();
        script(&mut g, "0010FS00", '1', "FS", "7");
        script(&mut g, "0010DG00", '1', "DG", "x");
        assert!(matches!(
            g.hot_cathode().filament_status(),
            Err(ScpiError::Protocol(_))
        ));
        assert!(matches!(g.hot_cathode().degas(), Err(ScpiError::Protocol(_))));
    }
}
