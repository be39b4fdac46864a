//! Sweep variables VAR1, VAR2 and VARD.
//!
//! A sweep variable has no hardware of its own: it is sourced by whichever SMU or VSU
//! currently has the matching channel function. Its legal ranges therefore follow the
//! mode of that owning channel, which the analyzer resolves through its role table.

use super::channels::ChannelHandle;
use super::types::{ChannelSlot, Function, Mode, ScpiToken, Spacing, SweepRole};
use super::Agilent4156;
use crate::error::ScpiError;
use crate::scpi::instrument::parse_number;
use crate::scpi::Adapter;
use crate::validators::{valid_compliance_range, valid_value_range, Range};
use log::debug;
use std::collections::BTreeMap;

const MAX_VAR2_POINTS: u32 = 127;

/// Locally known channel functions of the sweep-source slots.
#[derive(Debug, Default)]
pub(crate) struct RoleTable {
    assignments: BTreeMap<ChannelSlot, Function>,
    synced: bool,
}

impl RoleTable {
    pub(crate) fn assign(&mut self, slot: ChannelSlot, function: Function) {
        if ChannelSlot::SWEEP_SOURCES.contains(&slot) {
            self.assignments.insert(slot, function);
        }
    }

    pub(crate) fn clear_slot(&mut self, slot: ChannelSlot) {
        self.assignments.remove(&slot);
    }

    fn owners(&self, role: SweepRole) -> Vec<ChannelSlot> {
        self.assignments
            .iter()
            .filter(|(_, function)| **function == role.function())
            .map(|(slot, _)| *slot)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SweepField {
    Start,
    Stop,
    Step,
    Compliance,
    Offset,
}

impl SweepField {
    fn header(self) -> &'static str {
        match self {
            SweepField::Start => "STAR",
            SweepField::Stop => "STOP",
            SweepField::Step => "STEP",
            SweepField::Compliance => "COMP",
            SweepField::Offset => "OFFSET",
        }
    }

    fn range(self, mode: Mode) -> Result<Range, ScpiError> {
        let mode = Some(mode);
        Ok(match self {
            SweepField::Start | SweepField::Stop => valid_value_range(mode)?,
            SweepField::Step | SweepField::Offset => valid_value_range(mode)?.scaled(2.0),
            SweepField::Compliance => valid_compliance_range(mode)?.scaled(2.0),
        })
    }
}

impl<A: Adapter> Agilent4156<A> {
    /// Re-read the function of every sweep-source channel from the instrument.
    ///
    /// The table is otherwise synchronized once, on the first sweep lookup, and then
    /// kept current by [`set_function`](super::FunctionBearing::set_function) and
    /// channel resets. Call this after changing channel functions from the front panel.
    pub fn refresh_role_assignments(&mut self) -> Result<(), ScpiError> {
        let mut table = RoleTable::default();
        for slot in ChannelSlot::SWEEP_SOURCES {
            let function = match self
                .instrument
                .ask_checked(&format!(":PAGE:CHAN:{slot}:FUNC?"))
            {
                Ok(reply) => Function::from_scpi(&reply).ok(),
                Err(ScpiError::Instrument(_)) => None,
                Err(e) => return Err(e),
            };
            match function {
                Some(function) => table.assign(slot, function),
                None => debug!("{slot} has no channel function"),
            }
        }
        table.synced = true;
        debug!("Sweep roles: {:?}", table.assignments);
        self.roles = table;
        Ok(())
    }

    /// The single channel currently sourcing `role`.
    pub(crate) fn sweep_owner(&mut self, role: SweepRole) -> Result<ChannelSlot, ScpiError> {
        if !self.roles.synced {
            self.refresh_role_assignments()?;
        }
        match self.roles.owners(role).as_slice() {
            [owner] => Ok(*owner),
            [] => Err(ScpiError::Lookup(format!(
                "no channel is configured as {role}"
            ))),
            owners => Err(ScpiError::Precondition(format!(
                "{role} is claimed by several channels: {}",
                owners
                    .iter()
                    .map(|s| s.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    pub(crate) fn sweep_mode(&mut self, role: SweepRole) -> Result<Mode, ScpiError> {
        let owner = self.sweep_owner(role)?;
        self.channel_mode(owner)
    }

    pub(crate) fn sweep_value(&mut self, role: SweepRole, field: SweepField) -> Result<f64, ScpiError> {
        let reply = self
            .instrument
            .ask_checked(&format!(":PAGE:MEAS:{role}:{}?", field.header()))?;
        parse_number(&reply)
    }

    pub(crate) fn set_sweep_value(
        &mut self,
        role: SweepRole,
        field: SweepField,
        value: f64,
    ) -> Result<(), ScpiError> {
        let mode = self.sweep_mode(role)?;
        let value = field
            .range(mode)?
            .check(value, &format!("{role} {}", field.header()))?;
        self.instrument
            .write_checked(&format!(":PAGE:MEAS:{role}:{} {value}", field.header()))
    }
}

/// Sweep variable whose limits follow its owning channel.
pub trait SweepRanged<A: Adapter>: ChannelHandle<A> {
    fn role(&self) -> SweepRole;

    /// Mode of the channel that sources this variable.
    ///
    /// # Errors
    /// [`ScpiError::Lookup`] if no channel has the matching function and
    /// [`ScpiError::Precondition`] if more than one does.
    fn current_mode(&mut self) -> Result<Mode, ScpiError> {
        let role = self.role();
        self.analyzer().sweep_mode(role)
    }

    fn compliance(&mut self) -> Result<f64, ScpiError> {
        let role = self.role();
        self.analyzer().sweep_value(role, SweepField::Compliance)
    }

    /// Sweep compliance, limited to twice the owner's compliance range.
    fn set_compliance(&mut self, value: f64) -> Result<(), ScpiError> {
        let role = self.role();
        self.analyzer()
            .set_sweep_value(role, SweepField::Compliance, value)
    }
}

/// Sweep with explicit start, stop and step values.
pub trait SteppedSweep<A: Adapter>: SweepRanged<A> {
    fn start(&mut self) -> Result<f64, ScpiError> {
        let role = self.role();
        self.analyzer().sweep_value(role, SweepField::Start)
    }

    fn set_start(&mut self, value: f64) -> Result<(), ScpiError> {
        let role = self.role();
        self.analyzer().set_sweep_value(role, SweepField::Start, value)
    }

    fn stop(&mut self) -> Result<f64, ScpiError> {
        let role = self.role();
        self.analyzer().sweep_value(role, SweepField::Stop)
    }

    fn set_stop(&mut self, value: f64) -> Result<(), ScpiError> {
        let role = self.role();
        self.analyzer().set_sweep_value(role, SweepField::Stop, value)
    }

    fn step(&mut self) -> Result<f64, ScpiError> {
        let role = self.role();
        self.analyzer().sweep_value(role, SweepField::Step)
    }

    fn set_step(&mut self, value: f64) -> Result<(), ScpiError> {
        let role = self.role();
        self.analyzer().set_sweep_value(role, SweepField::Step, value)
    }
}

macro_rules! sweep_handle {
    ($($(#[$meta:meta])* $name:ident => $role:expr),*) => {
        $(
            $(#[$meta])*
            pub struct $name<'a, A: Adapter> {
                analyzer: &'a mut Agilent4156<A>,
            }

            impl<'a, A: Adapter> $name<'a, A> {
                pub(crate) fn new(analyzer: &'a mut Agilent4156<A>) -> Self {
                    Self { analyzer }
                }
            }

            impl<A: Adapter> ChannelHandle<A> for $name<'_, A> {
                fn slot(&self) -> ChannelSlot {
                    $role.slot()
                }

                fn analyzer(&mut self) -> &mut Agilent4156<A> {
                    self.analyzer
                }
            }

            impl<A: Adapter> SweepRanged<A> for $name<'_, A> {
                fn role(&self) -> SweepRole {
                    $role
                }
            }
        )*
    };
}

sweep_handle!(
    /// Primary sweep.
    Var1 => SweepRole::Var1,
    /// Secondary sweep, stepped once per primary sweep.
    Var2 => SweepRole::Var2,
    /// Linked sweep following `VAR1 * ratio + offset`.
    Vard => SweepRole::Vard
);

impl<A: Adapter> SteppedSweep<A> for Var1<'_, A> {}
impl<A: Adapter> SteppedSweep<A> for Var2<'_, A> {}

impl<A: Adapter> Var1<'_, A> {
    /// Step spacing of the primary sweep.
    ///
    /// # Errors
    /// Returns `ScpiError` if the query fails or the reply is not one of `LIN`,
    /// `L10`, `L25` or `L50`.
    pub fn spacing(&mut self) -> Result<Spacing, ScpiError> {
        let reply = self.analyzer.instrument.ask_checked(":PAGE:MEAS:VAR1:SPAC?")?;
        Spacing::from_scpi(&reply)
    }

    pub fn set_spacing(&mut self, spacing: Spacing) -> Result<(), ScpiError> {
        self.analyzer
            .instrument
            .write_checked(&format!(":PAGE:MEAS:VAR1:SPAC {}", spacing.as_scpi()))
    }
}

impl<A: Adapter> Var2<'_, A> {
    pub fn points(&mut self) -> Result<u32, ScpiError> {
        let reply = self.analyzer.instrument.ask_checked(":PAGE:MEAS:VAR2:POINTS?")?;
        Ok(parse_number(&reply)? as u32)
    }

    /// Number of secondary sweep steps, 1 to 127.
    pub fn set_points(&mut self, points: u32) -> Result<(), ScpiError> {
        if !(1..=MAX_VAR2_POINTS).contains(&points) {
            return Err(ScpiError::Validation(format!(
                "VAR2 points {points} not in 1..={MAX_VAR2_POINTS}"
            )));
        }
        self.analyzer
            .instrument
            .write_checked(&format!(":PAGE:MEAS:VAR2:POINTS {points}"))
    }
}

impl<A: Adapter> Vard<'_, A> {
    pub fn offset(&mut self) -> Result<f64, ScpiError> {
        self.analyzer.sweep_value(SweepRole::Vard, SweepField::Offset)
    }

    /// Offset added to the scaled primary sweep, limited to twice the owner's value
    /// range.
    pub fn set_offset(&mut self, offset: f64) -> Result<(), ScpiError> {
        self.analyzer
            .set_sweep_value(SweepRole::Vard, SweepField::Offset, offset)
    }

    pub fn ratio(&mut self) -> Result<f64, ScpiError> {
        let reply = self.analyzer.instrument.ask_checked(":PAGE:MEAS:VARD:RATIO?")?;
        parse_number(&reply)
    }

    pub fn set_ratio(&mut self, ratio: f64) -> Result<(), ScpiError> {
        if !ratio.is_finite() {
            return Err(ScpiError::Validation(format!("VARD ratio {ratio} is not finite")));
        }
        self.analyzer
            .instrument
            .write_checked(&format!(":PAGE:MEAS:VARD:RATIO {ratio}"))
    }
}
