use super::adapter::Adapter;
use crate::error::{InstrumentErrorEntry, ScpiError};
use log::{debug, info, warn};

/// Upper bound on `SYST:ERR?` reads per drain, in case an instrument never reports an
/// empty queue.
const MAX_ERROR_DRAIN: usize = 32;

/// A named SCPI instrument on top of an [`Adapter`].
///
/// This adds the IEEE 488.2 common commands and the error-queue drain to the raw
/// transport. Drivers compose it rather than talking to the adapter directly.
pub struct ScpiInstrument<A: Adapter> {
    adapter: A,
    name: String,
    shut_down: bool,
}

impl<A: Adapter> ScpiInstrument<A> {
    pub fn new(adapter: A, name: impl Into<String>) -> Self {
        Self {
            adapter,
            name: name.into(),
            shut_down: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    pub fn write(&mut self, command: &str) -> Result<(), ScpiError> {
        debug!("[{}] -> {}", self.name, command);
        self.adapter.write(command)
    }

    pub fn ask(&mut self, command: &str) -> Result<String, ScpiError> {
        debug!("[{}] -> {}", self.name, command);
        let reply = self.adapter.query(command)?;
        debug!("[{}] <- {}", self.name, reply);
        Ok(reply.trim().to_string())
    }

    pub fn values(&mut self, command: &str) -> Result<Vec<f64>, ScpiError> {
        debug!("[{}] -> {}", self.name, command);
        let values = self.adapter.query_values(command)?;
        debug!("[{}] <- {} values", self.name, values.len());
        Ok(values)
    }

    /// Ask and parse a single number.
    pub fn ask_f64(&mut self, command: &str) -> Result<f64, ScpiError> {
        let reply = self.ask(command)?;
        parse_number(&reply)
    }

    /// Drain the instrument error queue and return every entry found.
    pub fn check_errors(&mut self) -> Result<Vec<InstrumentErrorEntry>, ScpiError> {
        let mut entries = Vec::new();
        for _ in 0..MAX_ERROR_DRAIN {
            let reply = self.ask("SYST:ERR?")?;
            let entry = parse_error_entry(&reply)?;
            if entry.code == 0 {
                return Ok(entries);
            }
            warn!("[{}] instrument error {}", self.name, entry);
            entries.push(entry);
        }
        warn!(
            "[{}] error queue not empty after {} reads",
            self.name, MAX_ERROR_DRAIN
        );
        Ok(entries)
    }

    /// Fail with [`ScpiError::Instrument`] if the error queue holds anything.
    pub fn ensure_no_errors(&mut self) -> Result<(), ScpiError> {
        let entries = self.check_errors()?;
        if entries.is_empty() {
            Ok(())
        } else {
            Err(ScpiError::Instrument(entries))
        }
    }

    /// Write a command, then surface any error it left in the queue.
    pub fn write_checked(&mut self, command: &str) -> Result<(), ScpiError> {
        self.write(command)?;
        self.ensure_no_errors()
    }

    /// Ask a query, then surface any error it left in the queue.
    pub fn ask_checked(&mut self, command: &str) -> Result<String, ScpiError> {
        let reply = self.ask(command)?;
        self.ensure_no_errors()?;
        Ok(reply)
    }

    pub fn id(&mut self) -> Result<String, ScpiError> {
        self.ask("*IDN?")
    }

    pub fn clear(&mut self) -> Result<(), ScpiError> {
        self.write("*CLS")
    }

    pub fn reset(&mut self) -> Result<(), ScpiError> {
        self.write("*RST")
    }

    /// `true` once all pending operations have finished (`*OPC?`).
    pub fn complete(&mut self) -> Result<bool, ScpiError> {
        let reply = self.ask("*OPC?")?;
        Ok(parse_number(&reply)? as i64 == 1)
    }

    pub fn status(&mut self) -> Result<u8, ScpiError> {
        let reply = self.ask("*STB?")?;
        reply
            .parse::<u8>()
            .map_err(|_| ScpiError::Protocol(format!("invalid status byte '{reply}'")))
    }

    pub fn options(&mut self) -> Result<Vec<String>, ScpiError> {
        let reply = self.ask("*OPT?")?;
        Ok(reply
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    /// Mark the instrument as shut down. Drivers put hardware into a safe state first.
    pub fn shutdown(&mut self) {
        info!("Shutting down {}", self.name);
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

pub(crate) fn parse_number(reply: &str) -> Result<f64, ScpiError> {
    let token = reply.split_whitespace().next().unwrap_or("");
    token
        .parse::<f64>()
        .map_err(|_| ScpiError::Protocol(format!("cannot parse '{reply}' as a number")))
}

/// Strip one layer of single or double quotes around an instrument string.
pub(crate) fn unquote(reply: &str) -> &str {
    let trimmed = reply.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = trimmed.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    trimmed
}

fn parse_error_entry(reply: &str) -> Result<InstrumentErrorEntry, ScpiError> {
    let (code, message) = reply.split_once(',').unwrap_or((reply, ""));
    let code = code
        .trim()
        .parse::<i32>()
        .map_err(|_| ScpiError::Protocol(format!("invalid error queue entry '{reply}'")))?;
    Ok(InstrumentErrorEntry {
        code,
        message: unquote(message).to_string(),
    })
}
