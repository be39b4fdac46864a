use super::adapter::Adapter;
use crate::error::{InstrumentErrorEntry, ScpiError};
use std::collections::{HashMap, VecDeque};

/// In-memory adapter for tests and dry runs.
///
/// A set command (`HEADER arg`) stores `arg` under `HEADER`; a later `HEADER?` replies
/// with it, which mimics the simple get/set controls of most SCPI instruments. Replies
/// can also be scripted per exact query string, and instrument errors can be queued for
/// `SYST:ERR?`. Scripted replies also answer commands without a `?`, as needed by
/// instruments that acknowledge every frame. Every command is recorded in order.
#[derive(Debug, Default, Clone)]
pub struct FakeAdapter {
    written: Vec<String>,
    state: HashMap<String, String>,
    scripted: HashMap<String, VecDeque<String>>,
    errors: VecDeque<InstrumentErrorEntry>,
    pending: VecDeque<String>,
}

fn normalize_header(token: &str) -> &str {
    token.trim_start_matches(':').trim_end_matches(';')
}

fn is_query(command: &str) -> bool {
    let first = command.split_whitespace().next().unwrap_or("");
    normalize_header(first).ends_with('?') || command.trim_end_matches(';').ends_with('?')
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command written so far, including the query strings.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Written commands that are not queries.
    pub fn set_commands(&self) -> Vec<&str> {
        self.written
            .iter()
            .map(String::as_str)
            .filter(|c| !is_query(c))
            .collect()
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Queue `reply` for the next time exactly `query` is written.
    pub fn push_reply(&mut self, query: &str, reply: &str) {
        self.scripted
            .entry(query.trim().to_string())
            .or_default()
            .push_back(reply.to_string());
    }

    /// Preset the value a `header?` query echoes back.
    pub fn set_state(&mut self, header: &str, value: &str) {
        self.state
            .insert(normalize_header(header).to_string(), value.to_string());
    }

    /// Last value written under `header`, if any.
    pub fn state(&self, header: &str) -> Option<&str> {
        self.state.get(normalize_header(header)).map(String::as_str)
    }

    /// Queue an instrument error for the next `SYST:ERR?` drain.
    pub fn push_error(&mut self, code: i32, message: &str) {
        self.errors.push_back(InstrumentErrorEntry {
            code,
            message: message.to_string(),
        });
    }

    fn reply_for(&mut self, command: &str) -> String {
        let first = command.split_whitespace().next().unwrap_or("");
        let header = normalize_header(first).trim_end_matches('?');

        if header.eq_ignore_ascii_case("SYST:ERR") || header.eq_ignore_ascii_case("SYSTEM:ERROR") {
            return match self.errors.pop_front() {
                Some(e) => format!("{},\"{}\"", e.code, e.message),
                None => "0,\"No error\"".to_string(),
            };
        }
        if command.trim_end_matches(';').ends_with("*OPC?") {
            return "1".to_string();
        }
        self.state.get(header).cloned().unwrap_or_default()
    }
}

impl Adapter for FakeAdapter {
    fn write(&mut self, command: &str) -> Result<(), ScpiError> {
        let command = command.trim();
        self.written.push(command.to_string());

        if let Some(reply) = self
            .scripted
            .get_mut(command)
            .and_then(VecDeque::pop_front)
        {
            self.pending.push_back(reply);
        } else if is_query(command) {
            let reply = self.reply_for(command);
            self.pending.push_back(reply);
        } else if let Some((header, arg)) = command.split_once(char::is_whitespace) {
            let arg = arg.trim().trim_end_matches(';').trim_end();
            self.state
                .insert(normalize_header(header).to_string(), arg.to_string());
        } else {
            self.state
                .insert(normalize_header(command).to_string(), String::new());
        }
        Ok(())
    }

    fn read(&mut self) -> Result<String, ScpiError> {
        self.pending
            .pop_front()
            .ok_or_else(|| ScpiError::Protocol("no reply pending".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_query_echoes_argument() {
        let mut fake = FakeAdapter::new();
        fake.write(":PAGE:CHAN:SMU1:MODE V").unwrap();
        assert_eq!(fake.query(":PAGE:CHAN:SMU1:MODE?").unwrap(), "V");
        assert_eq!(fake.query("PAGE:CHAN:SMU1:MODE?").unwrap(), "V");
        assert_eq!(fake.state(":PAGE:CHAN:SMU1:MODE"), Some("V"));
    }

    #[test]
    fn trailing_semicolons_are_ignored() {
        let mut fake = FakeAdapter::new();
        fake.write(":POWER 5 dBm;").unwrap();
        assert_eq!(fake.query(":POWER?;").unwrap(), "5 dBm");
    }

    #[test]
    fn scripted_replies_take_priority_and_drain() {
        let mut fake = FakeAdapter::new();
        fake.push_reply(":DATA? 'IC'", "1,2,3");
        assert_eq!(fake.query_values(":DATA? 'IC'").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(fake.query(":DATA? 'IC'").unwrap(), "");
    }

    #[test]
    fn scripted_replies_answer_plain_commands() {
        let mut fake = FakeAdapter::new();
        fake.push_reply("0010MV00D", "0011MV04100ED");
        assert_eq!(fake.query("0010MV00D").unwrap(), "0011MV04100ED");
        assert_eq!(fake.state("0010MV00D"), None);
    }

    #[test]
    fn error_queue_drains_then_reports_no_error() {
        let mut fake = FakeAdapter::new();
        fake.push_error(-222, "Data out of range");
        assert_eq!(fake.query("SYST:ERR?").unwrap(), "-222,\"Data out of range\"");
        assert_eq!(fake.query("SYST:ERR?").unwrap(), "0,\"No error\"");
    }

    #[test]
    fn operation_complete_defaults_to_one() {
        let mut fake = FakeAdapter::new();
        assert_eq!(fake.query(":PAGE:SCON:MEAS:SING; *OPC?").unwrap(), "1");
        assert_eq!(fake.set_commands().len(), 0);
        assert_eq!(fake.written().len(), 1);
    }

    #[test]
    fn read_without_query_is_a_protocol_error() {
        let mut fake = FakeAdapter::new();
        assert!(matches!(fake.read(), Err(ScpiError::Protocol(_))));
    }
}
