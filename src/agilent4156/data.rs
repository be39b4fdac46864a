//! Saved variables and measured-data retrieval.

use super::{pause, Agilent4156};
use crate::error::ScpiError;
use crate::scpi::instrument::unquote;
use crate::scpi::Adapter;
use log::{debug, info};
use ndarray::{Array2, ArrayView1};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};

/// Variables the display list can hold.
pub const MAX_DISPLAY_VARIABLES: usize = 8;
/// Extra variables stored alongside the display list.
pub const MAX_EXTRA_VARIABLES: usize = 2;

/// One variable name or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSelection {
    Single(String),
    List(Vec<String>),
}

impl VariableSelection {
    pub fn names(&self) -> &[String] {
        match self {
            VariableSelection::Single(name) => std::slice::from_ref(name),
            VariableSelection::List(names) => names,
        }
    }
}

impl From<&str> for VariableSelection {
    fn from(name: &str) -> Self {
        VariableSelection::Single(name.to_string())
    }
}

impl From<String> for VariableSelection {
    fn from(name: String) -> Self {
        VariableSelection::Single(name)
    }
}

impl From<Vec<String>> for VariableSelection {
    fn from(names: Vec<String>) -> Self {
        VariableSelection::List(names)
    }
}

impl From<Vec<&str>> for VariableSelection {
    fn from(names: Vec<&str>) -> Self {
        VariableSelection::List(names.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for VariableSelection {
    fn from(names: &[&str]) -> Self {
        VariableSelection::List(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for VariableSelection {
    fn from(names: [&str; N]) -> Self {
        VariableSelection::List(names.iter().map(|n| n.to_string()).collect())
    }
}

impl TryFrom<&Value> for VariableSelection {
    type Error = ScpiError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let type_error = || {
            ScpiError::Type(
                "variables must be a string or a list of strings".to_string(),
            )
        };
        match value {
            Value::String(name) => Ok(VariableSelection::Single(name.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(String::from).ok_or_else(type_error))
                .collect::<Result<Vec<_>, _>>()
                .map(VariableSelection::List),
            _ => Err(type_error()),
        }
    }
}

/// Measured values, one column per saved variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredData {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl MeasuredData {
    /// Build a table from per-variable series, which must all have the same length.
    pub fn from_columns(columns: Vec<String>, series: Vec<Vec<f64>>) -> Result<Self, ScpiError> {
        if columns.len() != series.len() {
            return Err(ScpiError::Protocol(format!(
                "{} column names for {} data series",
                columns.len(),
                series.len()
            )));
        }
        let rows = series.first().map_or(0, Vec::len);
        if let Some((name, s)) = columns.iter().zip(&series).find(|(_, s)| s.len() != rows) {
            return Err(ScpiError::Protocol(format!(
                "column '{name}' has {} values, expected {rows}",
                s.len()
            )));
        }
        let values = Array2::from_shape_fn((rows, columns.len()), |(i, j)| series[j][i]);
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(index))
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv_to<W: io::Write>(&self, writer: W) -> Result<(), ScpiError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in self.values.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer
            .flush()
            .map_err(ScpiError::io("flushing CSV output"))
    }

    /// Write the table to `path`, appending `.csv` when the path has another or no
    /// extension. Returns the path actually written.
    pub fn write_csv(&self, path: &Path) -> Result<PathBuf, ScpiError> {
        let path = csv_path(path);
        let file = std::fs::File::create(&path)
            .map_err(ScpiError::io(format!("creating {}", path.display())))?;
        self.write_csv_to(file)?;
        info!("Saved {} rows to {}", self.n_rows(), path.display());
        Ok(path)
    }
}

fn csv_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "csv") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".csv");
        PathBuf::from(name)
    }
}

impl<A: Adapter> Agilent4156<A> {
    /// Put the display in list mode and add variables to the display list.
    ///
    /// # Errors
    /// [`ScpiError::Capacity`] for more than [`MAX_DISPLAY_VARIABLES`] names. The
    /// list-mode command has already been sent at that point.
    ///
    /// ```no_run
    /// # use rusty_scpi::agilent4156::Agilent4156;
    /// # use rusty_scpi::TcpAdapter;
    /// # let mut analyzer = Agilent4156::new(TcpAdapter::new("192.168.1.20", 5025)?);
    /// analyzer.save_display_variables(["IC", "IB", "VC", "VB"])?;
    /// analyzer.save_display_variables("IC")?;
    /// # Ok::<(), rusty_scpi::ScpiError>(())
    /// ```
    pub fn save_display_variables(
        &mut self,
        selection: impl Into<VariableSelection>,
    ) -> Result<(), ScpiError> {
        self.save_variables(selection.into(), "LIST", MAX_DISPLAY_VARIABLES)
    }

    /// Like [`save_display_variables`](Self::save_display_variables) for the extra
    /// variable list, which holds up to [`MAX_EXTRA_VARIABLES`] names.
    pub fn save_extra_variables(
        &mut self,
        selection: impl Into<VariableSelection>,
    ) -> Result<(), ScpiError> {
        self.save_variables(selection.into(), "DVAR", MAX_EXTRA_VARIABLES)
    }

    fn save_variables(
        &mut self,
        selection: VariableSelection,
        list: &str,
        limit: usize,
    ) -> Result<(), ScpiError> {
        self.instrument.write(":PAGE:DISP:MODE LIST")?;
        let names = selection.names();
        if names.len() > limit {
            return Err(ScpiError::Capacity(format!(
                "at most {limit} variables fit in the {list} list, got {}",
                names.len()
            )));
        }
        for name in names {
            self.instrument
                .write(&format!(":PAGE:DISP:{list} '{name}'"))?;
        }
        Ok(())
    }

    /// Names of every saved variable, display list first.
    pub fn get_data_variables(&mut self) -> Result<Vec<String>, ScpiError> {
        let display = self.instrument.ask(":PAGE:DISP:LIST?")?;
        let extra = self.instrument.ask(":PAGE:DISP:DVAR?")?;
        Ok(display
            .split(',')
            .chain(extra.split(','))
            .map(|name| unquote(name).trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Fetch the data of every saved variable, optionally exporting it as CSV.
    ///
    /// A sampling run with an infinite period must be [`stop`](Self::stop)ped first.
    pub fn get_measured_data(&mut self, path: Option<&Path>) -> Result<MeasuredData, ScpiError> {
        if !self.instrument.complete()? {
            return Err(ScpiError::instrument(
                "measurement still running; stop it before reading data",
            ));
        }
        let columns = self.get_data_variables()?;
        self.instrument.write(":FORM:DATA ASC")?;

        let mut series = Vec::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if i > 0 {
                pause(self.timing.fetch_delay);
            }
            let values = self.instrument.values(&format!(":DATA? '{name}'"))?;
            debug!("Fetched {} values for {name}", values.len());
            series.push(values);
        }

        let data = MeasuredData::from_columns(columns, series)?;
        if let Some(path) = path {
            data.write_csv(path)?;
        }
        Ok(data)
    }
}
