//! Dataset and detection-result rows
//!
//! Both file kinds share the first 16 columns; detection files append the
//! dDCA interim values and the resulting fault context. Column positions
//! are authoritative, the header line is always skipped.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Writer};

use crate::{HarnessError, Result};

/// Number of columns in a dataset (or fault signature) file.
pub const SENSOR_COLUMNS: usize = 16;
/// Number of columns in a detection result file.
pub const DETECTION_COLUMNS: usize = 20;

/// Names of the eight self-diagnostic fault indicators, in column order.
pub const INDICATOR_NAMES: [&str; 8] = [
    "x_nt", "x_vs", "x_bat", "x_art", "x_rst", "x_ic", "x_adc", "x_usart",
];

const SENSOR_HEADER: [&str; SENSOR_COLUMNS] = [
    "snid",
    "timestamp [UNIX]",
    "sntime",
    "T_air [°C]",
    "T_soil [°C]",
    "H_air [%RH]",
    "H_soil [%RH]",
    "x_nt",
    "x_vs",
    "x_bat",
    "x_art",
    "x_rst",
    "x_ic",
    "x_adc",
    "x_usart",
    "fault",
];

const DETECTION_EXTRA_HEADER: [&str; 4] = ["antigen", "danger", "safe", "fault label"];

/// Round to two decimals, the resolution every stored value is kept at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Use-case readings of the agricultural sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    /// Air temperature [°C]
    pub t_air: f64,
    /// Soil temperature [°C]
    pub t_soil: f64,
    /// Air relative humidity [%RH]
    pub h_air: f64,
    /// Soil relative humidity [%RH]
    pub h_soil: f64,
}

impl Readings {
    pub fn new(t_air: f64, t_soil: f64, h_air: f64, h_soil: f64) -> Self {
        Self {
            t_air,
            t_soil,
            h_air,
            h_soil,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.t_air, self.t_soil, self.h_air, self.h_soil]
    }

    /// Component-wise addition, rounded back to two decimals.
    pub fn offset_by(&self, delta: &Readings) -> Readings {
        Readings {
            t_air: round2(self.t_air + delta.t_air),
            t_soil: round2(self.t_soil + delta.t_soil),
            h_air: round2(self.h_air + delta.h_air),
            h_soil: round2(self.h_soil + delta.h_soil),
        }
    }
}

/// One row of a recorded (or fault-injected) dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub snid: String,
    pub timestamp: i64,
    pub sntime: i64,
    pub readings: Readings,
    pub indicators: [f64; 8],
    /// Ground-truth fault label (0 normal, 1 faulty)
    pub label: u8,
}

/// A dataset row extended with the detector output.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub sensor: SensorRecord,
    pub antigen: String,
    pub danger: f64,
    pub safe: f64,
    /// Detected fault context (0 normal, 1 faulty)
    pub context: u8,
}

struct RowParser<'a> {
    path: &'a Path,
    line: usize,
    row: &'a StringRecord,
}

impl<'a> RowParser<'a> {
    fn new(path: &'a Path, row: &'a StringRecord) -> Self {
        let line = row.position().map(|p| p.line() as usize).unwrap_or(0);
        Self { path, line, row }
    }

    fn error(&self, column: usize, message: impl Into<String>) -> HarnessError {
        HarnessError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            column,
            message: message.into(),
        }
    }

    fn require(&self, columns: usize) -> Result<()> {
        if self.row.len() < columns {
            return Err(self.error(
                self.row.len(),
                format!("expected {columns} columns, found {}", self.row.len()),
            ));
        }
        Ok(())
    }

    fn text(&self, column: usize) -> Result<&'a str> {
        self.row
            .get(column)
            .map(str::trim)
            .ok_or_else(|| self.error(column, "missing field"))
    }

    fn int(&self, column: usize) -> Result<i64> {
        let raw = self.text(column)?;
        raw.parse::<i64>()
            .map_err(|e| self.error(column, format!("invalid integer '{raw}': {e}")))
    }

    fn flag(&self, column: usize) -> Result<u8> {
        let raw = self.text(column)?;
        raw.parse::<u8>()
            .map_err(|e| self.error(column, format!("invalid flag '{raw}': {e}")))
    }

    fn real(&self, column: usize) -> Result<f64> {
        let raw = self.text(column)?;
        let value = raw
            .parse::<f64>()
            .map_err(|e| self.error(column, format!("invalid number '{raw}': {e}")))?;
        if !value.is_finite() {
            return Err(self.error(column, format!("non-finite number '{raw}'")));
        }
        Ok(round2(value))
    }

    fn readings(&self) -> Result<Readings> {
        Ok(Readings::new(
            self.real(3)?,
            self.real(4)?,
            self.real(5)?,
            self.real(6)?,
        ))
    }

    fn indicators(&self) -> Result<[f64; 8]> {
        let mut out = [0.0; 8];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.real(7 + i)?;
        }
        Ok(out)
    }

    fn sensor(&self) -> Result<SensorRecord> {
        self.require(SENSOR_COLUMNS)?;
        Ok(SensorRecord {
            snid: self.text(0)?.to_string(),
            timestamp: self.int(1)?,
            sntime: self.int(2)?,
            readings: self.readings()?,
            indicators: self.indicators()?,
            label: self.flag(15)?,
        })
    }

    fn detection(&self) -> Result<DetectionRecord> {
        self.require(DETECTION_COLUMNS)?;
        Ok(DetectionRecord {
            sensor: self.sensor()?,
            antigen: self.text(16)?.to_string(),
            danger: self.real(17)?,
            safe: self.real(18)?,
            context: self.flag(19)?,
        })
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    Ok(reader)
}

/// Read a dataset file. Extra trailing columns are ignored.
pub fn read_sensor_records(path: &Path) -> Result<Vec<SensorRecord>> {
    let mut reader = open_reader(path)?;
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(RowParser::new(path, &row).sensor()?);
    }
    Ok(rows)
}

/// Read a detection result file.
pub fn read_detection_records(path: &Path) -> Result<Vec<DetectionRecord>> {
    let mut reader = open_reader(path)?;
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(RowParser::new(path, &row).detection()?);
    }
    Ok(rows)
}

/// Count the columns of the header line, used to tell dataset files from
/// detection result files.
pub fn sniff_columns(path: &Path) -> Result<usize> {
    let mut reader = open_reader(path)?;
    Ok(reader.headers()?.len())
}

/// Format a stored value the way the recorded datasets spell them
/// (`21.0`, `0.35`).
pub fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn sensor_fields(row: &SensorRecord) -> Vec<String> {
    let mut fields = Vec::with_capacity(DETECTION_COLUMNS);
    fields.push(row.snid.clone());
    fields.push(row.timestamp.to_string());
    fields.push(row.sntime.to_string());
    fields.extend(row.readings.as_array().iter().map(|v| fmt_value(*v)));
    fields.extend(row.indicators.iter().map(|v| fmt_value(*v)));
    fields.push(row.label.to_string());
    fields
}

pub(crate) fn create_writer(path: &Path) -> Result<Writer<fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(Writer::from_path(path)?)
}

pub fn write_sensor_records(path: &Path, rows: &[SensorRecord]) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(SENSOR_HEADER)?;
    for row in rows {
        writer.write_record(sensor_fields(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_detection_records(path: &Path, rows: &[DetectionRecord]) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(SENSOR_HEADER.iter().chain(DETECTION_EXTRA_HEADER.iter()))?;
    for row in rows {
        let mut fields = sensor_fields(&row.sensor);
        fields.push(row.antigen.clone());
        fields.push(fmt_value(row.danger));
        fields.push(fmt_value(row.safe));
        fields.push(row.context.to_string());
        writer.write_record(fields)?;
    }
    writer.flush()?;
    Ok(())
}
