// Recorded potentiostat dataset - cleaning and derived resistance
use super::series::{Channel, Point, Series};
use std::path::PathBuf;

const TIME: &str = "Time(s)";
const VOLTAGE: &str = "Voltage(V)";
const CURRENT: &str = "Current(A)";
const CYCLE: &str = "Cycle";
const STEP: &str = "Step";
const STATUS: &str = "Status";
const IS_VALID: &str = "isValid";
const RESISTANCE: &str = "Resistance(Ohm)";

const INVALID_STATUSES: [&str; 2] = ["Error", "Idle"];
const MEASURING: &str = "Measuring";

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset has no header row")]
    Empty,
    #[error("dataset is missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("line {line}: invalid value in column `{column}`")]
    InvalidValue { line: usize, column: &'static str },
    #[error("path `{}` must be relative and must not leave its directory", .0.display())]
    UnsafePath(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub time: f64,
    pub voltage: f64,
    /// `None` when the instrument reported exactly zero current.
    pub current: Option<f64>,
    pub cycle: String,
    pub step: String,
    pub status: String,
    pub is_valid: bool,
    pub resistance: Option<f64>,
}

impl DatasetRow {
    pub fn is_anomaly(&self) -> bool {
        !self.is_valid || self.status != MEASURING
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanedDataset {
    pub rows: Vec<DatasetRow>,
}

impl CleanedDataset {
    pub fn valid_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_valid).count()
    }

    pub fn anomalies(&self) -> usize {
        self.rows.iter().filter(|r| r.is_anomaly()).count()
    }

    /// Plot series for one channel over `Time(s)`. Rows with no value for
    /// the channel are left out.
    pub fn series(&self, channel: Channel) -> Series {
        self.rows
            .iter()
            .filter_map(|r| {
                let y = match channel {
                    Channel::Voltage => Some(r.voltage),
                    Channel::Current => r.current,
                    Channel::Resistance => r.resistance,
                };
                y.map(|y| Point::new(r.time, y))
            })
            .collect()
    }

    /// Render the cleaned table: the input columns followed by `isValid`
    /// and `Resistance(Ohm)`. Missing values become empty cells.
    pub fn to_csv(&self) -> String {
        let mut out = [TIME, VOLTAGE, CURRENT, CYCLE, STEP, STATUS, IS_VALID, RESISTANCE].join(",");
        out.push('\n');
        for row in &self.rows {
            let cells = [
                float_cell(row.time),
                float_cell(row.voltage),
                optional_cell(row.current),
                row.cycle.clone(),
                row.step.clone(),
                row.status.clone(),
                if row.is_valid { "True" } else { "False" }.to_string(),
                optional_cell(row.resistance),
            ];
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

/// Floats keep a fractional part (`10.0`, not `10`).
fn float_cell(value: f64) -> String {
    format!("{:?}", value)
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(float_cell).unwrap_or_default()
}

struct Columns {
    time: usize,
    voltage: usize,
    current: usize,
    cycle: usize,
    step: usize,
    status: usize,
}

impl Columns {
    fn locate(header: &[&str]) -> Result<Self, DatasetError> {
        let find = |name: &'static str| {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or(DatasetError::MissingColumn(name))
        };
        Ok(Self {
            time: find(TIME)?,
            voltage: find(VOLTAGE)?,
            current: find(CURRENT)?,
            cycle: find(CYCLE)?,
            step: find(STEP)?,
            status: find(STATUS)?,
        })
    }
}

/// Clean a raw recording.
///
/// Rows whose status is `Error` or `Idle` are flagged invalid (not dropped).
/// Resistance is `V / I`; rows with zero current get the next known
/// resistance, or the previous one at the tail of the recording.
pub fn clean(raw: &str) -> Result<CleanedDataset, DatasetError> {
    let mut lines = raw
        .lines()
        .enumerate()
        .map(|(idx, l)| (idx + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (_, header) = lines.next().ok_or(DatasetError::Empty)?;
    let header: Vec<&str> = header.split(',').map(str::trim).collect();
    let columns = Columns::locate(&header)?;

    let mut rows = Vec::new();
    for (line, text) in lines {
        let cells: Vec<&str> = text.split(',').map(str::trim).collect();
        let cell = |idx: usize, column: &'static str| {
            cells
                .get(idx)
                .copied()
                .ok_or(DatasetError::InvalidValue { line, column })
        };
        let number = |idx: usize, column: &'static str| -> Result<f64, DatasetError> {
            cell(idx, column)?
                .parse::<f64>()
                .map_err(|_| DatasetError::InvalidValue { line, column })
        };

        let voltage = number(columns.voltage, VOLTAGE)?;
        let current = Some(number(columns.current, CURRENT)?).filter(|c| *c != 0.0);
        let status = cell(columns.status, STATUS)?.to_string();

        rows.push(DatasetRow {
            time: number(columns.time, TIME)?,
            voltage,
            current,
            cycle: cell(columns.cycle, CYCLE)?.to_string(),
            step: cell(columns.step, STEP)?.to_string(),
            is_valid: !INVALID_STATUSES.contains(&status.as_str()),
            status,
            resistance: current.map(|c| voltage / c),
        });
    }

    fill_resistance(&mut rows);
    Ok(CleanedDataset { rows })
}

fn fill_resistance(rows: &mut [DatasetRow]) {
    let mut next = None;
    for row in rows.iter_mut().rev() {
        match row.resistance {
            Some(r) => next = Some(r),
            None => row.resistance = next,
        }
    }

    let mut prev = None;
    for row in rows.iter_mut() {
        match row.resistance {
            Some(r) => prev = Some(r),
            None => row.resistance = prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Time(s),Voltage(V),Current(A),Cycle,Step,Status
    0.0,0.1,0.01,1,1,Measuring
    0.1,0.2,0.02,1,1,Measuring
    0.2,0.3,0.00,1,1,Error
    0.3,0.4,0.04,1,1,Idle";

    #[test]
    fn test_clean_flags_and_resistance() {
        let dataset = clean(SAMPLE).unwrap();

        assert_eq!(dataset.rows.len(), 4);
        assert!(dataset.rows[0].is_valid);
        assert!(!dataset.rows[2].is_valid);
        assert!(!dataset.rows[3].is_valid);
        assert_eq!(dataset.valid_rows(), 2);
        assert!(dataset.rows.iter().all(|r| r.resistance.is_some()));

        assert_eq!(dataset.rows[2].current, None);
        // Zero current takes the following row's resistance.
        assert_eq!(dataset.rows[2].resistance, dataset.rows[3].resistance);
    }

    #[test]
    fn test_forward_fill_at_the_tail() {
        let raw = "Time(s),Voltage(V),Current(A),Cycle,Step,Status
0.0,1.0,0.5,1,1,Measuring
0.1,1.0,0,1,1,Measuring";
        let dataset = clean(raw).unwrap();

        assert_eq!(dataset.rows[1].resistance, Some(2.0));
    }

    #[test]
    fn test_anomalies() {
        let dataset = clean(SAMPLE).unwrap();
        assert_eq!(dataset.anomalies(), 2);
    }

    #[test]
    fn test_missing_column() {
        let raw = "Time(s),Voltage(V),Cycle,Step,Status\n0.0,0.1,1,1,Measuring";
        assert!(matches!(
            clean(raw),
            Err(DatasetError::MissingColumn("Current(A)"))
        ));
    }

    #[test]
    fn test_invalid_value_reports_line() {
        let raw = "Time(s),Voltage(V),Current(A),Cycle,Step,Status\n0.0,abc,0.1,1,1,Measuring";
        assert!(matches!(
            clean(raw),
            Err(DatasetError::InvalidValue { line: 2, column: "Voltage(V)" })
        ));
    }

    #[test]
    fn test_csv_output_columns() {
        let csv = clean(SAMPLE).unwrap().to_csv();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("Time(s),Voltage(V),Current(A),Cycle,Step,Status,isValid,Resistance(Ohm)")
        );
        assert_eq!(lines.next(), Some("0.0,0.1,0.01,1,1,Measuring,True,10.0"));
        let zero_current = lines.nth(1).unwrap();
        assert!(zero_current.starts_with("0.2,0.3,,1,1,Error,False,"));
    }

    #[test]
    fn test_whole_numbers_keep_a_decimal_point() {
        let raw = "Time(s),Voltage(V),Current(A),Cycle,Step,Status\n1,2,0.5,1,1,Measuring";
        let csv = clean(raw).unwrap().to_csv();

        assert_eq!(csv.lines().nth(1), Some("1.0,2.0,0.5,1,1,Measuring,True,4.0"));
    }

    #[test]
    fn test_series_skip_missing_values() {
        let dataset = clean(SAMPLE).unwrap();
        assert_eq!(dataset.series(Channel::Voltage).len(), 4);
        assert_eq!(dataset.series(Channel::Current).len(), 3);
    }
}
