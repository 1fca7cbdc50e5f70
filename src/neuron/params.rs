//! Barrel-cortex parameter tables
//!
//! A table holds one column per fitted parameter set. Rows, in file order:
//!
//! | row | field | unit |
//! |-----|-------|------|
//! | 0 | `g_leak` | µS |
//! | 1 | `g_k` | µS |
//! | 2 | `c_m` | nF |
//! | 3 | `g_na` | µS |
//! | 4 | `k_m` | mV |
//! | 5 | `k_h` | mV |
//! | 6 | `vh_h` | mV |
//!
//! CSV files carry exactly these seven rows, comma separated.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpikeInfoError};

/// Rows in a parameter table
pub const TABLE_ROWS: usize = 7;

/// Barrel-cortex cell class
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellClass {
    /// Excitatory pyramidal cell
    #[default]
    Pyramidal,
    /// Inhibitory interneuron
    Interneuron,
}

impl CellClass {
    /// Parse the short names used on the command line (`pc`, `in`)
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pc" | "pyramidal" => Ok(Self::Pyramidal),
            "in" | "interneuron" => Ok(Self::Interneuron),
            other => Err(SpikeInfoError::invalid(
                "class",
                format!("expected `pc` or `in`, got `{other}`"),
            )),
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Pyramidal => "pc",
            Self::Interneuron => "in",
        }
    }
}

/// One fitted parameter set
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarrelParameters {
    pub g_leak: f64,
    pub g_k: f64,
    pub c_m: f64,
    pub g_na: f64,
    /// Na activation slope (mV)
    pub k_m: f64,
    /// Na inactivation slope (mV)
    pub k_h: f64,
    /// Na inactivation midpoint (mV)
    pub vh_h: f64,
}

const fn set(g_leak: f64, g_k: f64, c_m: f64, g_na: f64, k_m: f64, k_h: f64, vh_h: f64) -> BarrelParameters {
    BarrelParameters {
        g_leak,
        g_k,
        c_m,
        g_na,
        k_m,
        k_h,
        vh_h,
    }
}

const PYRAMIDAL_SETS: [BarrelParameters; 3] = [
    set(0.010, 1.0, 0.20, 10.0, 7.0, 7.0, -45.0),
    set(0.012, 1.2, 0.22, 12.0, 6.5, 6.5, -44.0),
    set(0.008, 0.8, 0.18, 9.0, 7.5, 7.0, -46.0),
];

const INTERNEURON_SETS: [BarrelParameters; 3] = [
    set(0.010, 2.0, 0.10, 15.0, 6.0, 6.0, -42.0),
    set(0.012, 2.4, 0.11, 18.0, 5.5, 6.0, -41.0),
    set(0.009, 1.8, 0.09, 14.0, 6.5, 5.5, -43.0),
];

fn builtin_sets(class: CellClass) -> &'static [BarrelParameters] {
    match class {
        CellClass::Pyramidal => &PYRAMIDAL_SETS,
        CellClass::Interneuron => &INTERNEURON_SETS,
    }
}

impl BarrelParameters {
    /// First built-in set for `class`
    pub fn reference(class: CellClass) -> Self {
        builtin_sets(class)[0]
    }

    fn from_column(rows: &[Vec<f64>], col: usize) -> Self {
        Self {
            g_leak: rows[0][col],
            g_k: rows[1][col],
            c_m: rows[2][col],
            g_na: rows[3][col],
            k_m: rows[4][col],
            k_h: rows[5][col],
            vh_h: rows[6][col],
        }
    }

    /// Na activation midpoint, tied to the slope by the fit
    pub fn vh_m(&self) -> f64 {
        3.583881 * self.k_m - 53.294454
    }

    fn validate(&self, col: usize) -> Result<()> {
        let positive = [
            ("g_leak", self.g_leak),
            ("g_k", self.g_k),
            ("c_m", self.c_m),
            ("g_na", self.g_na),
            ("k_m", self.k_m),
            ("k_h", self.k_h),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpikeInfoError::ParameterTable(format!(
                    "column {col}: {name} must be > 0, got {value}"
                )));
            }
        }
        if !self.vh_h.is_finite() {
            return Err(SpikeInfoError::ParameterTable(format!(
                "column {col}: vh_h is not finite"
            )));
        }
        Ok(())
    }
}

/// Parameter sets for one cell class
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    columns: Vec<BarrelParameters>,
}

impl ParameterTable {
    /// Built-in sets for `class`
    pub fn builtin(class: CellClass) -> Self {
        Self {
            columns: builtin_sets(class).to_vec(),
        }
    }

    /// Parse a seven-row CSV table
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut rows = Vec::with_capacity(TABLE_ROWS);
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row = line
                .split(',')
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|e| {
                        SpikeInfoError::ParameterTable(format!(
                            "line {}: cannot parse `{}`: {e}",
                            line_no + 1,
                            cell.trim()
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        if rows.len() != TABLE_ROWS {
            return Err(SpikeInfoError::ParameterTable(format!(
                "expected {TABLE_ROWS} rows, found {}",
                rows.len()
            )));
        }
        let width = rows[0].len();
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(SpikeInfoError::ParameterTable(format!(
                "row {bad} has {} columns, row 0 has {width}",
                rows[bad].len()
            )));
        }

        let columns = (0..width)
            .map(|c| {
                let params = BarrelParameters::from_column(&rows, c);
                params.validate(c).map(|_| params)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_csv_str(&text)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Parameter set `index`
    pub fn column(&self, index: usize) -> Result<BarrelParameters> {
        self.columns
            .get(index)
            .copied()
            .ok_or(SpikeInfoError::ParameterSetOutOfRange {
                index,
                available: self.columns.len(),
            })
    }
}
