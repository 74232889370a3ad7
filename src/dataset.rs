//! In-memory auxiliary dataset keyed by variable name.
//!
//! The auxiliary dataset is an independently measured (or simulated) table
//! whose rows pair input coordinates with one scalar target, for example
//! perovskite compositions with their DFT mixing enthalpy. Columns are kept
//! in insertion order and all have the same number of rows.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// A column table of auxiliary observations.
///
/// # Examples
///
/// ```
/// use fusion_ei::AuxiliaryDataset;
///
/// let data = AuxiliaryDataset::new()
///     .with_column("CsPbI", vec![1.0, 0.0, 0.5])?
///     .with_column("MAPbI", vec![0.0, 1.0, 0.5])?
///     .with_column("dGmix", vec![-0.02, -0.05, -0.04])?;
///
/// assert_eq!(data.n_rows(), 3);
/// assert_eq!(data.column_names().collect::<Vec<_>>(), ["CsPbI", "MAPbI", "dGmix"]);
/// # Ok::<(), fusion_ei::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDataset"))]
pub struct AuxiliaryDataset {
    columns: Vec<Column>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawDataset {
    columns: Vec<Column>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDataset> for AuxiliaryDataset {
    type Error = Error;

    fn try_from(raw: RawDataset) -> Result<Self> {
        let mut dataset = Self::new();
        for column in raw.columns {
            dataset.push_column(column.name, column.values)?;
        }
        Ok(dataset)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Column {
    name: String,
    values: Vec<f64>,
}

impl AuxiliaryDataset {
    /// Creates an empty dataset (no auxiliary knowledge).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named column.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateColumn` if the name is taken and
    /// `Error::ColumnLengthMismatch` if the column length differs from the
    /// existing row count.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// Appends a named column in place.
    ///
    /// # Errors
    ///
    /// See [`with_column`](Self::with_column).
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|c| c.name == name) {
            return Err(Error::DuplicateColumn(name));
        }
        if let Some(first) = self.columns.first()
            && first.values.len() != values.len()
        {
            return Err(Error::ColumnLengthMismatch {
                name,
                expected: first.values.len(),
                got: values.len(),
            });
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Builds a dataset from row records.
    ///
    /// Each row must provide one value per name in `names`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if a row has the wrong length and
    /// `Error::DuplicateColumn` if `names` repeats a name.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: &[Vec<f64>]) -> Result<Self> {
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            if row.len() != names.len() {
                return Err(Error::DimensionMismatch {
                    expected: names.len(),
                    got: row.len(),
                });
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let mut dataset = Self::new();
        for (name, values) in names.iter().zip(columns) {
            dataset.push_column(name.as_ref(), values)?;
        }
        Ok(dataset)
    }

    /// Returns the number of rows (0 when there are no columns).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Returns `true` if the dataset holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Iterates over column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the values of a column.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingColumn` if no column has that name.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    /// Extracts the `[n, d]` design matrix for the given input variables.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoInputVariables` for an empty variable list,
    /// `Error::MissingColumn` for an unknown name and `Error::NonFiniteData`
    /// if any selected cell is NaN or infinite.
    pub fn design_matrix<S: AsRef<str>>(&self, input_variables: &[S]) -> Result<DMatrix<f64>> {
        if input_variables.is_empty() {
            return Err(Error::NoInputVariables);
        }
        let columns = input_variables
            .iter()
            .map(|name| self.finite_column(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(DMatrix::from_fn(self.n_rows(), columns.len(), |i, j| {
            columns[j][i]
        }))
    }

    /// Extracts the target column as a vector.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingColumn` or `Error::NonFiniteData`.
    pub fn target(&self, target_variable: &str) -> Result<DVector<f64>> {
        let values = self.finite_column(target_variable)?;
        Ok(DVector::from_column_slice(values))
    }

    fn finite_column(&self, name: &str) -> Result<&[f64]> {
        let values = self.column(name)?;
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFiniteData {
                column: name.to_owned(),
                row,
            });
        }
        Ok(values)
    }
}
