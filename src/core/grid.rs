//! Symbol grids and their holographic axis encodings.
//!
//! `Grid` is plain data (what a perception front-end would hand over, or a
//! test fixture). `GridEncoding` is the read-only snapshot the decoding
//! stages consume: every row is `Σ_c column[c] ⊗ symbol[m[r][c]]` and every
//! column is `Σ_r row[r] ⊗ symbol[m[r][c]]`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vector::Vector;
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    Row(usize),
    Column(usize),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `symbols[0]` is the blank; the rest are content symbols.
    pub symbols: Vec<String>,
    /// `matrix[r][c]` indexes into `symbols`.
    pub matrix: Vec<Vec<usize>>,
}

impl Grid {
    pub const BLANK: usize = 0;

    /// The filled 3×3 Latin square over `A`, `B`, `C`.
    pub fn example() -> Self {
        Self {
            rows: labels(&["R1", "R2", "R3"]),
            columns: labels(&["C1", "C2", "C3"]),
            symbols: labels(&["BLANK", "A", "B", "C"]),
            matrix: vec![vec![1, 2, 3], vec![2, 3, 1], vec![3, 1, 2]],
        }
    }

    /// Copy of this grid with cell `(row, col)` emptied.
    pub fn with_blank(mut self, row: usize, col: usize) -> Result<Self> {
        let cell = self
            .matrix
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| Error::InvalidGrid(format!("cell ({row}, {col}) out of range")))?;
        *cell = Self::BLANK;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows.is_empty() || self.columns.is_empty() {
            return Err(Error::InvalidGrid("grid needs at least one row and column".into()));
        }
        if self.symbols.len() < 2 {
            return Err(Error::InvalidGrid("need a blank and at least one content symbol".into()));
        }
        if self.matrix.len() != self.rows.len() {
            return Err(Error::InvalidGrid(format!(
                "matrix has {} rows, expected {}",
                self.matrix.len(),
                self.rows.len()
            )));
        }
        for (r, row) in self.matrix.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(Error::InvalidGrid(format!(
                    "row {r} has {} cells, expected {}",
                    row.len(),
                    self.columns.len()
                )));
            }
            if let Some(&s) = row.iter().find(|&&s| s >= self.symbols.len()) {
                return Err(Error::InvalidGrid(format!("symbol index {s} out of range in row {r}")));
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for label in self.rows.iter().chain(&self.columns).chain(&self.symbols) {
            if !is_identifier(label) {
                return Err(Error::InvalidGrid(format!("label `{label}` is not an identifier")));
            }
            if seen.contains(&label.as_str()) {
                return Err(Error::InvalidGrid(format!("label `{label}` is used twice")));
            }
            seen.push(label);
        }
        Ok(())
    }

    pub fn blank_cells(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (r, row) in self.matrix.iter().enumerate() {
            for (c, &s) in row.iter().enumerate() {
                if s == Self::BLANK {
                    out.push((r, c));
                }
            }
        }
        out
    }

    pub fn symbol_at(&self, row: usize, col: usize) -> Option<&str> {
        let s = *self.matrix.get(row)?.get(col)?;
        self.symbols.get(s).map(String::as_str)
    }

    /// Cleanup key naming one cell, e.g. `R1*C1`. Indices must be in range.
    fn cell_key(&self, row: usize, col: usize) -> String {
        format!("{}*{}", self.rows[row], self.columns[col])
    }

    /// Expression for one axis, e.g. `C1*A + C2*B + C3*C` for a row. Only
    /// called on validated grids with in-range axes.
    fn axis_expression(&self, axis: Axis) -> String {
        let terms: Vec<String> = match axis {
            Axis::Row(r) => self.matrix[r]
                .iter()
                .enumerate()
                .map(|(c, &s)| format!("{}*{}", self.columns[c], self.symbols[s]))
                .collect(),
            Axis::Column(c) => self
                .matrix
                .iter()
                .enumerate()
                .map(|(r, row)| format!("{}*{}", self.rows[r], self.symbols[row[c]]))
                .collect(),
        };
        terms.join(" + ")
    }
}

/// Axis vectors derived from a grid, rebuilt only through `write_cell`.
#[derive(Debug, Clone)]
pub struct GridEncoding {
    grid: Grid,
    row_vectors: Vec<Vector>,
    column_vectors: Vec<Vector>,
}

impl GridEncoding {
    /// Register every label as an atom and every cell as a pair key, then
    /// encode each axis.
    pub fn build(vocab: &mut Vocabulary, grid: Grid) -> Result<Self> {
        grid.validate()?;

        for label in grid.symbols.iter().chain(&grid.rows).chain(&grid.columns) {
            vocab.atom(label);
        }
        for r in 0..grid.rows.len() {
            for c in 0..grid.columns.len() {
                vocab.register_pair(&grid.cell_key(r, c))?;
            }
        }

        let (row_vectors, column_vectors) = encode_axes(vocab, &grid)?;
        Ok(Self {
            grid,
            row_vectors,
            column_vectors,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn dimension(&self) -> usize {
        self.row_vectors.first().map(Vector::dimension).unwrap_or(0)
    }

    /// Rows first, then columns.
    pub fn axes(&self) -> Vec<Axis> {
        (0..self.grid.rows.len())
            .map(Axis::Row)
            .chain((0..self.grid.columns.len()).map(Axis::Column))
            .collect()
    }

    pub fn axis_vector(&self, axis: Axis) -> Result<&Vector> {
        let vector = match axis {
            Axis::Row(r) => self.row_vectors.get(r),
            Axis::Column(c) => self.column_vectors.get(c),
        };
        vector.ok_or_else(|| axis_out_of_range(axis))
    }

    pub fn axis_label(&self, axis: Axis) -> Result<&str> {
        let label = match axis {
            Axis::Row(r) => self.grid.rows.get(r),
            Axis::Column(c) => self.grid.columns.get(c),
        };
        label
            .map(String::as_str)
            .ok_or_else(|| axis_out_of_range(axis))
    }

    pub fn axis_for_label(&self, label: &str) -> Option<Axis> {
        if let Some(r) = self.grid.rows.iter().position(|l| l == label) {
            return Some(Axis::Row(r));
        }
        self.grid
            .columns
            .iter()
            .position(|l| l == label)
            .map(Axis::Column)
    }

    pub fn row_labels(&self) -> &[String] {
        &self.grid.rows
    }

    pub fn column_labels(&self) -> &[String] {
        &self.grid.columns
    }

    pub fn blank_symbol(&self) -> &str {
        &self.grid.symbols[Grid::BLANK]
    }

    pub fn content_symbols(&self) -> &[String] {
        &self.grid.symbols[Grid::BLANK + 1..]
    }

    /// The single update path: write one cell, then rebuild every axis
    /// vector before anything is replaced.
    pub fn write_cell(
        &mut self,
        vocab: &mut Vocabulary,
        row: usize,
        col: usize,
        symbol: usize,
    ) -> Result<()> {
        if symbol >= self.grid.symbols.len() {
            return Err(Error::InvalidGrid(format!("symbol index {symbol} out of range")));
        }
        let mut grid = self.grid.clone();
        let cell = grid
            .matrix
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| Error::InvalidGrid(format!("cell ({row}, {col}) out of range")))?;
        *cell = symbol;

        let (row_vectors, column_vectors) = encode_axes(vocab, &grid)?;
        self.grid = grid;
        self.row_vectors = row_vectors;
        self.column_vectors = column_vectors;
        Ok(())
    }
}

fn encode_axes(vocab: &mut Vocabulary, grid: &Grid) -> Result<(Vec<Vector>, Vec<Vector>)> {
    let rows = (0..grid.rows.len())
        .map(|r| vocab.parse(&grid.axis_expression(Axis::Row(r))))
        .collect::<Result<Vec<_>>>()?;
    let columns = (0..grid.columns.len())
        .map(|c| vocab.parse(&grid.axis_expression(Axis::Column(c))))
        .collect::<Result<Vec<_>>>()?;
    Ok((rows, columns))
}

fn axis_out_of_range(axis: Axis) -> Error {
    Error::InvalidGrid(format!("axis {axis:?} out of range"))
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
