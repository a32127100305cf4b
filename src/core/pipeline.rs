//! Decoding stages: from an encoded grid to "which cell is empty and what
//! belongs there".
//!
//! Every stage is a dataflow node. Inputs update the node's own retained
//! state; outputs are recomputed from that state on request for a given `t`.
//! Nodes never read each other's state: values only travel over the edges a
//! scheduler wires up (see `network`).
//!
//! Conventions shared by all stages:
//! - `t <= start_time` emits the zero vector, whatever was retained;
//! - an all-zero input means "no information" and propagates as zero.

use tracing::info;

use crate::error::{Error, Result};
use crate::grid::{Axis, GridEncoding};
use crate::vector::Vector;
use crate::vocab::Vocabulary;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shared, read-mostly state handed to a stage while it emits.
pub struct StageContext<'a> {
    pub vocab: &'a mut Vocabulary,
    pub encoding: &'a GridEncoding,
    pub start_time: f64,
}

impl StageContext<'_> {
    #[inline]
    pub fn gated(&self, t: f64) -> bool {
        t <= self.start_time
    }

    pub fn zero(&self) -> Vector {
        self.vocab.zero()
    }
}

/// Interface between a stage and whatever drives it.
pub trait Node {
    fn name(&self) -> &str;

    /// Names accepted by `accept`.
    fn inputs(&self) -> Vec<String>;

    /// Names accepted by `emit`.
    fn outputs(&self) -> Vec<String>;

    /// Replace the retained value behind one input.
    fn accept(&mut self, input: &str, value: Vector) -> Result<()>;

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector>;

    /// Human-readable diagnostic from the most recent emit, if any.
    fn report(&self) -> Option<String> {
        None
    }

    fn motor_reading(&self) -> Option<MotorReading> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisKind {
    Row,
    Column,
}

impl AxisKind {
    fn orthogonal(self) -> AxisKind {
        match self {
            AxisKind::Row => AxisKind::Column,
            AxisKind::Column => AxisKind::Row,
        }
    }

    fn labels(self, encoding: &GridEncoding) -> &[String] {
        match self {
            AxisKind::Row => encoding.row_labels(),
            AxisKind::Column => encoding.column_labels(),
        }
    }
}

fn retain(node: &str, slot: &mut Vector, value: Vector) -> Result<()> {
    if value.dimension() != slot.dimension() {
        return Err(Error::DimensionMismatch {
            expected: slot.dimension(),
            found: value.dimension(),
        });
    }
    tracing::trace!(node, "input retained");
    *slot = value;
    Ok(())
}

fn port_error(node: &str, port: &str) -> Error {
    Error::Port {
        node: node.to_string(),
        port: port.to_string(),
    }
}

/// Superposition of the inverses of every label of one axis kind.
fn inverse_sum(ctx: &mut StageContext<'_>, kind: AxisKind) -> Result<Vector> {
    let mut acc = ctx.zero();
    for label in kind.labels(ctx.encoding) {
        acc = acc.add(&ctx.vocab.atom(label).inverse())?;
    }
    Ok(acc)
}

// =========================================================================
// Blank detection
// =========================================================================

/// Which positions along one axis hold the blank symbol.
///
/// Output `blank`: the normalized superposition of the labels that cleanup
/// finds in `~BLANK ⊗ axis`, or zero when the axis has no blank.
pub struct BlankDetector {
    name: String,
    axis: Axis,
}

impl BlankDetector {
    pub const OUTPUT: &'static str = "blank";

    pub fn new(name: impl Into<String>, axis: Axis) -> Self {
        Self {
            name: name.into(),
            axis,
        }
    }
}

impl Node for BlankDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, _value: Vector) -> Result<()> {
        Err(port_error(&self.name, input))
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        if ctx.gated(t) {
            return Ok(ctx.zero());
        }
        let blank_inv = ctx.vocab.atom(ctx.encoding.blank_symbol()).inverse();
        let query = blank_inv.bind(ctx.encoding.axis_vector(self.axis)?)?;
        let threshold = ctx.vocab.cleanup_threshold();
        ctx.vocab.recall(&query, threshold)
    }
}

// =========================================================================
// Salience combination
// =========================================================================

/// Combines the per-axis blank directions into the single most implicated cell.
///
/// Inputs are named after the axis labels (`R1` .. `C3`); output `salience`
/// is the bound identity vector of the winning cell key.
pub struct SalienceFinder {
    name: String,
    labels: Vec<String>,
    retained: Vec<Vector>,
    last_cell: Option<(String, f64)>,
}

impl SalienceFinder {
    pub const OUTPUT: &'static str = "salience";

    pub fn new(name: impl Into<String>, encoding: &GridEncoding) -> Self {
        let labels: Vec<String> = encoding
            .row_labels()
            .iter()
            .chain(encoding.column_labels())
            .cloned()
            .collect();
        let retained = vec![Vector::zero(encoding.dimension()); labels.len()];
        Self {
            name: name.into(),
            labels,
            retained,
            last_cell: None,
        }
    }

    /// Winning cell key and its score from the latest emit.
    pub fn last_cell(&self) -> Option<(&str, f64)> {
        self.last_cell.as_ref().map(|(k, s)| (k.as_str(), *s))
    }
}

impl Node for SalienceFinder {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        let i = self
            .labels
            .iter()
            .position(|l| l == input)
            .ok_or_else(|| port_error(&self.name, input))?;
        retain(&self.name, &mut self.retained[i], value)
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        self.last_cell = None;
        if ctx.gated(t) {
            return Ok(ctx.zero());
        }

        let mut evidence = ctx.zero();
        for (label, direction) in self.labels.iter().zip(&self.retained) {
            evidence = evidence.add(&direction.bind(&ctx.vocab.atom(label))?)?;
        }
        if evidence.is_zero() {
            return Ok(ctx.zero());
        }

        let Some((cell, score)) = ctx.vocab.nearest_pair(&evidence)? else {
            return Ok(ctx.zero());
        };
        info!(node = %self.name, cell, score, "strongest salience is cell {cell}");
        let identity = ctx
            .vocab
            .vector(cell)
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(cell.to_string()))?;
        self.last_cell = Some((cell.to_string(), score));
        Ok(identity)
    }

    fn report(&self) -> Option<String> {
        self.last_cell
            .as_ref()
            .map(|(cell, score)| format!("strongest salience is cell {cell} ({score:.3})"))
    }
}

// =========================================================================
// Row / column stripping
// =========================================================================

/// Splits a bound cell identity into its row and column components.
///
/// Output `row` unbinds every column label from the identity; output
/// `column` unbinds every row label.
pub struct AxisStripper {
    name: String,
    identity: Vector,
}

impl AxisStripper {
    pub const INPUT: &'static str = "salience";
    pub const ROW: &'static str = "row";
    pub const COLUMN: &'static str = "column";

    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            identity: Vector::zero(dimension),
        }
    }
}

impl Node for AxisStripper {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![Self::INPUT.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::ROW.to_string(), Self::COLUMN.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        if input != Self::INPUT {
            return Err(port_error(&self.name, input));
        }
        retain(&self.name, &mut self.identity, value)
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        let strip = match output {
            Self::ROW => AxisKind::Column,
            Self::COLUMN => AxisKind::Row,
            _ => return Err(port_error(&self.name, output)),
        };
        if ctx.gated(t) {
            return Ok(ctx.zero());
        }
        inverse_sum(ctx, strip)?.bind(&self.identity)
    }
}

// =========================================================================
// Axis vision
// =========================================================================

/// Looks up the full content vector of the axis an identity vector names.
pub struct AxisVision {
    name: String,
    identifier: Vector,
    last_label: Option<String>,
}

impl AxisVision {
    pub const INPUT: &'static str = "identifier";
    pub const OUTPUT: &'static str = "representation";

    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            identifier: Vector::zero(dimension),
            last_label: None,
        }
    }
}

impl Node for AxisVision {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![Self::INPUT.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        if input != Self::INPUT {
            return Err(port_error(&self.name, input));
        }
        retain(&self.name, &mut self.identifier, value)
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        self.last_label = None;
        if ctx.gated(t) || self.identifier.is_zero() {
            return Ok(ctx.zero());
        }

        let Some((label, _)) = ctx.vocab.nearest_key(&self.identifier)? else {
            return Ok(ctx.zero());
        };
        match ctx.encoding.axis_for_label(label) {
            Some(axis) => {
                self.last_label = Some(label.to_string());
                Ok(ctx.encoding.axis_vector(axis)?.clone())
            }
            None => Ok(ctx.zero()),
        }
    }

    fn report(&self) -> Option<String> {
        self.last_label.as_ref().map(|l| format!("sees axis {l}"))
    }
}

// =========================================================================
// Symbol estimation
// =========================================================================

/// Guesses the symbol missing from one axis: everything possible minus
/// everything seen.
///
/// The content arrives bound to the labels of the other axis kind (a column
/// vector is `Σ_r R_r ⊗ s_r`), so those labels are unbound first.
pub struct SymbolEstimator {
    name: String,
    reads: AxisKind,
    content: Vector,
    last_guess: Option<String>,
}

impl SymbolEstimator {
    pub const INPUT: &'static str = "vision";
    pub const OUTPUT: &'static str = "symbol";

    /// `reads` is the kind of axis whose content this estimator receives.
    pub fn new(name: impl Into<String>, reads: AxisKind, dimension: usize) -> Self {
        Self {
            name: name.into(),
            reads,
            content: Vector::zero(dimension),
            last_guess: None,
        }
    }

    pub fn last_guess(&self) -> Option<&str> {
        self.last_guess.as_deref()
    }

    fn axis_word(&self) -> &'static str {
        match self.reads {
            AxisKind::Row => "row",
            AxisKind::Column => "column",
        }
    }
}

impl Node for SymbolEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![Self::INPUT.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        if input != Self::INPUT {
            return Err(port_error(&self.name, input));
        }
        retain(&self.name, &mut self.content, value)
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        self.last_guess = None;
        if ctx.gated(t) || self.content.is_zero() {
            return Ok(ctx.zero());
        }

        let seen = self
            .content
            .bind(&inverse_sum(ctx, self.reads.orthogonal())?)?;
        let mut possible = ctx.zero();
        for symbol in ctx.encoding.content_symbols() {
            possible = possible.add(&ctx.vocab.atom(symbol))?;
        }
        let residual = possible.sub(&seen)?;

        let Some((guess, score)) = ctx.vocab.nearest_key(&residual)? else {
            return Ok(ctx.zero());
        };
        info!(node = %self.name, symbol = guess, score, "guess by {} is {guess}", self.axis_word());
        let vector = ctx
            .vocab
            .vector(guess)
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(guess.to_string()))?;
        self.last_guess = Some(guess.to_string());
        Ok(vector)
    }

    fn report(&self) -> Option<String> {
        self.last_guess
            .as_ref()
            .map(|g| format!("guess by {} is {g}", self.axis_word()))
    }
}

// =========================================================================
// Arbitration and action
// =========================================================================

/// Picks the larger of the two per-axis guesses (component-wise
/// lexicographic order; ties keep the by-column guess).
pub struct MaxArbiter {
    name: String,
    by_column: Vector,
    by_row: Vector,
}

impl MaxArbiter {
    pub const BY_COLUMN: &'static str = "by_column";
    pub const BY_ROW: &'static str = "by_row";
    pub const OUTPUT: &'static str = "symbol";

    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            by_column: Vector::zero(dimension),
            by_row: Vector::zero(dimension),
        }
    }
}

impl Node for MaxArbiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![Self::BY_COLUMN.to_string(), Self::BY_ROW.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        match input {
            Self::BY_COLUMN => retain(&self.name, &mut self.by_column, value),
            Self::BY_ROW => retain(&self.name, &mut self.by_row, value),
            _ => Err(port_error(&self.name, input)),
        }
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        if ctx.gated(t) {
            return Ok(ctx.zero());
        }
        if self.by_row.lexicographic_cmp(&self.by_column).is_gt() {
            Ok(self.by_row.clone())
        } else {
            Ok(self.by_column.clone())
        }
    }
}

/// Indices decoded by the motor stage; `None` where nothing cleared the
/// cleanup threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorReading {
    pub row: Option<usize>,
    pub column: Option<usize>,
    pub symbol: Option<usize>,
}

impl MotorReading {
    /// `(row, column, symbol)` when all three were decoded.
    pub fn cell_write(&self) -> Option<(usize, usize, usize)> {
        Some((self.row?, self.column?, self.symbol?))
    }
}

/// Terminal sink. Decodes row, column and symbol indices from its inputs and
/// stops there: it never touches the grid. Its `motor` output is always zero.
pub struct Motor {
    name: String,
    row: Vector,
    column: Vector,
    symbol: Vector,
    reading: Option<MotorReading>,
}

impl Motor {
    pub const ROW: &'static str = "row";
    pub const COLUMN: &'static str = "column";
    pub const SYMBOL: &'static str = "symbol";
    pub const OUTPUT: &'static str = "motor";

    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            row: Vector::zero(dimension),
            column: Vector::zero(dimension),
            symbol: Vector::zero(dimension),
            reading: None,
        }
    }

    pub fn reading(&self) -> Option<MotorReading> {
        self.reading
    }
}

/// Index of `v`'s best key within `labels`, if it clears the threshold.
fn decode_label(vocab: &Vocabulary, v: &Vector, labels: &[String]) -> Result<Option<usize>> {
    let Some((key, score)) = vocab.nearest_key(v)? else {
        return Ok(None);
    };
    if score <= vocab.cleanup_threshold() {
        return Ok(None);
    }
    Ok(labels.iter().position(|l| l == key))
}

impl Node for Motor {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![
            Self::ROW.to_string(),
            Self::COLUMN.to_string(),
            Self::SYMBOL.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![Self::OUTPUT.to_string()]
    }

    fn accept(&mut self, input: &str, value: Vector) -> Result<()> {
        match input {
            Self::ROW => retain(&self.name, &mut self.row, value),
            Self::COLUMN => retain(&self.name, &mut self.column, value),
            Self::SYMBOL => retain(&self.name, &mut self.symbol, value),
            _ => Err(port_error(&self.name, input)),
        }
    }

    fn emit(&mut self, output: &str, t: f64, ctx: &mut StageContext<'_>) -> Result<Vector> {
        if output != Self::OUTPUT {
            return Err(port_error(&self.name, output));
        }
        self.reading = None;
        if ctx.gated(t) {
            return Ok(ctx.zero());
        }

        let grid = ctx.encoding.grid();
        self.reading = Some(MotorReading {
            row: decode_label(&*ctx.vocab, &self.row, &grid.rows)?,
            column: decode_label(&*ctx.vocab, &self.column, &grid.columns)?,
            symbol: decode_label(&*ctx.vocab, &self.symbol, &grid.symbols)?,
        });
        Ok(ctx.zero())
    }

    fn report(&self) -> Option<String> {
        let r = self.reading?;
        let idx = |v: Option<usize>| v.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
        Some(format!(
            "row {} column {} symbol {}",
            idx(r.row),
            idx(r.column),
            idx(r.symbol)
        ))
    }

    fn motor_reading(&self) -> Option<MotorReading> {
        self.reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::grid::Grid;

    struct Fixture {
        vocab: Vocabulary,
        enc: GridEncoding,
    }

    impl Fixture {
        fn new(grid: Grid) -> Self {
            let cfg = EngineConfig::default().with_dimension(512).with_seed(7);
            let mut vocab = Vocabulary::new(&cfg).unwrap();
            let enc = GridEncoding::build(&mut vocab, grid).unwrap();
            Self { vocab, enc }
        }

        fn one_blank() -> Self {
            Self::new(Grid::example().with_blank(0, 0).unwrap())
        }

        fn ctx(&mut self) -> StageContext<'_> {
            StageContext {
                vocab: &mut self.vocab,
                encoding: &self.enc,
                start_time: 0.0,
            }
        }

        fn nearest(&self, v: &Vector) -> String {
            self.vocab.nearest_key(v).unwrap().unwrap().0.to_string()
        }

        fn atom(&mut self, name: &str) -> Vector {
            self.vocab.atom(name)
        }
    }

    const T: f64 = 0.1;

    #[test]
    fn full_grid_has_no_blank_directions() {
        let mut f = Fixture::new(Grid::example());
        for axis in f.enc.axes() {
            let mut node = BlankDetector::new("blank", axis);
            let out = node.emit(BlankDetector::OUTPUT, T, &mut f.ctx()).unwrap();
            assert!(out.is_zero(), "{axis:?} reported a blank");
            assert_eq!(out.dimension(), 512);
        }
    }

    #[test]
    fn blank_detector_points_at_the_empty_position() {
        let mut f = Fixture::one_blank();

        let mut r1 = BlankDetector::new("r1", Axis::Row(0));
        let out = r1.emit(BlankDetector::OUTPUT, T, &mut f.ctx()).unwrap();
        assert!(!out.is_zero());
        assert!((out.norm() - 1.0).abs() < 1e-9);
        assert_eq!(f.nearest(&out), "C1");

        let mut c1 = BlankDetector::new("c1", Axis::Column(0));
        let out = c1.emit(BlankDetector::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(f.nearest(&out), "R1");

        for axis in [Axis::Row(1), Axis::Row(2), Axis::Column(1), Axis::Column(2)] {
            let mut node = BlankDetector::new("other", axis);
            assert!(node.emit(BlankDetector::OUTPUT, T, &mut f.ctx()).unwrap().is_zero());
        }
    }

    #[test]
    fn salience_selects_the_cell_both_axes_agree_on() {
        let mut f = Fixture::one_blank();
        let mut node = SalienceFinder::new("salience", &f.enc);
        assert_eq!(node.inputs(), vec!["R1", "R2", "R3", "C1", "C2", "C3"]);

        let c1 = f.atom("C1");
        let r1 = f.atom("R1");
        node.accept("R1", c1).unwrap();
        node.accept("C1", r1).unwrap();

        let out = node.emit(SalienceFinder::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(&out, f.vocab.vector("R1*C1").unwrap());
        assert_eq!(node.last_cell().map(|(c, _)| c), Some("R1*C1"));
        assert!(node.report().unwrap().contains("R1*C1"));
    }

    #[test]
    fn salience_without_evidence_is_zero() {
        let mut f = Fixture::one_blank();
        let mut node = SalienceFinder::new("salience", &f.enc);
        assert!(node.emit(SalienceFinder::OUTPUT, T, &mut f.ctx()).unwrap().is_zero());
        assert!(node.last_cell().is_none());
    }

    #[test]
    fn stripper_separates_row_and_column() {
        let mut f = Fixture::one_blank();
        let mut node = AxisStripper::new("strip", 512);
        let identity = f.vocab.vector("R2*C3").unwrap().clone();
        node.accept(AxisStripper::INPUT, identity).unwrap();

        let row = node.emit(AxisStripper::ROW, T, &mut f.ctx()).unwrap();
        let col = node.emit(AxisStripper::COLUMN, T, &mut f.ctx()).unwrap();
        assert_eq!(f.nearest(&row), "R2");
        assert_eq!(f.nearest(&col), "C3");
    }

    #[test]
    fn vision_returns_the_named_axis_vector() {
        let mut f = Fixture::one_blank();
        let mut node = AxisVision::new("vision", 512);

        let r3 = f.atom("R3");
        node.accept(AxisVision::INPUT, r3).unwrap();
        let out = node.emit(AxisVision::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(&out, f.enc.axis_vector(Axis::Row(2)).unwrap());

        let c2 = f.atom("C2");
        node.accept(AxisVision::INPUT, c2).unwrap();
        let out = node.emit(AxisVision::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(&out, f.enc.axis_vector(Axis::Column(1)).unwrap());
    }

    #[test]
    fn vision_ignores_non_axis_labels() {
        let mut f = Fixture::one_blank();
        let mut node = AxisVision::new("vision", 512);
        let a = f.atom("A");
        node.accept(AxisVision::INPUT, a).unwrap();
        assert!(node.emit(AxisVision::OUTPUT, T, &mut f.ctx()).unwrap().is_zero());
    }

    #[test]
    fn estimators_find_the_missing_symbol() {
        let mut f = Fixture::one_blank();

        let mut by_column = SymbolEstimator::new("by col", AxisKind::Column, 512);
        by_column
            .accept(SymbolEstimator::INPUT, f.enc.axis_vector(Axis::Column(0)).unwrap().clone())
            .unwrap();
        let out = by_column.emit(SymbolEstimator::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(by_column.last_guess(), Some("A"));
        assert_eq!(&out, f.vocab.vector("A").unwrap());

        let mut by_row = SymbolEstimator::new("by row", AxisKind::Row, 512);
        by_row
            .accept(SymbolEstimator::INPUT, f.enc.axis_vector(Axis::Row(0)).unwrap().clone())
            .unwrap();
        by_row.emit(SymbolEstimator::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(by_row.last_guess(), Some("A"));
        assert_eq!(by_row.report().as_deref(), Some("guess by row is A"));
    }

    #[test]
    fn estimator_is_stable_across_repeated_emits() {
        let mut f = Fixture::one_blank();
        let mut node = SymbolEstimator::new("by row", AxisKind::Row, 512);
        node.accept(SymbolEstimator::INPUT, f.enc.axis_vector(Axis::Row(0)).unwrap().clone())
            .unwrap();
        let first = node.emit(SymbolEstimator::OUTPUT, T, &mut f.ctx()).unwrap();
        let second = node.emit(SymbolEstimator::OUTPUT, 2.0 * T, &mut f.ctx()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn max_prefers_the_by_column_guess_on_ties() {
        let mut f = Fixture::one_blank();
        let mut node = MaxArbiter::new("max", 512);
        let a = f.atom("A");
        node.accept(MaxArbiter::BY_COLUMN, a.clone()).unwrap();
        node.accept(MaxArbiter::BY_ROW, a.clone()).unwrap();
        assert_eq!(node.emit(MaxArbiter::OUTPUT, T, &mut f.ctx()).unwrap(), a);

        let mut hi = vec![0.0; 512];
        hi[0] = 1.0;
        let mut lo = vec![0.0; 512];
        lo[0] = -1.0;
        node.accept(MaxArbiter::BY_COLUMN, Vector::from_vec(lo)).unwrap();
        node.accept(MaxArbiter::BY_ROW, Vector::from_vec(hi.clone())).unwrap();
        assert_eq!(
            node.emit(MaxArbiter::OUTPUT, T, &mut f.ctx()).unwrap(),
            Vector::from_vec(hi)
        );
    }

    #[test]
    fn motor_decodes_without_writing() {
        let mut f = Fixture::one_blank();
        let before = f.enc.grid().clone();
        let mut node = Motor::new("motor", 512);
        let (r1, c1, a) = (f.atom("R1"), f.atom("C1"), f.atom("A"));
        node.accept(Motor::ROW, r1).unwrap();
        node.accept(Motor::COLUMN, c1).unwrap();
        node.accept(Motor::SYMBOL, a).unwrap();

        let out = node.emit(Motor::OUTPUT, T, &mut f.ctx()).unwrap();
        assert!(out.is_zero());
        let reading = node.reading().unwrap();
        assert_eq!(reading.cell_write(), Some((0, 0, 1)));
        assert_eq!(node.motor_reading(), Some(reading));
        assert_eq!(f.enc.grid(), &before);
    }

    #[test]
    fn motor_reports_nothing_for_zero_inputs() {
        let mut f = Fixture::one_blank();
        let mut node = Motor::new("motor", 512);
        node.emit(Motor::OUTPUT, T, &mut f.ctx()).unwrap();
        assert_eq!(node.reading(), Some(MotorReading::default()));
        assert_eq!(node.reading().unwrap().cell_write(), None);
    }

    #[test]
    fn every_stage_is_gated_before_start() {
        let mut f = Fixture::one_blank();
        let a = f.atom("A");
        let r1 = f.atom("R1");

        let mut blank = BlankDetector::new("b", Axis::Row(0));
        let mut salience = SalienceFinder::new("s", &f.enc);
        salience.accept("R1", a.clone()).unwrap();
        let mut strip = AxisStripper::new("st", 512);
        strip.accept(AxisStripper::INPUT, a.clone()).unwrap();
        let mut vision = AxisVision::new("v", 512);
        vision.accept(AxisVision::INPUT, r1.clone()).unwrap();
        let mut est = SymbolEstimator::new("e", AxisKind::Row, 512);
        est.accept(SymbolEstimator::INPUT, a.clone()).unwrap();
        let mut max = MaxArbiter::new("m", 512);
        max.accept(MaxArbiter::BY_ROW, a.clone()).unwrap();
        let mut motor = Motor::new("mo", 512);
        motor.accept(Motor::SYMBOL, a).unwrap();

        for t in [0.0, -1.0] {
            let mut ctx = f.ctx();
            let outs = vec![
                blank.emit(BlankDetector::OUTPUT, t, &mut ctx).unwrap(),
                salience.emit(SalienceFinder::OUTPUT, t, &mut ctx).unwrap(),
                strip.emit(AxisStripper::ROW, t, &mut ctx).unwrap(),
                strip.emit(AxisStripper::COLUMN, t, &mut ctx).unwrap(),
                vision.emit(AxisVision::OUTPUT, t, &mut ctx).unwrap(),
                est.emit(SymbolEstimator::OUTPUT, t, &mut ctx).unwrap(),
                max.emit(MaxArbiter::OUTPUT, t, &mut ctx).unwrap(),
                motor.emit(Motor::OUTPUT, t, &mut ctx).unwrap(),
            ];
            for out in outs {
                assert!(out.is_zero());
                assert_eq!(out.dimension(), 512);
            }
            assert!(motor.reading().is_none());
        }
    }

    #[test]
    fn blank_detector_on_a_missing_axis_is_an_error() {
        let mut f = Fixture::one_blank();
        for axis in [Axis::Row(3), Axis::Column(9)] {
            let mut node = BlankDetector::new("b", axis);
            assert!(matches!(
                node.emit(BlankDetector::OUTPUT, T, &mut f.ctx()),
                Err(Error::InvalidGrid(_))
            ));
        }
    }

    #[test]
    fn unknown_ports_and_bad_dimensions_are_errors() {
        let mut f = Fixture::one_blank();
        let mut strip = AxisStripper::new("strip", 512);
        assert!(matches!(
            strip.accept("nope", Vector::zero(512)),
            Err(Error::Port { .. })
        ));
        assert!(matches!(
            strip.accept(AxisStripper::INPUT, Vector::zero(64)),
            Err(Error::DimensionMismatch { expected: 512, found: 64 })
        ));
        assert!(strip.emit("nope", T, &mut f.ctx()).is_err());

        let mut blank = BlankDetector::new("b", Axis::Row(0));
        assert!(blank.accept("anything", Vector::zero(512)).is_err());
    }
}
