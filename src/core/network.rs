//! Reference scheduler for the decoding stages.
//!
//! `Network` owns the vocabulary, the observed grid encoding and a set of
//! boxed [`Node`]s joined by named connections. One `step(t)` visits nodes in
//! topological order, emits every output once and delivers each value to the
//! connected inputs before any downstream node is asked for its own output.
//!
//! Each connection records a propagation delay. The reference scheduler does
//! not model it; it is kept for schedulers that do.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::grid::{Grid, GridEncoding};
use crate::pipeline::{
    AxisKind, AxisStripper, AxisVision, BlankDetector, MaxArbiter, Motor, MotorReading, Node,
    SalienceFinder, StageContext, SymbolEstimator,
};
use crate::vector::Vector;
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from: usize,
    pub origin: String,
    pub to: usize,
    pub input: String,
    /// Advisory propagation delay in seconds.
    pub delay: f64,
}

/// Value produced by one origin during the most recent step.
#[derive(Debug, Clone)]
pub struct OriginValue {
    pub node: usize,
    pub origin: String,
    pub value: Vector,
}

pub struct Network {
    cfg: EngineConfig,
    vocab: Vocabulary,
    encoding: GridEncoding,
    nodes: Vec<Box<dyn Node>>,
    index: HashMap<String, usize>,
    connections: Vec<Connection>,
    order: Option<Vec<usize>>,
    last: Vec<OriginValue>,
    time: Option<f64>,
}

pub const BLANK_CHECKER: &str = "blank checker";
pub const SALIENCY_FINDER: &str = "saliency finder";
pub const STRIPPER: &str = "col and row stripper";
pub const COL_SYMBOLS: &str = "col symbols";
pub const ROW_SYMBOLS: &str = "row symbols";
pub const GUESS_BY_COL: &str = "guess by col";
pub const GUESS_BY_ROW: &str = "guess by row";
pub const FINAL_GUESS: &str = "final guess";
pub const MOTOR: &str = "motor actuator";

impl Network {
    /// An empty network over a freshly encoded grid.
    pub fn new(cfg: EngineConfig, grid: Grid) -> Result<Self> {
        cfg.validate().map_err(Error::InvalidConfig)?;
        let mut vocab = Vocabulary::new(&cfg)?;
        let encoding = GridEncoding::build(&mut vocab, grid)?;
        Ok(Self {
            cfg,
            vocab,
            encoding,
            nodes: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            order: None,
            last: Vec::new(),
            time: None,
        })
    }

    /// The full decoding graph: one blank checker per axis feeding the
    /// saliency finder, through stripping, vision and estimation, to the
    /// final guess and the motor.
    pub fn standard(cfg: EngineConfig, grid: Grid) -> Result<Self> {
        let mut net = Self::new(cfg, grid)?;
        let dim = net.encoding.dimension();

        let axes = net.encoding.axes();
        let labels = axes
            .iter()
            .map(|&a| net.encoding.axis_label(a).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        for (&axis, label) in axes.iter().zip(&labels) {
            let name = format!("{BLANK_CHECKER} {label}");
            net.add_node(Box::new(BlankDetector::new(name, axis)))?;
        }
        let salience = SalienceFinder::new(SALIENCY_FINDER, &net.encoding);
        net.add_node(Box::new(salience))?;
        net.add_node(Box::new(AxisStripper::new(STRIPPER, dim)))?;
        net.add_node(Box::new(AxisVision::new(COL_SYMBOLS, dim)))?;
        net.add_node(Box::new(AxisVision::new(ROW_SYMBOLS, dim)))?;
        net.add_node(Box::new(SymbolEstimator::new(GUESS_BY_COL, AxisKind::Column, dim)))?;
        net.add_node(Box::new(SymbolEstimator::new(GUESS_BY_ROW, AxisKind::Row, dim)))?;
        net.add_node(Box::new(MaxArbiter::new(FINAL_GUESS, dim)))?;
        net.add_node(Box::new(Motor::new(MOTOR, dim)))?;

        for label in &labels {
            let checker = format!("{BLANK_CHECKER} {label}");
            net.connect(&checker, BlankDetector::OUTPUT, SALIENCY_FINDER, label)?;
        }
        net.connect(SALIENCY_FINDER, SalienceFinder::OUTPUT, STRIPPER, AxisStripper::INPUT)?;
        net.connect(STRIPPER, AxisStripper::COLUMN, COL_SYMBOLS, AxisVision::INPUT)?;
        net.connect(STRIPPER, AxisStripper::ROW, ROW_SYMBOLS, AxisVision::INPUT)?;
        net.connect(COL_SYMBOLS, AxisVision::OUTPUT, GUESS_BY_COL, SymbolEstimator::INPUT)?;
        net.connect(ROW_SYMBOLS, AxisVision::OUTPUT, GUESS_BY_ROW, SymbolEstimator::INPUT)?;
        net.connect(GUESS_BY_COL, SymbolEstimator::OUTPUT, FINAL_GUESS, MaxArbiter::BY_COLUMN)?;
        net.connect(GUESS_BY_ROW, SymbolEstimator::OUTPUT, FINAL_GUESS, MaxArbiter::BY_ROW)?;
        net.connect(STRIPPER, AxisStripper::ROW, MOTOR, Motor::ROW)?;
        net.connect(STRIPPER, AxisStripper::COLUMN, MOTOR, Motor::COLUMN)?;
        net.connect(FINAL_GUESS, MaxArbiter::OUTPUT, MOTOR, Motor::SYMBOL)?;

        info!(
            nodes = net.nodes.len(),
            connections = net.connections.len(),
            dimension = dim,
            "decoding network ready"
        );
        Ok(net)
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) -> Result<usize> {
        let name = node.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateNode(name));
        }
        let id = self.nodes.len();
        self.index.insert(name, id);
        self.nodes.push(node);
        self.order = None;
        Ok(id)
    }

    /// Wire `from.origin` into `to.input`, with the configured delay.
    pub fn connect(&mut self, from: &str, origin: &str, to: &str, input: &str) -> Result<()> {
        let from_id = self.node_id(from)?;
        let to_id = self.node_id(to)?;
        if !self.nodes[from_id].outputs().iter().any(|o| o == origin) {
            return Err(Error::Port {
                node: from.to_string(),
                port: origin.to_string(),
            });
        }
        if !self.nodes[to_id].inputs().iter().any(|i| i == input) {
            return Err(Error::Port {
                node: to.to_string(),
                port: input.to_string(),
            });
        }

        let delay = self.cfg.connection_delay;
        debug!(from, origin, to, input, delay, "connect");
        self.connections.push(Connection {
            from: from_id,
            origin: origin.to_string(),
            to: to_id,
            input: input.to_string(),
            delay,
        });
        self.order = None;
        Ok(())
    }

    pub fn node_id(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownNode(name.to_string()))
    }

    pub fn node(&self, name: &str) -> Option<&dyn Node> {
        self.index.get(name).map(|&i| self.nodes[i].as_ref())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &dyn Node> + '_ {
        self.nodes.iter().map(|n| n.as_ref())
    }

    pub fn node_name(&self, id: usize) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Evaluation order: Kahn's algorithm, ties broken by insertion order.
    pub fn order(&mut self) -> Result<Vec<usize>> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }

        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for c in &self.connections {
            indegree[c.to] += 1;
        }
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for c in self.connections.iter().filter(|c| c.from == i) {
                indegree[c.to] -= 1;
                if indegree[c.to] == 0 {
                    ready.push_back(c.to);
                }
            }
        }
        if order.len() != n {
            return Err(Error::Cycle);
        }

        self.order = Some(order.clone());
        Ok(order)
    }

    /// Evaluate every node once at time `t`.
    pub fn step(&mut self, t: f64) -> Result<()> {
        let order = self.order()?;
        self.last.clear();

        for i in order {
            for origin in self.nodes[i].outputs() {
                let value = {
                    let mut ctx = StageContext {
                        vocab: &mut self.vocab,
                        encoding: &self.encoding,
                        start_time: self.cfg.start_time,
                    };
                    self.nodes[i].emit(&origin, t, &mut ctx)?
                };
                for c in self
                    .connections
                    .iter()
                    .filter(|c| c.from == i && c.origin == origin)
                {
                    self.nodes[c.to].accept(&c.input, value.clone())?;
                }
                self.last.push(OriginValue {
                    node: i,
                    origin,
                    value,
                });
            }
        }

        self.time = Some(t);
        Ok(())
    }

    /// `steps` timesteps starting at `t0`, `dt` apart.
    pub fn run(&mut self, t0: f64, dt: f64, steps: usize) -> Result<()> {
        for k in 0..steps {
            self.step(t0 + dt * k as f64)?;
        }
        Ok(())
    }

    /// Write one cell and re-encode the grid. Stage state is left as is; the
    /// next step sees the new encoding.
    pub fn write_cell(&mut self, row: usize, col: usize, symbol: usize) -> Result<()> {
        self.encoding.write_cell(&mut self.vocab, row, col, symbol)?;
        info!(row, col, symbol, "cell written");
        Ok(())
    }

    /// Feed the motor's latest decode back into the grid, if complete.
    pub fn apply_motor(&mut self) -> Result<Option<(usize, usize, usize)>> {
        let Some((row, col, symbol)) = self.motor_reading().and_then(|r| r.cell_write()) else {
            return Ok(None);
        };
        self.write_cell(row, col, symbol)?;
        Ok(Some((row, col, symbol)))
    }

    pub fn motor_reading(&self) -> Option<MotorReading> {
        self.nodes.iter().find_map(|n| n.motor_reading())
    }

    pub fn last_values(&self) -> &[OriginValue] {
        &self.last
    }

    pub fn last_value(&self, node: &str, origin: &str) -> Option<&Vector> {
        let id = *self.index.get(node)?;
        self.last
            .iter()
            .find(|v| v.node == id && v.origin == origin)
            .map(|v| &v.value)
    }

    /// Time of the most recent step.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn encoding(&self) -> &GridEncoding {
        &self.encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default().with_dimension(512).with_seed(7)
    }

    fn decoded(net: &Network, node: &str, origin: &str) -> String {
        let v = net.last_value(node, origin).unwrap();
        net.vocab().nearest_key(v).unwrap().unwrap().0.to_string()
    }

    #[test]
    fn standard_graph_is_wired_in_dependency_order() {
        let mut net = Network::standard(cfg(), Grid::example()).unwrap();
        assert_eq!(net.nodes().count(), 14);
        assert_eq!(net.connections().len(), 16);
        assert!(net.connections().iter().all(|c| c.delay == 0.01));

        let order = net.order().unwrap();
        let pos = |name: &str| {
            let id = net.node_id(name).unwrap();
            order.iter().position(|&i| i == id).unwrap()
        };
        assert!(pos("blank checker R1") < pos(SALIENCY_FINDER));
        assert!(pos(SALIENCY_FINDER) < pos(STRIPPER));
        assert!(pos(COL_SYMBOLS) < pos(GUESS_BY_COL));
        assert!(pos(GUESS_BY_ROW) < pos(FINAL_GUESS));
        assert_eq!(order.last().copied(), Some(net.node_id(MOTOR).unwrap()));
    }

    #[test]
    fn nothing_is_emitted_before_start() {
        let blank = Grid::example().with_blank(0, 0).unwrap();
        let mut net = Network::standard(cfg(), blank).unwrap();
        net.step(0.0).unwrap();
        assert!(net.last_values().iter().all(|v| v.value.is_zero()));
        assert!(net.motor_reading().is_none());
        assert_eq!(net.time(), Some(0.0));
    }

    #[test]
    fn full_grid_propagates_zero() {
        let mut net = Network::standard(cfg(), Grid::example()).unwrap();
        net.run(0.0, 0.1, 3).unwrap();
        for v in net.last_values() {
            assert!(v.value.is_zero(), "{} {}", net.node_name(v.node).unwrap(), v.origin);
        }
        assert_eq!(net.motor_reading(), Some(MotorReading::default()));
        assert_eq!(net.apply_motor().unwrap(), None);
    }

    #[test]
    fn one_blank_decodes_cell_and_symbol() {
        let blank = Grid::example().with_blank(0, 0).unwrap();
        let mut net = Network::standard(cfg(), blank).unwrap();
        net.step(0.1).unwrap();

        assert_eq!(decoded(&net, "blank checker R1", BlankDetector::OUTPUT), "C1");
        assert_eq!(decoded(&net, "blank checker C1", BlankDetector::OUTPUT), "R1");
        assert!(net
            .last_value("blank checker R2", BlankDetector::OUTPUT)
            .unwrap()
            .is_zero());
        assert_eq!(decoded(&net, SALIENCY_FINDER, SalienceFinder::OUTPUT), "R1*C1");
        assert_eq!(decoded(&net, GUESS_BY_COL, SymbolEstimator::OUTPUT), "A");
        assert_eq!(decoded(&net, GUESS_BY_ROW, SymbolEstimator::OUTPUT), "A");
        assert_eq!(decoded(&net, FINAL_GUESS, MaxArbiter::OUTPUT), "A");

        let reading = net.motor_reading().unwrap();
        assert_eq!(reading.cell_write(), Some((0, 0, 1)));
        assert_eq!(net.encoding().grid().blank_cells(), vec![(0, 0)]);
    }

    #[test]
    fn centre_blank_decodes_to_c() {
        let blank = Grid::example().with_blank(1, 1).unwrap();
        let mut net = Network::standard(cfg(), blank).unwrap();
        net.step(0.1).unwrap();
        assert_eq!(decoded(&net, SALIENCY_FINDER, SalienceFinder::OUTPUT), "R2*C2");
        assert_eq!(net.motor_reading().unwrap().cell_write(), Some((1, 1, 3)));
    }

    #[test]
    fn applying_the_motor_fills_the_blank() {
        let blank = Grid::example().with_blank(0, 0).unwrap();
        let mut net = Network::standard(cfg(), blank).unwrap();
        net.step(0.1).unwrap();
        assert_eq!(net.apply_motor().unwrap(), Some((0, 0, 1)));
        assert_eq!(net.encoding().grid(), &Grid::example());

        net.step(0.2).unwrap();
        assert_eq!(net.motor_reading(), Some(MotorReading::default()));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut net = Network::new(cfg(), Grid::example()).unwrap();
        net.add_node(Box::new(AxisVision::new("a", 512))).unwrap();
        net.add_node(Box::new(AxisVision::new("b", 512))).unwrap();
        net.connect("a", AxisVision::OUTPUT, "b", AxisVision::INPUT).unwrap();
        net.connect("b", AxisVision::OUTPUT, "a", AxisVision::INPUT).unwrap();
        assert!(matches!(net.order(), Err(Error::Cycle)));
        assert!(matches!(net.step(0.1), Err(Error::Cycle)));
    }

    #[test]
    fn wiring_errors() {
        let mut net = Network::new(cfg(), Grid::example()).unwrap();
        net.add_node(Box::new(AxisVision::new("a", 512))).unwrap();
        assert!(matches!(
            net.add_node(Box::new(AxisVision::new("a", 512))),
            Err(Error::DuplicateNode(_))
        ));
        assert!(matches!(
            net.connect("a", AxisVision::OUTPUT, "missing", "x"),
            Err(Error::UnknownNode(_))
        ));
        net.add_node(Box::new(Motor::new("m", 512))).unwrap();
        assert!(matches!(
            net.connect("a", "nope", "m", Motor::ROW),
            Err(Error::Port { .. })
        ));
        assert!(matches!(
            net.connect("a", AxisVision::OUTPUT, "m", "nope"),
            Err(Error::Port { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = EngineConfig::default().with_dimension(4);
        assert!(matches!(
            Network::standard(bad, Grid::example()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
