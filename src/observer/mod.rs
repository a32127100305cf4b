use crate::network::Network;
use crate::pipeline::MotorReading;

#[cfg(feature = "serde")]
use serde::Serialize;

/// A read-only snapshot of what the decoding network produced in its last step.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is on-demand and can allocate; `step` stays unchanged.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PipelineSnapshot {
    pub time: Option<f64>,
    pub dimension: usize,
    pub matrix: Vec<Vec<usize>>,
    pub origins: Vec<OriginSnapshot>,
    pub reports: Vec<(String, String)>,
    pub motor: Option<MotorReading>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OriginSnapshot {
    pub node: String,
    pub origin: String,
    /// Nearest vocabulary key, `None` for a zero value.
    pub nearest: Option<String>,
    pub similarity: f64,
    pub norm: f64,
}

pub struct NetworkAdapter<'a> {
    net: &'a Network,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(net: &'a Network) -> Self {
        Self { net }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let vocab = self.net.vocab();
        let origins = self
            .net
            .last_values()
            .iter()
            .map(|v| {
                let best = if v.value.is_zero() {
                    None
                } else {
                    vocab.nearest_key(&v.value).ok().flatten()
                };
                OriginSnapshot {
                    node: self.net.node_name(v.node).unwrap_or_default().to_string(),
                    origin: v.origin.clone(),
                    nearest: best.map(|(k, _)| k.to_string()),
                    similarity: best.map(|(_, s)| s).unwrap_or(0.0),
                    norm: v.value.norm(),
                }
            })
            .collect();

        let reports = self
            .net
            .nodes()
            .filter_map(|n| Some((n.name().to_string(), n.report()?)))
            .collect();

        PipelineSnapshot {
            time: self.net.time(),
            dimension: vocab.dimension(),
            matrix: self.net.encoding().grid().matrix.clone(),
            origins,
            reports,
            motor: self.net.motor_reading(),
        }
    }
}

impl PipelineSnapshot {
    pub fn origin(&self, node: &str, origin: &str) -> Option<&OriginSnapshot> {
        self.origins
            .iter()
            .find(|o| o.node == node && o.origin == origin)
    }

    pub fn report(&self, node: &str) -> Option<&str> {
        self.reports
            .iter()
            .find(|(n, _)| n == node)
            .map(|(_, r)| r.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::grid::Grid;
    use crate::network::{FINAL_GUESS, GUESS_BY_COL, SALIENCY_FINDER};

    fn network() -> Network {
        let cfg = EngineConfig::default().with_dimension(512).with_seed(7);
        Network::standard(cfg, Grid::example().with_blank(0, 0).unwrap()).unwrap()
    }

    #[test]
    fn snapshot_before_any_step_is_empty() {
        let net = network();
        let snap = NetworkAdapter::new(&net).snapshot();
        assert_eq!(snap.time, None);
        assert!(snap.origins.is_empty());
        assert!(snap.reports.is_empty());
        assert_eq!(snap.motor, None);
        assert_eq!(snap.matrix[0][0], Grid::BLANK);
    }

    #[test]
    fn snapshot_decodes_last_step() {
        let mut net = network();
        net.step(0.1).unwrap();
        let snap = NetworkAdapter::new(&net).snapshot();

        assert_eq!(snap.time, Some(0.1));
        assert_eq!(snap.dimension, 512);
        let fin = snap.origin(FINAL_GUESS, "symbol").unwrap();
        assert_eq!(fin.nearest.as_deref(), Some("A"));
        assert!(fin.similarity > 0.9);

        let zero = snap.origin("blank checker R2", "blank").unwrap();
        assert_eq!(zero.nearest, None);
        assert_eq!(zero.norm, 0.0);

        assert!(snap.report(SALIENCY_FINDER).unwrap().contains("R1*C1"));
        assert_eq!(snap.report(GUESS_BY_COL), Some("guess by column is A"));
        assert_eq!(snap.motor.and_then(|m| m.cell_write()), Some((0, 0, 1)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_to_json() {
        let mut net = network();
        net.step(0.1).unwrap();
        let snap = NetworkAdapter::new(&net).snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["motor"]["symbol"], 1);
        assert!(json["origins"].as_array().unwrap().len() >= 14);
    }
}
