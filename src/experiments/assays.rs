use gridmind::config::EngineConfig;
use gridmind::error::Result;
use gridmind::grid::Grid;
use gridmind::network::Network;
use gridmind::vocab::Vocabulary;

#[derive(Debug, Clone)]
struct AssayReport {
    seeds: u64,
    rows: Vec<DimensionRow>,
}

#[derive(Debug, Clone)]
struct DimensionRow {
    dimension: usize,

    // ~a ⊗ (a ⊗ b) against b, unitary vs plain Gaussian atoms.
    unbind_mean_unitary: f64,
    unbind_min_unitary: f64,
    unbind_mean_plain: f64,
    unbind_min_plain: f64,

    // Fraction of trials where the three bound terms of a row are the top-3 keys.
    cleanup_precision: f64,

    // Fraction of single-blank grids whose cell and symbol decode correctly.
    decode_accuracy: f64,
}

pub fn run() -> Result<()> {
    let seeds = 8u64;
    let mut rows = Vec::new();
    for dimension in [128usize, 256, 512] {
        rows.push(measure(dimension, seeds)?);
    }
    print_report(&AssayReport { seeds, rows });
    Ok(())
}

fn measure(dimension: usize, seeds: u64) -> Result<DimensionRow> {
    let (unbind_mean_unitary, unbind_min_unitary) = unbind_similarity(dimension, seeds, true)?;
    let (unbind_mean_plain, unbind_min_plain) = unbind_similarity(dimension, seeds, false)?;
    Ok(DimensionRow {
        dimension,
        unbind_mean_unitary,
        unbind_min_unitary,
        unbind_mean_plain,
        unbind_min_plain,
        cleanup_precision: cleanup_precision(dimension, seeds)?,
        decode_accuracy: decode_accuracy(dimension, seeds)?,
    })
}

fn config(dimension: usize, seed: u64) -> EngineConfig {
    EngineConfig::default()
        .with_dimension(dimension)
        .with_seed(seed)
}

fn unbind_similarity(dimension: usize, seeds: u64, unitary: bool) -> Result<(f64, f64)> {
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    for seed in 1..=seeds {
        let mut vocab = Vocabulary::new(&config(dimension, seed).with_unitary_atoms(unitary))?;
        let b = vocab.atom("B");
        let q = vocab.parse("~A * (A * B)")?;
        let s = q.dot(&b)?;
        sum += s;
        min = min.min(s);
    }
    Ok((sum / seeds as f64, min))
}

fn cleanup_precision(dimension: usize, seeds: u64) -> Result<f64> {
    let expected = ["A*C1", "B*C2", "C*C3"];
    let mut hits = 0usize;
    for seed in 1..=seeds {
        let mut vocab = Vocabulary::new(&config(dimension, seed))?;
        for key in expected {
            vocab.register_pair(key)?;
        }
        let q = vocab.parse("A*C1 + B*C2 + C*C3")?;
        let mut scored: Vec<(String, f64)> = vocab
            .keys()
            .map(str::to_string)
            .zip(vocab.dot_all(&q)?)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let top: Vec<&str> = scored.iter().take(3).map(|(k, _)| k.as_str()).collect();
        if expected.iter().all(|k| top.contains(k)) {
            hits += 1;
        }
    }
    Ok(hits as f64 / seeds as f64)
}

fn decode_accuracy(dimension: usize, seeds: u64) -> Result<f64> {
    let full = Grid::example();
    let mut correct = 0usize;
    let mut trials = 0usize;
    for seed in 1..=seeds {
        for r in 0..full.rows.len() {
            for c in 0..full.columns.len() {
                let mut net =
                    Network::standard(config(dimension, seed), full.clone().with_blank(r, c)?)?;
                net.step(0.1)?;
                let reading = net.motor_reading().and_then(|m| m.cell_write());
                if reading == Some((r, c, full.matrix[r][c])) {
                    correct += 1;
                }
                trials += 1;
            }
        }
    }
    Ok(correct as f64 / trials as f64)
}

fn print_report(r: &AssayReport) {
    println!("gridmind assays");
    println!("seeds={}", r.seeds);
    for row in &r.rows {
        println!("dimension={}", row.dimension);
        println!(
            "  unbind_unitary mean={:.3} min={:.3}",
            row.unbind_mean_unitary, row.unbind_min_unitary
        );
        println!(
            "  unbind_plain   mean={:.3} min={:.3}",
            row.unbind_mean_plain, row.unbind_min_plain
        );
        println!("  cleanup_precision={:.3}", row.cleanup_precision);
        println!("  decode_accuracy={:.3}", row.decode_accuracy);
    }
}
