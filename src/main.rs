#[path = "experiments/assays.rs"]
mod assays;

use gridmind::config::EngineConfig;
use gridmind::error::{Error, Result};
use gridmind::grid::Grid;
use gridmind::network::Network;
use gridmind::observer::{NetworkAdapter, PipelineSnapshot};

const DT: f64 = 0.1;

#[derive(Debug, Default)]
struct Options {
    config: Option<String>,
    dimension: Option<usize>,
    seed: Option<u64>,
    blanks: Vec<(usize, usize)>,
    steps: Option<usize>,
    apply: bool,
    json: bool,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args
        .first()
        .is_some_and(|a| a == "--help" || a == "-h" || a == "help")
    {
        print_help();
        return;
    }
    let result = if args.first().is_some_and(|a| a == "assays") {
        assays::run()
    } else {
        match parse_options(&args) {
            Ok(opts) => run_demo(opts),
            Err(msg) => {
                eprintln!("{msg}");
                print_help();
                std::process::exit(2);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("gridmind (holographic grid decoder)");
    println!("usage:");
    println!("  cargo run -- [--config path.json] [--dim N] [--seed S] [--blank r,c]... [--steps N] [--apply] [--json]");
    println!("  cargo run -- assays");
    println!("  cargo run -- --help");
}

fn parse_options(args: &[String]) -> core::result::Result<Options, String> {
    let mut opts = Options::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "--config" => opts.config = Some(value("--config")?),
            "--dim" => opts.dimension = Some(parse_num(&value("--dim")?)?),
            "--seed" => opts.seed = Some(parse_num(&value("--seed")?)?),
            "--steps" => opts.steps = Some(parse_num(&value("--steps")?)?),
            "--blank" => {
                let v = value("--blank")?;
                let (r, c) = v
                    .split_once(',')
                    .ok_or_else(|| format!("--blank expects r,c, got `{v}`"))?;
                opts.blanks.push((parse_num(r)?, parse_num(c)?));
            }
            "--apply" => opts.apply = true,
            "--json" => opts.json = true,
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(opts)
}

fn parse_num<T: core::str::FromStr>(s: &str) -> core::result::Result<T, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("not a number: `{s}`"))
}

fn run_demo(opts: Options) -> Result<()> {
    let mut cfg = match &opts.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dim) = opts.dimension {
        cfg = cfg.with_dimension(dim);
    }
    if let Some(seed) = opts.seed {
        cfg = cfg.with_seed(seed);
    }
    cfg.validate().map_err(Error::InvalidConfig)?;

    let blanks = if opts.blanks.is_empty() {
        vec![(0, 0)]
    } else {
        opts.blanks.clone()
    };
    let mut grid = Grid::example();
    for &(r, c) in &blanks {
        grid = grid.with_blank(r, c)?;
    }

    // The first step lands on the start-time gate, the rest produce output.
    let steps = opts.steps.unwrap_or(2).max(1);
    let mut net = Network::standard(cfg, grid)?;
    let t0 = net.config().start_time;
    net.run(t0, DT, steps)?;
    show(&NetworkAdapter::new(&net).snapshot(), opts.json)?;

    if opts.apply {
        match net.apply_motor()? {
            Some((r, c, s)) => {
                println!("applied: cell ({r}, {c}) <- symbol {s}");
                let t = net.time().unwrap_or(t0) + DT;
                net.run(t, DT, steps)?;
                show(&NetworkAdapter::new(&net).snapshot(), opts.json)?;
            }
            None => println!("applied: nothing decoded"),
        }
    }
    Ok(())
}

#[cfg(feature = "serde")]
fn load_config(path: &str) -> Result<EngineConfig> {
    EngineConfig::load(path)
}

#[cfg(not(feature = "serde"))]
fn load_config(_path: &str) -> Result<EngineConfig> {
    Err(Error::InvalidConfig("--config needs the `serde` feature"))
}

fn show(snap: &PipelineSnapshot, json: bool) -> Result<()> {
    if json {
        #[cfg(feature = "serde")]
        {
            println!("{}", serde_json::to_string_pretty(snap)?);
            return Ok(());
        }
        #[cfg(not(feature = "serde"))]
        eprintln!("--json needs the `serde` feature; printing text");
    }

    println!("t={:?} dimension={}", snap.time, snap.dimension);
    for row in &snap.matrix {
        let cells: Vec<String> = row.iter().map(|s| s.to_string()).collect();
        println!("  [{}]", cells.join(" "));
    }
    for (node, report) in &snap.reports {
        println!("{node:<22} {report}");
    }
    match snap.motor.and_then(|m| m.cell_write()) {
        Some((r, c, s)) => println!("decoded: cell ({r}, {c}) should hold symbol {s}"),
        None => println!("decoded: no blank cell"),
    }
    Ok(())
}
