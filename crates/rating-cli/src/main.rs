mod config;
mod report;

use anyhow::{bail, Context};
use clap::Parser;
use config::{AnchorEntry, RatingFileConfig};
use rating_core::solver::{DEFAULT_DRAW_RATE, DEFAULT_WHITE_ADVANTAGE};
use rating_core::{
    rate, Anchor, Game, Parameter, Prior, PriorSet, RatingConfig, RatingInput, RelativePrior, Scale, Simulation,
    SimulationConfig, Strategy, DEFAULT_RETRY_LIMIT, DEFAULT_SEED,
};
use rating_pgn::{read_anchors, read_csv_games, read_pgn, read_priors, read_relative_priors, write_pgn, Names, Synonyms};
use report::ReportView;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chess-rating")]
#[command(about = "Rates competitors on an Elo-style scale from game results")]
struct Cli {
    /// PGN files with the games to rate
    #[arg(short, long, value_name = "FILE", num_args = 1..)]
    pgn: Vec<PathBuf>,
    /// CSV file of games: white, black, result
    #[arg(long, value_name = "FILE")]
    csv_games: Option<PathBuf>,
    /// Rating of the pool average, or of the anchor given with --anchor
    #[arg(short, long)]
    average: Option<f64>,
    /// Rating points for a 76% expected score
    #[arg(short = 'z', long)]
    scale: Option<f64>,
    /// Competitor fixed at the --average rating
    #[arg(short = 'A', long, value_name = "NAME")]
    anchor: Option<String>,
    /// CSV file of competitors held at fixed ratings: name, rating
    #[arg(short = 'm', long, value_name = "FILE", conflicts_with = "anchor")]
    anchors_file: Option<PathBuf>,
    /// CSV file of rating priors: name, rating, sigma
    #[arg(short = 'y', long, value_name = "FILE")]
    priors_file: Option<PathBuf>,
    /// CSV file of relative priors: name_a, name_b, delta, sigma
    #[arg(short = 'r', long, value_name = "FILE")]
    relative_priors_file: Option<PathBuf>,
    /// Fixed white advantage in rating points
    #[arg(short = 'w', long)]
    white_advantage: Option<f64>,
    /// Fit the white advantage from the games
    #[arg(short = 'W', long, conflicts_with = "white_advantage")]
    fit_white_advantage: bool,
    /// Fixed draw rate between equal opponents, in [0, 1]
    #[arg(short = 'd', long)]
    draw_rate: Option<f64>,
    /// Fit the draw rate from the games
    #[arg(short = 'D', long, conflicts_with = "draw_rate")]
    fit_draw_rate: bool,
    /// Use the Bayesian solver
    #[arg(short, long)]
    bayesian: bool,
    /// Number of simulations used to estimate errors
    #[arg(short, long)]
    simulations: Option<usize>,
    /// Worker threads for the simulations
    #[arg(short = 'n', long)]
    threads: Option<usize>,
    /// Seed of the simulation random streams
    #[arg(long)]
    seed: Option<u64>,
    /// Confidence of the reported errors, in percent
    #[arg(short = 'F', long)]
    confidence: Option<f64>,
    /// Report errors relative to the pool average instead of the anchor
    #[arg(short = 'V', long)]
    errors_relative_to_average: bool,
    /// Text report destination (stdout by default)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// CSV report destination
    #[arg(short, long, value_name = "FILE")]
    csv: Option<PathBuf>,
    /// JSON report destination
    #[arg(short, long, value_name = "FILE")]
    json: Option<PathBuf>,
    /// Head-to-head error matrix destination (needs --simulations)
    #[arg(short = 'e', long, value_name = "FILE")]
    head_to_head: Option<PathBuf>,
    /// Connectivity groups destination
    #[arg(short, long, value_name = "FILE")]
    groups: Option<PathBuf>,
    /// Rate even when the results split into separate groups
    #[arg(short = 'G', long)]
    allow_disconnected: bool,
    /// CSV file of name aliases: main name, alias, alias...
    #[arg(long, value_name = "FILE")]
    synonyms: Option<PathBuf>,
    /// Directory to save every simulated game set as PGN
    #[arg(long, value_name = "DIR")]
    save_simulated: Option<PathBuf>,
    /// Configuration file (rating.toml by default)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Log solver details
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Command-line value when either was given, else the file's.
fn merged(cli: (Option<f64>, bool), file: (Option<f64>, bool)) -> (Option<f64>, bool) {
    if cli.0.is_some() || cli.1 {
        cli
    } else {
        file
    }
}

fn read_games(cli: &Cli) -> anyhow::Result<(Names, Vec<Game>)> {
    if cli.pgn.is_empty() && cli.csv_games.is_none() {
        bail!("No input files, pass --pgn or --csv-games");
    }
    let synonyms = match &cli.synonyms {
        Some(path) => Synonyms::read(open(path)?).with_context(|| format!("Failed to read {}", path.display()))?,
        None => Synonyms::default(),
    };
    let mut names = Names::with_synonyms(synonyms);
    let mut games = Vec::new();
    for path in &cli.pgn {
        let read = read_pgn(open(path)?, &mut names).with_context(|| format!("Failed to read {}", path.display()))?;
        info!(file = %path.display(), games = read.len(), "games loaded");
        games.extend(read);
    }
    if let Some(path) = &cli.csv_games {
        let read =
            read_csv_games(open(path)?, &mut names).with_context(|| format!("Failed to read {}", path.display()))?;
        info!(file = %path.display(), games = read.len(), "games loaded");
        games.extend(read);
    }
    Ok((names, games))
}

fn find(names: &Names, name: &str) -> anyhow::Result<usize> {
    names
        .find(name)
        .with_context(|| format!("\"{name}\" does not appear in the games"))
}

fn build_priors(cli: &Cli, file: &RatingFileConfig, names: &Names) -> anyhow::Result<PriorSet> {
    let mut priors = PriorSet {
        absolute: vec![None; names.len()],
        white_advantage: file.white_advantage_prior.map(|p| Prior::new(p.value, p.sigma)),
        draw_rate: file.draw_rate_prior.map(|p| Prior::new(p.value, p.sigma)),
        ..PriorSet::default()
    };

    for entry in &file.priors {
        priors.absolute[find(names, &entry.name)?] = Some(Prior::new(entry.rating, entry.sigma));
    }
    if let Some(path) = &cli.priors_file {
        let read = read_priors(open(path)?, names).with_context(|| format!("Failed to read {}", path.display()))?;
        for (id, prior) in read {
            priors.absolute[id] = Some(prior);
        }
    }

    for entry in &file.relative_priors {
        priors.relative.push(RelativePrior {
            a: find(names, &entry.name_a)?,
            b: find(names, &entry.name_b)?,
            delta: entry.delta,
            sigma: entry.sigma,
        });
    }
    if let Some(path) = &cli.relative_priors_file {
        let read =
            read_relative_priors(open(path)?, names).with_context(|| format!("Failed to read {}", path.display()))?;
        priors.relative.extend(read);
    }
    Ok(priors)
}

fn anchor_list(names: &Names, entries: &[AnchorEntry]) -> anyhow::Result<Vec<(usize, f64)>> {
    entries.iter().map(|e| Ok((find(names, &e.name)?, e.rating))).collect()
}

fn build_anchor(cli: &Cli, file: &RatingFileConfig, names: &Names) -> anyhow::Result<Anchor> {
    let average = cli.average.unwrap_or(file.average);
    if let Some(path) = &cli.anchors_file {
        let list = read_anchors(open(path)?, names).with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Anchor::Multiple(list));
    }
    if let Some(name) = &cli.anchor {
        return Ok(Anchor::Single {
            player: find(names, name)?,
            rating: average,
        });
    }
    if !file.anchors.is_empty() {
        return Ok(Anchor::Multiple(anchor_list(names, &file.anchors)?));
    }
    if let Some(entry) = &file.anchor {
        return Ok(Anchor::Single {
            player: find(names, &entry.name)?,
            rating: cli.average.unwrap_or(entry.rating),
        });
    }
    Ok(Anchor::Average(average))
}

fn has_priors(priors: &PriorSet) -> bool {
    priors.has_absolute()
        || !priors.relative.is_empty()
        || priors.white_advantage.is_some()
        || priors.draw_rate.is_some()
}

fn rating_config(cli: &Cli, file: &RatingFileConfig, anchor: Anchor, priors: &PriorSet) -> anyhow::Result<RatingConfig> {
    let (wa, fit_wa) = merged(
        (cli.white_advantage, cli.fit_white_advantage),
        (file.white_advantage, file.fit_white_advantage),
    );
    let (dr, fit_dr) = merged((cli.draw_rate, cli.fit_draw_rate), (file.draw_rate, file.fit_draw_rate));

    let mut strategy = if cli.bayesian || file.bayesian {
        Strategy::Bayesian
    } else {
        Strategy::LeastSquares
    };
    if strategy == Strategy::LeastSquares && has_priors(priors) {
        info!("priors given, switching to the Bayesian solver");
        strategy = Strategy::Bayesian;
    }

    Ok(RatingConfig {
        anchor,
        scale: Scale::from_points_at_76(cli.scale.unwrap_or(file.scale)),
        white_advantage: Parameter::from_flags("white advantage", wa, fit_wa, DEFAULT_WHITE_ADVANTAGE)?,
        draw_rate: Parameter::from_flags("draw rate", dr, fit_dr, DEFAULT_DRAW_RATE)?,
        strategy,
        confidence: cli.confidence.unwrap_or(file.confidence),
        allow_disconnected: cli.allow_disconnected || file.allow_disconnected,
    })
}

fn simulation_config(cli: &Cli, file: &RatingFileConfig) -> SimulationConfig {
    SimulationConfig {
        rounds: cli.simulations.unwrap_or(file.simulations),
        threads: cli.threads.unwrap_or(file.threads),
        seed: cli.seed.or(file.seed).unwrap_or(DEFAULT_SEED),
        retry_limit: DEFAULT_RETRY_LIMIT,
        errors_relative_to_average: cli.errors_relative_to_average || file.errors_relative_to_average,
    }
}

fn save_simulated(dir: &Path, round: usize, names: &Names, games: &[Game]) -> anyhow::Result<()> {
    let path = dir.join(format!("simulated_{:04}.pgn", round + 1));
    write_pgn(create(&path)?, &format!("Simulation {}", round + 1), names, games)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let file = RatingFileConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let (names, games) = read_games(cli)?;
    info!(games = games.len(), competitors = names.len(), "inputs read");

    let priors = build_priors(cli, &file, &names)?;
    let anchor = build_anchor(cli, &file, &names)?;
    let config = rating_config(cli, &file, anchor, &priors)?;
    let input = RatingInput {
        games: &games,
        competitors: names.len(),
        priors: &priors,
        config: &config,
    };
    let rated = rate(&input).context("Rating failed")?;

    let sim = simulation_config(cli, &file);
    let summary = if sim.rounds > 0 {
        if let Some(dir) = &cli.save_simulated {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let simulation = Simulation::new(input, &rated, sim);
        Some(simulation.run_with_observer(|round, set| {
            if let Some(dir) = &cli.save_simulated {
                if let Err(e) = save_simulated(dir, round, &names, set) {
                    warn!("{e:#}");
                }
            }
        }))
    } else {
        None
    };

    let view = ReportView {
        names: &names,
        report: &rated,
        summary: summary.as_ref(),
        confidence: config.confidence,
    };
    let written = match &cli.output {
        Some(path) => report::write_text(create(path)?, &view),
        None => report::write_text(std::io::stdout().lock(), &view),
    };
    written.context("Failed to write the rating table")?;
    if let Some(path) = &cli.csv {
        report::write_csv(create(path)?, &view).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = &cli.json {
        report::write_json(create(path)?, &view).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = &cli.head_to_head {
        match &summary {
            Some(s) => report::write_head_to_head(create(path)?, &view, s)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => warn!("head-to-head errors need --simulations, skipping {}", path.display()),
        }
    }
    if let Some(path) = &cli.groups {
        report::write_groups(create(path)?, &names, &rated.connectivity)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    run(&cli)
}
