#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

use docopt::Docopt;
use serde_derive::Deserialize;
use maze_stream::{
    completion::StreamKind,
    config::VisualizerConfig,
    engine::{reference::ReferenceEngine, SearchAlgorithm},
    errors::*,
    presentation::PresentedCells,
    session::SessionController,
};

const USAGE: &str = "Maze stream

Usage:
    maze_stream -h | --help
    maze_stream [--config=<path>] [--length=<n>] [--width=<n>] [--block=<n>] [--seed=<n>] [--search [--dfs|--bfs]] [--show-every=<ms>]

Options:
    -h --help            Show this screen.
    --config=<path>      YAML settings file. Flags below override it.
    --length=<n>         Cells per grid row.
    --width=<n>          Rows in the grid.
    --block=<n>          Side of each maze room in cells.
    --seed=<n>           Seed for the maze and the endpoint choice.
    --search             Search the maze between the chosen endpoints once it is generated.
    --dfs                Search depth first.
    --bfs                Search breadth first.
    --show-every=<ms>    Redraw the grid at most this often [default: 250].
";

#[derive(Debug, Deserialize)]
struct StreamArgs {
    flag_config: Option<String>,
    flag_length: Option<usize>,
    flag_width: Option<usize>,
    flag_block: Option<usize>,
    flag_seed: Option<u64>,
    flag_search: bool,
    flag_dfs: bool,
    flag_bfs: bool,
    flag_show_every: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(ref e) = run() {
        error!("{}", e);
        for cause in e.iter().skip(1) {
            error!("caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: StreamArgs = Docopt::new(USAGE).and_then(|d| d.deserialize())?;
    let config = settings_from_args(&args)?;
    let algorithm = if args.flag_dfs {
        SearchAlgorithm::Dfs
    } else if args.flag_bfs {
        SearchAlgorithm::Bfs
    } else {
        config.algorithm
    };

    let engine = match config.seed {
        Some(seed) => ReferenceEngine::with_seed(seed),
        None => ReferenceEngine::new(),
    };
    let (length, width, block) = (config.length, config.width, config.block_length);
    let mut session = SessionController::new(Box::new(engine), config, PresentedCells::new());

    session.start_generation(length, width, block)?;
    let redraw = Duration::from_millis(args.flag_show_every.max(1));
    let mut last_drawn = Instant::now();
    let mut searched = false;

    loop {
        let now = Instant::now();
        session.tick(now);
        if now.duration_since(last_drawn) >= redraw {
            draw(&session);
            last_drawn = now;
        }

        if let Some(&(kind, ref message)) = session.presentation().errors().first() {
            bail!("{} stream failed: {}", kind, message);
        }
        if session.is_busy() {
            thread::sleep(Duration::from_millis(1));
            continue;
        }
        if args.flag_search && !searched && session.is_ready_for_search() {
            session.search(algorithm)?;
            searched = true;
            continue;
        }
        break;
    }

    draw(&session);
    println!("{}", session.summary());
    let shown = session.shutdown();
    let (created, removed) = shown.edit_counts();
    info!("{} cell edits presented ({} removals), {} visited cells on screen", created + removed, removed,
          shown.cells(StreamKind::Search).len());
    Ok(())
}

fn settings_from_args(args: &StreamArgs) -> Result<VisualizerConfig> {
    let mut config = match args.flag_config {
        Some(ref path) => VisualizerConfig::load(Path::new(path))?,
        None => VisualizerConfig::default(),
    };
    if let Some(length) = args.flag_length {
        config.set_length(length);
    }
    if let Some(width) = args.flag_width {
        config.set_width(width);
    }
    if let Some(block) = args.flag_block {
        config.block_length = block.max(1);
    }
    if args.flag_seed.is_some() {
        config.seed = args.flag_seed;
    }
    Ok(config)
}

fn draw(session: &SessionController<PresentedCells>) {
    if let Some(dimensions) = session.dimensions() {
        let marks = session.endpoints().map(|e| (e.start, e.end));
        println!("{}", session.presentation().render(dimensions, marks));
    }
}
