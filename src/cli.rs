use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Args, Parser, Subcommand};
use detective_rs::pages::page_titles;
use detective_rs::{
    BundledData, Dataset, DifficultySettings, GameMode, PageScope, Round, Scoreboard,
    SearchConfig, SearchIndex, SearchPage, build_round, choose_thumbnail,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::{debug, warn};

use crate::logging::{Verbosity, init_subscriber};

#[derive(Parser, Debug)]
#[command(
    name = "detective-rs",
    about = "Play and inspect the Diving Detective quiz",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Log engine decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the bundled datasets.
    Datasets,
    /// Build a single round and show it with the answer.
    Round(GameArgs),
    /// Play an interactive quiz on stdin.
    Play(GameArgs),
    /// Search page titles.
    Search {
        /// Query words.
        #[arg(required = true)]
        query: Vec<String>,
        /// Which page list to search.
        #[arg(long, default_value_t = PageScope::Gallery)]
        scope: PageScope,
        /// Ranked matches to skip.
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Characters of names per page.
        #[arg(long, default_value_t = detective_rs::search::DEFAULT_CHAR_BUDGET)]
        budget: usize,
        /// Search a generated site directory instead of the bundled lists.
        #[arg(long)]
        site: Option<PathBuf>,
    },
    /// Print the page lists of a generated site directory as JSON.
    Pages {
        /// Site root holding gallery/, taxonomy/ and sites/.
        dir: PathBuf,
    },
    /// Serve the quiz and search API over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Player sessions kept in memory.
        #[arg(long, default_value_t = detective_rs::session::MAX_SESSION_COUNT)]
        max_sessions: usize,
    },
}

#[derive(Args, Debug)]
struct GameArgs {
    /// Dataset to play; defaults to the one the mode uses.
    #[arg(long)]
    dataset: Option<String>,
    /// images, names or reef.
    #[arg(short, long, default_value_t = GameMode::Images)]
    mode: GameMode,
    /// Difficulty level, 0 (very easy) to 4 (very hard).
    #[arg(short, long, default_value_t = 0)]
    difficulty: u8,
    /// Seed for reproducible rounds.
    #[arg(long)]
    seed: Option<u64>,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));
    match cli.command {
        Command::Datasets => handle_datasets(cli.json),
        Command::Round(args) => handle_round(args, cli.json),
        Command::Play(args) => handle_play(args, cli.json),
        Command::Search {
            query,
            scope,
            skip,
            budget,
            site,
        } => handle_search(query.join(" "), scope, skip, budget, site, cli.json),
        Command::Pages { dir } => handle_pages(&dir),
        #[cfg(feature = "web")]
        Command::Serve { addr, max_sessions } => handle_serve(addr, max_sessions),
    }
}

fn handle_datasets(as_json: bool) -> Result<(), Box<dyn Error>> {
    let rows: Vec<(&str, usize)> = BundledData::datasets()
        .iter()
        .map(|dataset| (dataset.name(), dataset.catalog().len()))
        .collect();
    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(name, count)| json!({ "name": name, "creatures": count }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let width = rows
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(4)
        .max("DATASET".len());
    println!("{:<width$}  {}", "DATASET", "CREATURES", width = width);
    println!("{:-<width$}  {}", "", "---------", width = width);
    for (name, count) in rows {
        println!("{:<width$}  {}", name, count, width = width);
    }
    Ok(())
}

fn handle_round(args: GameArgs, as_json: bool) -> Result<(), Box<dyn Error>> {
    let settings = DifficultySettings::default();
    let dataset = pick_dataset(args.dataset.as_deref(), args.mode)?;
    let mut rng = make_rng(args.seed);
    let round = build_round(&mut rng, dataset, args.mode, args.difficulty, &settings)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&round_to_json(dataset, &round))?);
        return Ok(());
    }

    let catalog = dataset.catalog();
    let mut text = format!(
        "**{}** on *{}* at level {}, target **{}**\n\n",
        round.mode,
        dataset.name(),
        round.level,
        catalog.name(round.target)
    );
    text.push_str("|#|creature|similarity|thumbnail|\n|-:|-|-:|-|\n");
    for (position, index) in round.options().into_iter().enumerate() {
        let similarity = dataset
            .similarity()
            .get(round.target, index)
            .map(|score| score.to_string())
            .unwrap_or_else(|| "target".to_string());
        let thumbnail = round
            .option_thumbnails
            .get(position)
            .cloned()
            .flatten()
            .unwrap_or_default();
        text.push_str(&format!(
            "|{}|{}|{}|{}|\n",
            position + 1,
            catalog.name(index),
            similarity,
            thumbnail
        ));
    }
    if !round.prompt_thumbnails.is_empty() {
        text.push_str(&format!(
            "\nPrompt thumbnails: {}\n",
            round.prompt_thumbnails.join(", ")
        ));
    }
    if !round.complete {
        text.push_str(&format!(
            "\n*Only {} distractors found; band widened to {}..={}.*\n",
            round.distractors.len(),
            round.band.lower,
            round.band.upper
        ));
    }
    render_markdown_block(&text);
    Ok(())
}

fn handle_play(args: GameArgs, as_json: bool) -> Result<(), Box<dyn Error>> {
    let settings = DifficultySettings::default();
    let dataset = pick_dataset(args.dataset.as_deref(), args.mode)?;
    let mut rng = make_rng(args.seed);
    let mut board = Scoreboard::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    'rounds: loop {
        let round = build_round(&mut rng, dataset, args.mode, args.difficulty, &settings)?;
        board.start_round();
        print_prompt(dataset, &round);
        let mut shown = round.prompt_thumbnails.first().cloned();

        loop {
            print!(
                "answer [1-{}, s=skip, n=new example, q=quit]: ",
                round.option_count()
            );
            io::stdout().flush()?;
            let Some(line) = lines.next() else {
                break 'rounds;
            };
            let line = line?;
            match line.trim() {
                "q" => break 'rounds,
                "s" => continue 'rounds,
                "n" => {
                    if !round.mode.shows_pictures() {
                        println!("New examples are only available in name rounds.");
                        continue;
                    }
                    let Some(item) = dataset.catalog().get(round.target) else {
                        continue;
                    };
                    match choose_thumbnail(&mut rng, item, shown.as_deref()) {
                        Some(thumbnail) => {
                            println!("Example: {thumbnail}");
                            shown = Some(thumbnail.to_string());
                        }
                        None => println!("No other examples."),
                    }
                }
                other => match other.parse::<usize>() {
                    Ok(choice) if (1..=round.option_count()).contains(&choice) => {
                        if round.is_correct(choice - 1) {
                            let points = board.record_success(round.level);
                            println!("Correct! +{points} points, score {board}\n");
                            continue 'rounds;
                        }
                        board.record_failure();
                        debug!(choice, "wrong answer");
                        println!("Not quite, try again.");
                    }
                    _ => println!("Enter a number between 1 and {}.", round.option_count()),
                },
            }
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        println!("\nFinal score {board}, {} points", board.points);
    }
    Ok(())
}

fn handle_search(
    query: String,
    scope: PageScope,
    skip: usize,
    budget: usize,
    site: Option<PathBuf>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let config = SearchConfig::default().with_budget(budget);
    let loaded;
    let index = match site {
        Some(root) => {
            loaded = SearchIndex::from_site_dir(&root, scope)?;
            &loaded
        }
        None => BundledData::search_index(scope),
    };
    let page = index.search(&query, skip, &config);

    if as_json {
        let payload = json!({
            "query": query,
            "scope": scope,
            "page": page,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_search_table(&query, &page);
    }
    Ok(())
}

fn handle_pages(dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut payload = serde_json::Map::new();
    for scope in PageScope::ALL {
        let path = dir.join(scope.as_str());
        let titles = if path.is_dir() {
            page_titles(&path)?
        } else {
            warn!(dir = %path.display(), "missing page directory");
            Vec::new()
        };
        payload.insert(scope.to_string(), json!(titles));
    }
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(addr: std::net::SocketAddr, max_sessions: usize) -> Result<(), Box<dyn Error>> {
    let config = detective_rs::web::WebConfig {
        addr,
        max_sessions,
        ..Default::default()
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(detective_rs::web::serve(config))?;
    Ok(())
}

fn pick_dataset(name: Option<&str>, mode: GameMode) -> Result<&'static Dataset, Box<dyn Error>> {
    let dataset = match (mode, name) {
        (GameMode::Reef, _) | (_, None) => BundledData::dataset_for(mode)?,
        (_, Some(name)) => BundledData::dataset(name)?,
    };
    Ok(dataset)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn round_to_json(dataset: &Dataset, round: &Round) -> serde_json::Value {
    let catalog = dataset.catalog();
    let options: Vec<_> = round
        .options()
        .into_iter()
        .enumerate()
        .map(|(position, index)| {
            json!({
                "position": position,
                "index": index,
                "name": catalog.name(index),
                "similarity": dataset.similarity().get(round.target, index),
                "thumbnail": round.option_thumbnails.get(position).cloned().flatten(),
            })
        })
        .collect();
    json!({
        "dataset": dataset.name(),
        "mode": round.mode,
        "level": round.level,
        "target": catalog.name(round.target),
        "correct_position": round.correct_position,
        "options": options,
        "prompt_thumbnails": round.prompt_thumbnails,
        "band": round.band,
        "complete": round.complete,
    })
}

fn print_prompt(dataset: &Dataset, round: &Round) {
    let catalog = dataset.catalog();
    let mut text = if round.mode.shows_pictures() {
        format!(
            "**Who is this?** {}\n\n",
            round.prompt_thumbnails.join(", ")
        )
    } else {
        format!("**Select the {}**\n\n", catalog.name(round.target))
    };
    for (position, index) in round.options().into_iter().enumerate() {
        let label = if round.mode.shows_pictures() {
            catalog.name(index).to_string()
        } else {
            round
                .option_thumbnails
                .get(position)
                .cloned()
                .flatten()
                .unwrap_or_else(|| "<no picture>".to_string())
        };
        text.push_str(&format!("{}. {}\n", position + 1, label));
    }
    render_markdown_block(&text);
}

fn print_search_table(query: &str, page: &SearchPage) {
    if page.results.is_empty() {
        println!("No results for \"{query}\".");
        if page.truncated {
            println!("The next match is longer than the page budget.");
        }
        return;
    }
    let width = page
        .results
        .iter()
        .map(|result| result.display_name.chars().count())
        .max()
        .unwrap_or(4)
        .max("NAME".len());
    println!("Matches for \"{query}\" ({} total):", page.matches);
    println!("{:<width$}  {}", "NAME", "URL", width = width);
    println!("{:-<width$}  {}", "", "---", width = width);
    for result in &page.results {
        let marker = if result.exact { "  (exact)" } else { "" };
        println!(
            "{:<width$}  {}{}",
            result.display_name,
            result.url,
            marker,
            width = width
        );
    }
    if page.truncated {
        println!("More... (--skip {})", page.skip + page.results.len());
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
