use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flame_calltree::{
    find_node, sandwich, CallTreeView, EngineConfig, FlameGraphData, FocusTarget, ProfileFrame,
    ValueUnit, ViewMode,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

mod render;

use render::RowStyle;

#[derive(Parser)]
#[command(name = "flametree")]
#[command(about = "Explore flame-graph profiles as call trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the call tree, optionally focused on one frame
    Tree(TreeArgs),

    /// Rank frames whose label matches a query
    Search(SearchArgs),

    /// Show the merged callers and callees of one label
    Sandwich(SandwichArgs),

    /// List distinct frame labels with their occurrence counts
    Labels(LabelsArgs),
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Self::Tree(args) => args.json,
            Self::Search(args) => args.json,
            Self::Sandwich(args) => args.json,
            Self::Labels(args) => args.json,
        }
    }
}

#[derive(Args)]
struct InputArgs {
    /// Profile file; `-` reads stdin
    #[arg(default_value = "-")]
    profile: PathBuf,

    /// Input is collapsed stacks (`a;b;c 42` per line) instead of JSON
    #[arg(long)]
    folded: bool,

    /// Unit of profile values (overrides the unit stored in JSON input)
    #[arg(long, value_enum)]
    unit: Option<UnitArg>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum UnitArg {
    Short,
    Nanoseconds,
    Bytes,
}

impl From<UnitArg> for ValueUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Short => Self::Short,
            UnitArg::Nanoseconds => Self::Nanoseconds,
            UnitArg::Bytes => Self::Bytes,
        }
    }
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Focus on the node with this path id (e.g. 0.1.2)
    #[arg(long, conflicts_with = "focus_label")]
    focus_id: Option<String>,

    /// Focus on the first node carrying this label
    #[arg(long)]
    focus_label: Option<String>,

    /// Do not show the focused node's parent
    #[arg(long)]
    no_context: bool,

    /// Mark frames matching this query
    #[arg(long)]
    highlight: Option<String>,

    /// Deepest level to print, relative to the shown roots
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Substring, or regex when it contains regex metacharacters
    query: String,

    #[command(flatten)]
    input: InputArgs,

    /// Maximum number of matches (overrides config)
    #[arg(long)]
    max_matches: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SandwichArgs {
    /// Frame label to sandwich
    label: String,

    #[command(flatten)]
    input: InputArgs,

    /// Deepest level to print, relative to the shown roots
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LabelsArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct LabelCount<'a> {
    label: &'a str,
    occurrences: usize,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    if cli.command.json() {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Tree(args) => run_tree(args, config)?,
        Commands::Search(args) => run_search(args, config)?,
        Commands::Sandwich(args) => run_sandwich(args)?,
        Commands::Labels(args) => run_labels(args)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = EngineConfig::from_toml_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn load_data(input: &InputArgs) -> Result<FlameGraphData> {
    let raw = if input.profile.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read profile from stdin")?;
        raw
    } else {
        fs::read_to_string(&input.profile)
            .with_context(|| format!("Failed to read profile {}", input.profile.display()))?
    };

    let mut frame = if input.folded {
        let unit = input.unit.map(ValueUnit::from).unwrap_or_default();
        ProfileFrame::from_folded(&raw, unit).context("Invalid folded stacks")?
    } else {
        ProfileFrame::from_json(&raw).context("Invalid profile JSON")?
    };
    if let Some(unit) = input.unit {
        frame.unit = unit.into();
    }

    let data = FlameGraphData::from_frame(frame).context("Invalid profile")?;
    log::info!(
        "Loaded {} frames ({} labels{})",
        data.frame().rows.len(),
        data.unique_labels().len(),
        if data.is_diff_flamegraph() { ", diff" } else { "" }
    );
    Ok(data)
}

fn run_tree(args: TreeArgs, mut config: EngineConfig) -> Result<()> {
    let data = load_data(&args.input)?;
    if args.no_context {
        config.focus.parent_context = false;
    }

    let mut view = CallTreeView::new(data, config);
    if let Some(id) = args.focus_id {
        view.focus(FocusTarget::Id(id));
    } else if let Some(label) = args.focus_label {
        view.focus(FocusTarget::Label(label));
    }
    if matches!(view.mode(), ViewMode::Focused(_)) && view.visible().focused_node.is_none() {
        log::warn!("Focus target not found, showing the full tree");
    }

    if let Some(query) = &args.highlight {
        if let Some(error) = &view.search(query).error {
            anyhow::bail!("{error}: {query}");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(view.visible())?);
        return Ok(());
    }

    let visible = view.visible();
    let style = RowStyle {
        data: view.data(),
        focused: visible.focused_node.as_ref(),
        matches: &view.search_outcome().match_ids,
        max_depth: args.max_depth,
    };
    for line in render::forest_lines(&visible.nodes, &style) {
        println!("{line}");
    }
    Ok(())
}

fn run_search(args: SearchArgs, mut config: EngineConfig) -> Result<()> {
    let data = load_data(&args.input)?;
    if let Some(max_matches) = args.max_matches {
        config.search.max_matches = max_matches;
        config.validate().context("Invalid --max-matches")?;
    }

    let mut view = CallTreeView::new(data, config);
    let outcome = view.search(&args.query).clone();
    if let Some(error) = &outcome.error {
        anyhow::bail!("{error}: {}", args.query);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.match_ids.is_empty() {
        eprintln!("No frames match {:?}", args.query);
        return Ok(());
    }
    for (rank, id) in outcome.match_ids.iter().enumerate() {
        let Some(node) = find_node(&view.visible().nodes, id) else {
            continue;
        };
        println!(
            "{}. {} [{}] {} ({:.2}%)",
            rank + 1,
            node.label,
            node.id,
            view.data().value_display(node.total),
            node.total_percent
        );
    }
    Ok(())
}

fn run_sandwich(args: SandwichArgs) -> Result<()> {
    let data = load_data(&args.input)?;
    let view = sandwich(&data, &args.label);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if view.callers_node.is_none() {
        eprintln!("No frames labelled {:?}", args.label);
        return Ok(());
    }

    let style = RowStyle {
        data: &data,
        focused: None,
        matches: &[],
        max_depth: args.max_depth,
    };
    println!("Callers of {}:", args.label);
    for line in render::forest_lines(&view.callers, &style) {
        println!("{line}");
    }
    println!();
    println!("Callees of {}:", args.label);
    for line in render::forest_lines(&view.callees, &style) {
        println!("{line}");
    }
    Ok(())
}

fn run_labels(args: LabelsArgs) -> Result<()> {
    let data = load_data(&args.input)?;
    let counts: Vec<LabelCount<'_>> = data
        .unique_labels()
        .into_iter()
        .map(|label| LabelCount {
            label,
            occurrences: data.nodes_with_label(label).len(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for count in &counts {
            println!("{:>6}  {}", count.occurrences, count.label);
        }
    }
    Ok(())
}
