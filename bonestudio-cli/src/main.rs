use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use bonestudio_core::config::{self, StudioConfig};
use bonestudio_core::matcher::{self, ConflictResolver, EarConflict};
use bonestudio_core::rig::{self, Node, Skeleton};
use bonestudio_core::snapshot::{self, BoneSettings};
use bonestudio_core::{studio, EarChoice, NodeId, PresetStore, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "bonestudio",
    version = VERSION,
    about = "Spring-bone setup helpers for avatar rigs"
)]
struct Cli {
    /// Tool configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Preset file; overrides the configured one
    #[arg(long, global = true)]
    presets: Option<PathBuf>,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a rig YAML and print its bones and detected hair root
    Inspect { rig: PathBuf },
    /// Find accessory bones using the stored whitelist and the remembered selection
    Match {
        rig: PathBuf,
        /// Answer the ear/gimmick question up front instead of on stdin
        #[arg(long, value_enum)]
        prefer: Option<Prefer>,
        /// Also select this bone; remembered for later runs
        #[arg(long = "add", value_name = "BONE")]
        add: Vec<String>,
        /// Ignore the remembered selection
        #[arg(long)]
        fresh: bool,
    },
    /// Print the spring-bone setup plan as JSON
    Plan {
        rig: PathBuf,
        #[arg(long, value_enum)]
        prefer: Option<Prefer>,
        /// Ignore the remembered selection
        #[arg(long)]
        fresh: bool,
        /// Hair root bone; detected when omitted
        #[arg(long)]
        hair: Option<String>,
    },
    /// Edit the accessory whitelist
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },
    /// Inspect and edit stored presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// Save or restore per-bone settings captured during simulation
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand, Debug)]
enum WhitelistAction {
    List,
    Add { term: String },
    Remove { term: String },
    /// Drop the stored whitelist and use the built-in terms again
    Reset,
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    List,
    Show { name: String },
    /// Set one field, e.g. `preset set Hair damping 0.3`; creates the preset if needed
    Set { name: String, field: String, value: String },
    Remove { name: String },
    /// Write the built-in presets that are missing
    Seed,
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// Read `{"bone": {settings}}` JSON and store it
    Save { json: PathBuf },
    /// Print stored settings for the given bones as JSON and clear the snapshot
    Restore { bones: Vec<String> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Prefer {
    Ear,
    Gimmick,
}

impl From<Prefer> for EarChoice {
    fn from(p: Prefer) -> Self {
        match p {
            Prefer::Ear => EarChoice::Ear,
            Prefer::Gimmick => EarChoice::Gimmick,
        }
    }
}

/// Asks on stdin which ear family to keep.
struct Prompt;

impl ConflictResolver for Prompt {
    fn choose(&mut self, conflict: &EarConflict, nodes: &[Node]) -> Option<EarChoice> {
        let list = |ids: &[NodeId]| {
            let names: Vec<_> =
                ids.iter().filter_map(|id| nodes.get(id.0)).map(|n| n.name.as_str()).collect();
            names.join(", ")
        };
        println!("Found two potential ear root families:");
        println!("  [e] {}", list(&conflict.ear));
        println!("  [g] {}", list(&conflict.gimmick));
        let stdin = std::io::stdin();
        loop {
            print!("Which one should get spring bones? [e/g] ");
            if let Err(e) = std::io::stdout().flush() {
                log::warn!("cannot show the ear/gimmick question: {e}");
                return None;
            }
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match line.trim().to_lowercase().as_str() {
                "e" | "ear" => return Some(EarChoice::Ear),
                "g" | "gimmick" => return Some(EarChoice::Gimmick),
                _ => println!("please answer 'e' or 'g'"),
            }
        }
    }
}

fn open_store(cli: &Cli, cfg: &StudioConfig) -> Result<PresetStore> {
    let path = cli.presets.clone().unwrap_or_else(|| cfg.preset_file.clone());
    let mut store = PresetStore::open(&path)
        .with_context(|| format!("opening presets {}", path.display()))?;
    if cfg.seed_defaults {
        store.seed_defaults()?;
    }
    Ok(store)
}

/// Whitelist matches merged with the remembered selection, which is then
/// replaced by the result and saved.
fn find_accessories(
    rig: &Skeleton,
    store: &mut PresetStore,
    prefer: Option<Prefer>,
    extra: &[NodeId],
    fresh: bool,
) -> Result<Vec<NodeId>> {
    let wl = store.whitelist();
    let found = match prefer {
        Some(p) => matcher::find_accessories(rig, &wl, &mut EarChoice::from(p)),
        None => matcher::find_accessories(rig, &wl, &mut Prompt),
    }
    .context("rerun with --prefer ear or --prefer gimmick")?;
    let mut previous = if fresh { Vec::new() } else { store.previous_accessories(rig) };
    previous.extend_from_slice(extra);
    let merged = matcher::merge_previous(found, &previous, rig);
    store.remember_accessories(rig, &merged);
    store.save()?;
    Ok(merged)
}

fn hair_root(rig: &Skeleton, cfg: &StudioConfig) -> Option<NodeId> {
    if cfg.hair_fallback_whole_rig {
        matcher::find_hair_root_anywhere(rig)
    } else {
        matcher::find_hair_root(rig)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cfg = match &cli.config {
        Some(p) => config::load_from_path(p)?,
        None => StudioConfig::default(),
    };

    match &cli.cmd {
        Command::Inspect { rig } => {
            let rig = rig::load_from_path(rig)?;
            println!("Loaded rig: {} ({} bones)", rig.name, rig.len());
            for id in rig.ids() {
                let parent_of = |id: NodeId| rig.node(id).and_then(|n| n.parent);
                let depth = std::iter::successors(parent_of(id), |&p| parent_of(p)).count();
                println!("  {}{}", "  ".repeat(depth), rig.name_of(id));
            }
            match hair_root(&rig, &cfg) {
                Some(id) => println!("  hair root: {}", rig.name_of(id)),
                None => println!("  hair root: (none found)"),
            }
        }
        Command::Match { rig, prefer, add, fresh } => {
            let rig = rig::load_from_path(rig)?;
            let mut store = open_store(&cli, &cfg)?;
            let extra = add
                .iter()
                .map(|name| rig.find(name).with_context(|| format!("no bone named '{name}'")))
                .collect::<Result<Vec<_>>>()?;
            let found = find_accessories(&rig, &mut store, *prefer, &extra, *fresh)?;
            if found.is_empty() {
                println!("No accessory bones found");
            }
            for id in found {
                println!("{}", rig.name_of(id));
            }
        }
        Command::Plan { rig, prefer, fresh, hair } => {
            let rig = rig::load_from_path(rig)?;
            let mut store = open_store(&cli, &cfg)?;
            let hair = match hair {
                Some(name) => {
                    Some(rig.find(name).with_context(|| format!("no bone named '{name}'"))?)
                }
                None => hair_root(&rig, &cfg),
            };
            let accessories = find_accessories(&rig, &mut store, *prefer, &[], *fresh)?;
            let plan = studio::plan_setup(&rig, hair, &accessories, &store.presets()?);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Whitelist { action } => {
            let mut store = open_store(&cli, &cfg)?;
            match action {
                WhitelistAction::List => {
                    for term in store.whitelist().iter() {
                        println!("{term}");
                    }
                }
                WhitelistAction::Add { term } => {
                    if !store.add_whitelist_term(term) {
                        println!("'{term}' is already whitelisted");
                    }
                    store.save()?;
                }
                WhitelistAction::Remove { term } => {
                    if !store.remove_whitelist_term(term) {
                        bail!("'{term}' is not in the stored whitelist");
                    }
                    if store.whitelist().is_empty() {
                        println!("whitelist is now empty; `whitelist reset` restores the defaults");
                    }
                    store.save()?;
                }
                WhitelistAction::Reset => {
                    if store.reset_whitelist() {
                        store.save()?;
                    }
                }
            }
        }
        Command::Preset { action } => {
            let mut store = open_store(&cli, &cfg)?;
            match action {
                PresetAction::List => {
                    for name in store.preset_names() {
                        println!("{name}");
                    }
                }
                PresetAction::Show { name } => {
                    println!("{}", serde_json::to_string_pretty(&store.preset(name)?)?);
                }
                PresetAction::Set { name, field, value } => {
                    let mut preset = if store.has_preset(name) {
                        store.preset(name)?
                    } else {
                        bonestudio_core::Preset::named(name)
                    };
                    preset.set_field(field, value)?;
                    store.put_preset(&preset)?;
                    store.save()?;
                }
                PresetAction::Remove { name } => {
                    if !store.remove_preset(name) {
                        bail!("no preset named '{name}'");
                    }
                    store.save()?;
                }
                PresetAction::Seed => {
                    if !store.seed_defaults()? {
                        println!("built-in presets already present");
                    }
                    store.save()?;
                }
            }
        }
        Command::Snapshot { action } => {
            let mut store = open_store(&cli, &cfg)?;
            match action {
                SnapshotAction::Save { json } => {
                    let data = std::fs::read_to_string(json)
                        .with_context(|| format!("reading {}", json.display()))?;
                    let bones: BTreeMap<String, BoneSettings> = serde_json::from_str(&data)?;
                    let bones: Vec<_> = bones.into_iter().collect();
                    snapshot::save_snapshot(&mut store, &bones);
                    store.save()?;
                }
                SnapshotAction::Restore { bones } => {
                    if !snapshot::has_snapshot(&store) {
                        bail!("no play-mode snapshot saved");
                    }
                    let restored = snapshot::take_snapshot(&mut store, bones.as_slice())?;
                    let restored: BTreeMap<_, _> = restored.into_iter().collect();
                    println!("{}", serde_json::to_string_pretty(&restored)?);
                    store.save()?;
                }
            }
        }
    }
    Ok(())
}
