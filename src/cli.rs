use crate::assets::IconRegistry;
use crate::config::{Config, load_config};
use crate::layout::engine::engine_from_config;
use crate::layout::LayoutGraph;
use crate::layout_dump::write_geometry_dump;
use crate::parser::parse_graph_document;
use crate::render::write_output_scene;
use crate::{Compiled, compile_scene, prepare_layout_request, render_graph};
use anyhow::{Context, Result};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gscene",
    version,
    about = "Compile architecture graphs into hand-drawn scene documents"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config JSON file (theme, sizing, scene and engine settings)
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize a graph document and emit the layout request
    Prepare(IoArgs),
    /// Turn a laid-out graph into a scene
    Compile {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Run the full pipeline through an external layout engine
    Render {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        scene: SceneArgs,
        /// Layout engine command (overrides engine.command)
        #[arg(long = "engine")]
        engine: Option<String>,
        /// Argument passed to the layout engine; repeatable
        #[arg(long = "engine-arg", allow_hyphen_values = true)]
        engine_args: Vec<String>,
    },
    /// Build, list or search an icon manifest
    Icons {
        /// Directory of .svg/.png/.jpg icons to scan
        #[arg(long = "dir", conflicts_with = "manifest")]
        dir: Option<PathBuf>,
        /// Existing icon manifest
        #[arg(long = "manifest")]
        manifest: Option<PathBuf>,
        /// List icons whose name contains this term
        #[arg(long = "search")]
        search: Option<String>,
        /// Manifest output file. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct IoArgs {
    /// Input JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct SceneArgs {
    /// Icon manifest (JSON) or a directory of icon files
    #[arg(long = "icons")]
    pub icons: Option<PathBuf>,

    /// Write placed nodes and routed edges to this file
    #[arg(long = "dump-geometry")]
    pub dump_geometry: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Prepare(io) => {
            let input = read_input(io.input.as_deref())?;
            let document = parse_graph_document(&input)?;
            let prepared = prepare_layout_request(&document, &config);
            report(prepared.diagnostics.len());
            write_json(&prepared.request, io.output.as_deref())?;
        }
        Command::Compile { io, scene } => {
            let input = read_input(io.input.as_deref())?;
            let response: LayoutGraph =
                serde_json::from_str(&input).context("invalid layout response")?;
            let registry = load_registry(scene.icons.as_deref())?;
            let compiled = compile_scene(&response, &registry, &config);
            finish(&compiled, &scene, io.output.as_deref())?;
        }
        Command::Render {
            io,
            scene,
            engine,
            engine_args,
        } => {
            let input = read_input(io.input.as_deref())?;
            let document = parse_graph_document(&input)?;
            let registry = load_registry(scene.icons.as_deref())?;
            let mut engine_cfg = config.engine.clone();
            if engine.is_some() {
                engine_cfg.command = engine;
                engine_cfg.args = engine_args;
            } else if !engine_args.is_empty() {
                engine_cfg.args = engine_args;
            }
            let engine = engine_from_config(&engine_cfg).ok_or_else(|| {
                anyhow::anyhow!("No layout engine configured; pass --engine or set engine.command")
            })?;
            let compiled = render_graph(&document, &engine, &registry, &config)?;
            finish(&compiled, &scene, io.output.as_deref())?;
        }
        Command::Icons {
            dir,
            manifest,
            search,
            output,
        } => {
            let registry = match (dir, manifest) {
                (Some(dir), _) => IconRegistry::from_dir(&dir)?,
                (None, Some(manifest)) => IconRegistry::load(&manifest)?,
                (None, None) => {
                    return Err(anyhow::anyhow!("Pass --dir or --manifest"));
                }
            };
            match search {
                Some(term) => {
                    for entry in registry.search(&term) {
                        println!("{}\t{}", entry.id, entry.name);
                    }
                }
                None => {
                    let entries: Vec<_> = registry.iter().collect();
                    write_json(&entries, output.as_deref())?;
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn finish(compiled: &Compiled, scene: &SceneArgs, output: Option<&Path>) -> Result<()> {
    report(compiled.diagnostics.len());
    if let Some(path) = scene.dump_geometry.as_deref() {
        write_geometry_dump(path, &compiled.geometry)?;
    }
    write_output_scene(&compiled.scene, output)
}

fn report(diagnostics: usize) {
    if diagnostics > 0 {
        tracing::info!(diagnostics, "input repaired; see warnings above");
    }
}

fn load_registry(path: Option<&Path>) -> Result<IconRegistry> {
    let Some(path) = path else {
        return Ok(IconRegistry::default());
    };
    let registry = if path.is_dir() {
        IconRegistry::from_dir(path)?
    } else {
        IconRegistry::load(path)?
    };
    tracing::debug!(icons = registry.len(), "loaded icon registry");
    Ok(registry)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
