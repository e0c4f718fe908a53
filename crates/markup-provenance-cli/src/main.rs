use anyhow::{Context, Result};
use markup_provenance_config::Config;
use markup_provenance_engine::{Diagnostic, process_document};
use markup_provenance_syntax::{parse, render};
use std::{env, fs, path::PathBuf, process};

const USAGE: &str = "<tree-file> <source-file> [--config <file>] [--attr-expansion]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    tree_path: PathBuf,
    source_path: PathBuf,
    config_path: Option<PathBuf>,
    attr_expansion: bool,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut config_path = None;
    let mut attr_expansion = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a file")?;
                config_path = Some(PathBuf::from(path));
            }
            "--attr-expansion" => attr_expansion = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            path => positional.push(PathBuf::from(path)),
        }
    }

    let [tree_path, source_path] = <[PathBuf; 2]>::try_from(positional)
        .map_err(|found| format!("expected 2 files, got {}", found.len()))?;
    Ok(Args {
        tree_path,
        source_path,
        config_path,
        attr_expansion,
    })
}

fn load_config(args: &Args) -> Result<Config> {
    let config_path = match &args.config_path {
        Some(path) => Config::expand_path(path).unwrap_or_else(|| path.clone()),
        None => Config::config_path(),
    };
    let config = Config::load_from_path(&config_path)?;
    if config.is_none() && args.config_path.is_some() {
        anyhow::bail!("config file '{}' not found", config_path.display());
    }
    Ok(config.unwrap_or_default())
}

fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    format!(
        "{}: <{}> {}",
        diagnostic.category.as_str(),
        diagnostic.node_name,
        diagnostic.message
    )
}

fn run(args: &Args, config: &Config) -> Result<()> {
    let tree = fs::read_to_string(&args.tree_path)
        .with_context(|| format!("reading tree file '{}'", args.tree_path.display()))?;
    let source = fs::read_to_string(&args.source_path)
        .with_context(|| format!("reading source file '{}'", args.source_path.display()))?;

    let mut doc = parse(&tree, &source)
        .with_context(|| format!("parsing tree file '{}'", args.tree_path.display()))?;

    let mut options = config.dsr_options();
    options.attr_expansion |= args.attr_expansion;

    let diagnostics = process_document(&mut doc, &options)
        .with_context(|| format!("wrapping '{}'", args.tree_path.display()))?;

    for diagnostic in diagnostics.events() {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
    println!("{}", render(&doc));
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("markup-provenance", String::as_str);

    let args = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: {program} {USAGE}");
            process::exit(1);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e:#}");
            process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log.filter))
        .init();
    log::debug!("options: {:?}", config.dsr);

    if let Err(e) = run(&args, &config) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
