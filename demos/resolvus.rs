// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use resolvus::{Engine, MemoryStore};

#[derive(Subcommand)]
enum Commands {
    /// Resolve a submission against a rule document.
    Eval {
        /// Rule document (JSON, or YAML with the `yaml` feature).
        #[arg(long, short)]
        rules: String,

        /// Entity data file served through the in-memory store.
        #[arg(long, short)]
        data: Option<String>,

        /// Submission URI.
        #[arg(long, short)]
        submission: String,

        /// Request headers as name=value pairs.
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,

        /// Resolve repositories instead of policies.
        #[arg(long)]
        repositories: bool,
    },

    /// Parse a rule document and report its shape.
    Check {
        /// Rule document (JSON, or YAML with the `yaml` feature).
        #[arg(long, short)]
        rules: String,
    },
}

#[derive(Parser)]
#[command(about = "Submission policy and repository resolution", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn load_rules(engine: &mut Engine, path: &str) -> Result<()> {
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        #[cfg(feature = "yaml")]
        return engine.load_rules_from_yaml_file(path);

        #[cfg(not(feature = "yaml"))]
        bail!("loading YAML rule documents requires the `yaml` feature");
    }
    engine.load_rules_from_file(path)
}

fn parse_header(header: &str) -> Result<(String, String)> {
    match header.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => bail!("headers must be given as name=value, got '{header}'"),
    }
}

fn eval(
    rules: &str,
    data: Option<&str>,
    submission: &str,
    headers: &[String],
    repositories: bool,
) -> Result<()> {
    let mut engine = Engine::new();
    load_rules(&mut engine, rules)?;

    if let Some(path) = data {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        let entities =
            serde_json::from_str(&contents).with_context(|| format!("failed to parse {path}"))?;
        engine.set_store(Rc::new(MemoryStore::from_json(entities)?));
    }

    let mut header_map = BTreeMap::new();
    for header in headers {
        let (name, value) = parse_header(header)?;
        header_map.insert(name, value);
    }

    if repositories {
        let found = engine.find_repositories(submission, &header_map)?;
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        let found = engine.find_policies(submission, &header_map)?;
        println!("{}", serde_json::to_string_pretty(&found)?);
    }

    Ok(())
}

fn check(rules: &str) -> Result<()> {
    let mut engine = Engine::new();
    load_rules(&mut engine, rules)?;

    let templates = engine.document().map(|d| d.policies.len()).unwrap_or(0);
    println!("ok: {templates} policy templates");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Eval {
            rules,
            data,
            submission,
            headers,
            repositories,
        } => eval(&rules, data.as_deref(), &submission, &headers, repositories),
        Commands::Check { rules } => check(&rules),
    }
}
