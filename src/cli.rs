//! Thin CLI over contract documents: match | compat | generate | examples
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::UnexpectedKeyPolicy;
use crate::document::Contract;
use crate::pattern::Pattern;
use crate::result::MatchResult;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check payloads against contract patterns, compare contract versions, and generate samples
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// match JSON payloads against a contract pattern
    Match(MatchCmd),
    /// check that a newer contract stays compatible with an older one
    Compat(CompatCmd),
    /// print one generated value for a contract pattern
    Generate(GenerateCmd),
    /// print one generated value per example-driven specialisation
    Examples(ExamplesCmd),
}

#[derive(Args, Debug, Clone)]
struct ContractSettings {
    /// contract document (JSON)
    #[arg(long, short)]
    contract: PathBuf,

    /// named pattern to use instead of the body, e.g. Address or (Address)
    #[arg(long, short)]
    pattern: Option<String>,

    /// accept keys the pattern does not declare
    #[arg(long, default_value_t = false)]
    permissive: bool,
}

#[derive(clap::Parser, Debug)]
struct MatchCmd {
    #[command(flatten)]
    contract_settings: ContractSettings,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Direction {
    /// the newer contract must accept everything the older one sends
    Request,
    /// the older contract must accept everything the newer one returns
    Response,
}

#[derive(clap::Parser, Debug)]
struct CompatCmd {
    /// contract document currently in use
    #[arg(long)]
    older: PathBuf,

    /// candidate contract document
    #[arg(long)]
    newer: PathBuf,

    /// named pattern to compare instead of the bodies
    #[arg(long, short)]
    pattern: Option<String>,

    #[arg(long, value_enum, default_value_t = Direction::Request)]
    direction: Direction,

    /// accept keys the bigger side does not declare
    #[arg(long, default_value_t = false)]
    permissive: bool,
}

#[derive(clap::Parser, Debug)]
struct GenerateCmd {
    #[command(flatten)]
    contract_settings: ContractSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ExamplesCmd {
    #[command(flatten)]
    contract_settings: ContractSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ContractSettings {
    fn load(&self) -> anyhow::Result<(Contract, Pattern)> {
        let contract = load_contract(&self.contract, self.permissive)?;
        let pattern = contract
            .pattern(self.pattern.as_deref())
            .with_context(|| format!("failed to select pattern in {}", self.contract.display()))?;
        Ok((contract, pattern))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        init_logging(self.verbose);
        match &self.cmd {
            Command::Match(target) => target.run(),
            Command::Compat(target) => target.run(),
            Command::Generate(target) => {
                let (contract, pattern) = target.contract_settings.load()?;
                let value = pattern.generate(&contract.resolver).context("failed to generate a value")?;
                write_output(target.out.as_deref(), &render(&value))
            }
            Command::Examples(target) => {
                let (contract, pattern) = target.contract_settings.load()?;
                let specialised = contract
                    .specialisations(&pattern)
                    .context("failed to specialise the pattern for the examples")?;
                info!(count = specialised.len(), "specialised pattern");
                let mut rendered = Vec::with_capacity(specialised.len());
                for (index, case) in specialised.iter().enumerate() {
                    let value = case
                        .generate(&contract.resolver)
                        .with_context(|| format!("failed to generate case {index}"))?;
                    rendered.push(render(&value));
                }
                write_output(target.out.as_deref(), &rendered.join("\n"))
            }
        }
    }
}

impl MatchCmd {
    fn run(&self) -> anyhow::Result<()> {
        let (contract, pattern) = self.contract_settings.load()?;
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        info!(inputs = source_paths.len(), "matching inputs");

        let outcomes: Vec<(PathBuf, anyhow::Result<MatchResult>)> = source_paths
            .into_par_iter()
            .map(|path| {
                let outcome = load_value(&path).map(|value| pattern.matches(&value, &contract.resolver));
                (path, outcome)
            })
            .collect();

        let mut failed = 0usize;
        for (path, outcome) in &outcomes {
            let path = path.display();
            match outcome {
                Ok(MatchResult::Success) => println!("{} {path}", "✔".green()),
                Ok(result) => {
                    failed += 1;
                    println!("{} {path}\n{}", "✘".red(), result.report());
                }
                Err(error) => {
                    failed += 1;
                    println!("{} {path}\n{error:#}", "✘".red());
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} inputs did not match", outcomes.len());
        }
        Ok(())
    }
}

impl CompatCmd {
    fn run(&self) -> anyhow::Result<()> {
        let older = load_contract(&self.older, self.permissive)?;
        let newer = load_contract(&self.newer, self.permissive)?;
        let older_pattern = older.pattern(self.pattern.as_deref()).context("failed to select pattern in older contract")?;
        let newer_pattern = newer.pattern(self.pattern.as_deref()).context("failed to select pattern in newer contract")?;

        let result = match self.direction {
            Direction::Request => newer_pattern.encompasses(&older_pattern, &newer.resolver, &older.resolver),
            Direction::Response => older_pattern.encompasses(&newer_pattern, &older.resolver, &newer.resolver),
        };
        debug!(direction = ?self.direction, compatible = result.is_success(), "compatibility verdict");
        match result {
            MatchResult::Success => {
                println!("{} {} is compatible with {}", "✔".green(), self.newer.display(), self.older.display());
                Ok(())
            }
            failure => {
                println!("{} {}", "✘".red(), failure.report());
                bail!("{} is not backward compatible with {}", self.newer.display(), self.older.display())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn init_logging(verbose: bool) {
    let default = if verbose { "contract_lens=debug" } else { "contract_lens=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_contract(path: &Path, permissive: bool) -> anyhow::Result<Contract> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut contract = Contract::from_json_str(&source).with_context(|| format!("failed to load contract {}", path.display()))?;
    if permissive {
        contract.resolver = contract.resolver.with_policy(UnexpectedKeyPolicy::Permissive);
    }
    Ok(contract)
}

fn load_value(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json = serde_json::from_str::<serde_json::Value>(&source)
        .with_context(|| format!("failed to parse JSON source file ({})", path.display()))?;
    Ok(Value::from(json))
}

fn render(value: &Value) -> String {
    match value {
        Value::Node(_) => value.to_string(),
        other => serde_json::to_string_pretty(&other.to_json()).unwrap_or_else(|_| other.to_string()),
    }
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let mut matched_any = false;
        for entry in glob::glob(pattern)? {
            out.push(entry?);
            matched_any = true;
        }
        if !matched_any {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}
