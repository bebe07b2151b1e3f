//! Command-line interface for medcheck.
//!
//! Provides commands for checking notes, fetching suggestions for a single
//! term, managing the user-confirmed term list, and inspecting cache state.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::cache::CacheSet;
use crate::config;
use crate::core::{Resolver, ResolverSettings};
use crate::domain::{Classification, TermSpan};
use crate::matchers::{
    ConfusionTable, Dictionary, DynamicList, GuardedValidator, HttpTerminologyService,
};

/// medcheck - Medical term annotation engine for clinical notes
#[derive(Parser, Debug)]
#[command(name = "medcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a note for misspelled and confusable medical terms
    Check {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read input from stdin
        #[arg(long)]
        stdin: bool,

        /// Emit spans as JSON instead of the annotated listing
        #[arg(long)]
        json: bool,
    },

    /// Fetch ranked suggestions for a single term
    Suggest {
        /// The term to look up
        term: String,

        /// Emit suggestions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Confirm a term as correct (adds it to the dynamic list)
    Confirm {
        /// The term to confirm
        term: String,
    },

    /// List user-confirmed terms
    Terms,

    /// Show cache statistics
    Stats,

    /// Delete expired cache entries
    Sweep,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Check { input, stdin, json } => check_note(input, stdin, json).await,
            Commands::Suggest { term, json } => suggest_term(&term, json).await,
            Commands::Confirm { term } => confirm_term(&term),
            Commands::Terms => list_terms(),
            Commands::Stats => show_stats(),
            Commands::Sweep => sweep_caches(),
            Commands::Config => show_config(),
        }
    }
}

/// Build the resolver from the resolved configuration
fn build_resolver() -> Result<Resolver> {
    let cfg = config::config()?;

    std::fs::create_dir_all(cfg.cache_dir())
        .with_context(|| format!("Failed to create cache dir: {}", cfg.cache_dir().display()))?;

    let service = HttpTerminologyService::new(cfg.validator_url.clone(), cfg.validator_timeout);

    Ok(Resolver::new(
        Dictionary::with_defaults(),
        DynamicList::open(cfg.dynamic_list_path()),
        ConfusionTable::with_defaults(),
        GuardedValidator::new(Box::new(service), cfg.breaker.clone()),
        Arc::new(CacheSet::durable(&cfg.cache_dir(), cfg.cache.clone())),
        cfg.resolver.clone(),
    ))
}

/// Dynamic list alone, for commands that never resolve
fn open_dynamic_list() -> Result<DynamicList> {
    let cfg = config::config()?;
    std::fs::create_dir_all(&cfg.home)
        .with_context(|| format!("Failed to create home dir: {}", cfg.home.display()))?;
    Ok(DynamicList::open(cfg.dynamic_list_path()))
}

/// Check a note and print the annotated spans
async fn check_note(input_file: Option<PathBuf>, _use_stdin: bool, json: bool) -> Result<()> {
    // No file means stdin, whether or not --stdin was passed
    let text = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    };

    let resolver = build_resolver()?;
    let spans = resolver.resolve(&text).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&spans)?);
        return Ok(());
    }

    let flagged: Vec<&TermSpan> = spans
        .iter()
        .filter(|s| {
            matches!(
                s.classification,
                Classification::Misspelled | Classification::DrugConfusable
            )
        })
        .collect();

    if flagged.is_empty() {
        eprintln!("No issues found ({} terms checked)", spans.len());
        return Ok(());
    }

    println!("{:<10} {:<20} {:<15} SUGGESTIONS", "OFFSET", "TERM", "ISSUE");
    println!("{}", "-".repeat(75));
    for span in &flagged {
        let suggestions: Vec<&str> = span
            .suggestions
            .iter()
            .map(|s| s.value.as_str())
            .collect();
        println!(
            "{:<10} {:<20} {:<15} {}",
            format!("{}..{}", span.start, span.end),
            span.surface_text,
            span.classification.as_str(),
            suggestions.join(", ")
        );
    }
    eprintln!(
        "\n{} issue(s) in {} checked term(s)",
        flagged.len(),
        spans.len()
    );

    Ok(())
}

/// Print suggestions for a single term
async fn suggest_term(term: &str, json: bool) -> Result<()> {
    let resolver = build_resolver()?;
    let suggestions = resolver.suggest(term).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("No suggestions for: {}", term);
        return Ok(());
    }

    for suggestion in &suggestions {
        println!(
            "{}. {} ({})",
            suggestion.rank + 1,
            suggestion.value,
            suggestion.source.as_str()
        );
    }
    Ok(())
}

/// Add a term to the user-confirmed dynamic list
fn confirm_term(term: &str) -> Result<()> {
    let list = open_dynamic_list()?;
    let added = list.confirm(term)?;

    if added {
        println!("Confirmed: {}", term.trim().to_lowercase());
    } else {
        println!("Already confirmed: {}", term.trim().to_lowercase());
    }
    Ok(())
}

/// List user-confirmed terms
fn list_terms() -> Result<()> {
    let list = open_dynamic_list()?;
    let terms = list.terms();

    if terms.is_empty() {
        println!("No confirmed terms. Use 'medcheck confirm <term>' to add one.");
        return Ok(());
    }

    for term in &terms {
        println!("{}", term);
    }
    eprintln!("\nTotal: {} term(s)", terms.len());
    Ok(())
}

/// Show cache statistics
fn show_stats() -> Result<()> {
    let cfg = config::config()?;
    let caches = CacheSet::durable(&cfg.cache_dir(), cfg.cache.clone());
    let stats = caches.stats();

    println!("{:<16} {:>8} {:>8} {:>8}", "CACHE", "ENTRIES", "HITS", "MISSES");
    println!("{}", "-".repeat(44));
    for (name, store) in [
        ("classification", &stats.classification),
        ("validator", &stats.validator),
        ("suggestion", &stats.suggestion),
    ] {
        println!(
            "{:<16} {:>8} {:>8} {:>8}",
            name, store.entries, store.hits, store.misses
        );
    }
    Ok(())
}

/// Delete expired cache entries
fn sweep_caches() -> Result<()> {
    let cfg = config::config()?;
    let caches = CacheSet::durable(&cfg.cache_dir(), cfg.cache.clone());
    let removed = caches.sweep_all();
    println!("Removed {} expired entries", removed);
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("medcheck configuration");
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:         {}", cfg.home.display());
    println!("  Dynamic list: {}", cfg.dynamic_list_path().display());
    println!("  Cache dir:    {}", cfg.cache_dir().display());
    println!();
    println!("Validator:");
    println!("  Endpoint: {}", cfg.validator_url);
    println!("  Timeout:  {:?}", cfg.validator_timeout);
    println!(
        "  Breaker:  {} failures / {:?} window, {:?} cooldown",
        cfg.breaker.failure_threshold, cfg.breaker.window, cfg.breaker.cooldown
    );
    println!();
    println!("Caches:");
    println!("  Classification TTL: {}s", cfg.cache.classification_ttl_secs);
    println!("  Validator TTL:      {}s", cfg.cache.validator_ttl_secs);
    println!("  Suggestion TTL:     {}s", cfg.cache.suggestion_ttl_secs);
    println!("  Capacity:           {} entries per cache", cfg.cache.capacity);
    println!("  Sweep interval:     {:?}", cfg.sweep_interval);
    println!();
    println!("Suggestions:");
    println!("  Max per span:     {}", cfg.resolver.max_suggestions);
    println!("  Similarity floor: {}", cfg.resolver.similarity_floor);
    println!("  Validator limit:  {}", cfg.resolver.validator_limit);

    Ok(())
}
