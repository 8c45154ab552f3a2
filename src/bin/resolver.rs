//! Schema Resolver CLI
//!
//! Resolves, flattens and checks the schemas of a protocol file or directory.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use proto_schemas::{
    load, OutputFormat, ReferenceGraph, SchemaError, SchemaRegistry, SchemaResolver, Settings,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-resolver")]
#[command(about = "Resolve references and flatten interfaces in protocol schemas")]
struct Cli {
    /// Protocol file, or a directory of protocol files
    #[arg(short, long, default_value = ".")]
    proto: PathBuf,

    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved node of a schema
    Resolve {
        /// Schema id or type name
        id: String,
    },

    /// Print the flattened interface of a schema
    Flatten {
        /// Schema id or type name
        id: String,
    },

    /// Print the property names of a union, intersection or mapped schema
    Keys {
        /// Schema id or type name
        id: String,
    },

    /// Resolve every schema and verify service schema ids
    Check,

    /// List reference cycles and dangling references
    Cycles,

    /// Fuzzy-search schema ids
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found problems
fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = Settings::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!(?settings, "loaded settings");

    let loaded = load(&cli.proto, &settings.loader)?;
    let registry = &loaded.proto.types;
    let format = settings.output.format;
    let mut resolver = SchemaResolver::with_config(registry, settings.resolver.clone());

    match cli.command {
        Commands::Resolve { id } => {
            let id = lookup(registry, &id)?;
            let node = resolver.resolve_id(&id)?;
            println!("{}", format.render(&*node)?);
            Ok(true)
        }

        Commands::Flatten { id } => {
            let id = lookup(registry, &id)?;
            let flat = resolver.flatten_id(&id)?;
            println!("{}", format.render(&flat)?);
            Ok(true)
        }

        Commands::Keys { id } => {
            let id = lookup(registry, &id)?;
            let node = resolver.resolve_id(&id)?;
            for name in resolver.get_property_names(&node)? {
                println!("{}", name);
            }
            Ok(true)
        }

        Commands::Check => check(&loaded.proto, &mut resolver, format),

        Commands::Cycles => {
            let graph = ReferenceGraph::build(registry);
            println!(
                "🔍 {} schemas, {} references",
                graph.schema_count(),
                graph.edge_count()
            );

            let cycles = graph.cycles();
            for group in &cycles {
                println!("  ❌ cycle: {}", group.join(" <-> "));
            }
            let dangling: Vec<_> = graph.dangling().collect();
            for (from, target) in &dangling {
                println!("  ❌ {} references missing {}", from, target);
            }

            if cycles.is_empty() && dangling.is_empty() {
                println!("✅ No cycles or dangling references");
            }
            Ok(cycles.is_empty() && dangling.is_empty())
        }

        Commands::Search { query, limit } => {
            for result in registry.search(&query, limit) {
                println!("{:>6}  {}", result.score, result.id);
            }
            Ok(true)
        }
    }
}

/// Map a user query to a registry id, suggesting near matches on failure
fn lookup(registry: &SchemaRegistry, query: &str) -> anyhow::Result<String> {
    if let Some(id) = registry.resolve_id(query) {
        return Ok(id.clone());
    }

    let suggestions = registry.search(query, 5);
    if !suggestions.is_empty() {
        eprintln!("Did you mean:");
        for s in &suggestions {
            eprintln!("  {}", s.id);
        }
    }
    Err(anyhow!(SchemaError::UnresolvedReference {
        target: query.to_string(),
    }))
}

fn check(
    proto: &proto_schemas::ServiceProto,
    resolver: &mut SchemaResolver<'_>,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let registry = resolver.registry();
    let mut failures: Vec<(String, String)> = Vec::new();

    for (id, node) in registry.iter() {
        if let Err(e) = resolver.check_schema(node) {
            failures.push((id.clone(), e.to_string()));
        }
    }

    for (service, id) in proto.missing_schemas() {
        failures.push((service.to_string(), format!("Missing schema {}", id)));
    }

    let stats = resolver.cache_stats();
    debug!(?stats, "resolver cache after check");

    if failures.is_empty() {
        println!("✅ {} schemas, {} services - all resolved", registry.len(), proto.services.len());
        return Ok(true);
    }

    match format {
        OutputFormat::Pretty => {
            println!("❌ {} problem(s):", failures.len());
            for (id, message) in &failures {
                println!("  {} - {}", id, message);
            }
        }
        OutputFormat::Compact => {
            let report: Vec<_> = failures
                .iter()
                .map(|(id, message)| serde_json::json!({ "id": id, "error": message }))
                .collect();
            println!("{}", format.render(&report)?);
        }
    }
    Ok(false)
}
