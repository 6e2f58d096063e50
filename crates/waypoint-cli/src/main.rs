//! waypoint CLI
//!
//! Command-line tool for inspecting path templates and route files.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use waypoint_router::{
    CombinedPattern, CompiledPattern, HandlerRef, Method, Request, RouteTable, RoutesConfig,
};

/// Path template compiler and route matcher.
#[derive(Parser)]
#[command(name = "waypoint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template and show its match expression.
    Compile {
        /// Path template, e.g. `/home/{uid:\d+}`.
        template: String,
    },

    /// Combine templates into one alternation.
    Combine {
        /// Path templates, in priority order.
        #[arg(required = true)]
        templates: Vec<String>,
    },

    /// Find the route a request would be dispatched to.
    Match {
        /// Route declaration file.
        #[arg(short, long, env = "WAYPOINT_ROUTES", default_value = "routes.json")]
        routes: PathBuf,

        /// HTTP method.
        method: String,

        /// Request target, query string allowed.
        path: String,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Compile { template } => {
            let pattern = CompiledPattern::compile(&template)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "template": pattern.template(),
                        "expression": pattern.expression(),
                        "params": pattern.param_names(),
                    })
                );
            } else {
                println!("expression: {}", pattern.expression());
                println!("params:     {}", format_params(pattern.param_names()));
            }
        }

        Commands::Combine { templates } => {
            let combined = CombinedPattern::combine(&templates)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "expression": combined.expression(),
                        "params": combined.params(),
                    })
                );
            } else {
                println!("expression: {}", combined.expression());
                for (template, params) in templates.iter().zip(combined.params()) {
                    println!("  {template}: {}", format_params(params));
                }
            }
        }

        Commands::Match {
            routes,
            method,
            path,
        } => {
            let config = RoutesConfig::from_path(&routes)
                .with_context(|| format!("loading {}", routes.display()))?;
            let table = RouteTable::from_config(&config)?;
            // controllers live in the application, so references are only
            // checked for shape here
            table.check_references()?;
            let method: Method = method.parse()?;
            info!(
                routes = table.len(),
                strategy = ?config.strategy,
                file = %routes.display(),
                "route table loaded"
            );

            let request = Request::new(method, &path);
            let found = table.find_with(config.strategy, method, &request.path)?;
            let Some((index, values)) = found else {
                debug!(%method, path = %request.path, "no route matched");
                if cli.json {
                    println!("{}", json!({ "matched": false }));
                } else {
                    println!("no route matched: {method} {}", request.path);
                }
                return Ok(ExitCode::FAILURE);
            };

            let entry = &table.entries(method)[index];
            let names = entry.pattern().param_names().unwrap_or_default();
            let handler = match entry.handler() {
                HandlerRef::Reference(reference) => reference.as_str(),
                HandlerRef::Callable(_) => "<callable>",
            };

            if cli.json {
                let params: serde_json::Map<String, serde_json::Value> = names
                    .iter()
                    .zip(&values)
                    .map(|(name, value)| (name.clone(), json!(value)))
                    .collect();
                println!(
                    "{}",
                    json!({
                        "matched": true,
                        "strategy": config.strategy,
                        "index": index,
                        "template": entry.template(),
                        "handler": handler,
                        "params": params,
                        "args": values,
                    })
                );
            } else {
                println!("route #{index}: {method} {} -> {handler}", entry.template());
                for (name, value) in names.iter().zip(&values) {
                    println!("  {name} = {value}");
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn format_params(params: Option<&[String]>) -> String {
    params.map_or_else(|| "(none)".to_string(), |names| names.join(", "))
}
