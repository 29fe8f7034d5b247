use clap::{Parser, Subcommand, ValueEnum};
use crudkit::{CrudkitError, Registry};
use std::process;

/// Inspect and validate a crudkit schema config.
#[derive(Parser)]
#[command(name = "crudkit", version, about)]
struct Cli {
    /// Path to the yml config file
    #[arg(long, default_value = "config.yml")]
    config_file: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate the config, reporting any schema error
    Check,

    /// List model names and their backing collections
    Models,

    /// Show the field definitions of a model
    Fields {
        /// Model name
        model: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> crudkit::Result<()> {
    let registry = Registry::open(&cli.config_file)?;
    let schema = registry.schema();

    match &cli.command {
        Command::Check => {
            println!(
                "OK: {} model(s), user collection '{}'",
                schema.models.len(),
                schema.user.collection
            );
        }
        Command::Models => {
            let mut names: Vec<&String> = schema.models.keys().collect();
            names.sort();
            for name in names {
                let collection = schema.models[name].collection.as_deref().unwrap_or(name);
                println!("{name} -> {collection}");
            }
        }
        Command::Fields { model } => {
            let def = schema
                .models
                .get(model)
                .ok_or_else(|| CrudkitError::ModelNotFound(model.clone()))?;
            let rendered = match cli.format {
                OutputFormat::Yaml => serde_yaml::to_string(&def.fields)?,
                OutputFormat::Json => serde_json::to_string_pretty(&def.fields)?,
            };
            println!("{}", rendered.trim_end());
        }
    }

    Ok(())
}
