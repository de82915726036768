use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xosc_pipeline::{
    build_dataset, check_dataset, collect_stats, describe_dir, resolve_dataset_path,
    reverse_dataset, tag_usage, BatchRunner, ChatClient, PipelineConfig, Stage, ValidatorKind,
};
use xosc_transform::{declared_elements, ValidationGate};

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn batch_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(path_arg("input", "Directory of .xosc documents"))
        .arg(path_arg("output", "Directory for accepted documents"))
}

fn cli() -> Command {
    Command::new("xosc")
        .version(xosc_model::VERSION)
        .about("Scenario-document transformation and dataset curation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("XSD schema, overrides the configured path"),
        )
        .arg(
            Arg::new("validator")
                .long("validator")
                .global(true)
                .value_parser(value_parser!(ValidatorKind))
                .help("Schema validator: xmllint or vocabulary"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(batch_command("filter", "Keep documents that validate, unchanged"))
        .subcommand(batch_command(
            "reduce",
            "Reduce to ego, one secondary vehicle, pedestrians and one story",
        ))
        .subcommand(
            batch_command("inject", "Apply seeded random mutations").arg(
                Arg::new("seed")
                    .long("seed")
                    .value_parser(value_parser!(u64))
                    .help("Run seed, overrides the configured seed"),
            ),
        )
        .subcommand(
            Command::new("describe")
                .about("Write digest side-cars (<stem>.json, <stem>.txt)")
                .arg(path_arg("input", "Directory of .xosc documents"))
                .arg(path_arg("output", "Directory for digests")),
        )
        .subcommand(
            Command::new("build")
                .about("Describe documents and append dataset records")
                .arg(path_arg("input", "Directory of .xosc documents"))
                .arg(path_arg("output", "Dataset .jsonl file or directory"))
                .arg(
                    Arg::new("errors")
                        .long("errors")
                        .default_value("error_files.txt")
                        .value_parser(value_parser!(PathBuf))
                        .help("File listing documents that could not be described"),
                ),
        )
        .subcommand(
            Command::new("reverse")
                .about("Swap descriptions and documents for the analyst direction")
                .arg(path_arg("input", "Dataset .jsonl file"))
                .arg(path_arg("output", "Output .jsonl file or directory")),
        )
        .subcommand(
            Command::new("check")
                .about("Validate every document held by a dataset")
                .arg(path_arg("input", "Dataset .jsonl file")),
        )
        .subcommand(
            Command::new("stats")
                .about("Entity, time-of-day and weather statistics")
                .arg(path_arg("input", "Directory of .xosc documents")),
        )
        .subcommand(
            Command::new("unused-tags")
                .about("Schema elements the corpus never uses")
                .arg(path_arg("input", "Directory of .xosc documents"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Innermost matches, where global flags land
fn scoped(matches: &ArgMatches) -> &ArgMatches {
    matches.subcommand().map_or(matches, |(_, args)| args)
}

fn load_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    let matches = scoped(matches);
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(schema) = matches.get_one::<PathBuf>("schema") {
        config = config.with_schema_path(schema);
    }
    if let Some(kind) = matches.get_one::<ValidatorKind>("validator") {
        config = config.with_validator(*kind);
    }
    Ok(config)
}

fn path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing --{name}"))
}

fn run_batch(config: &PipelineConfig, stage: Stage, args: &ArgMatches) -> Result<()> {
    let gate = ValidationGate::new(config.build_validator());
    let runner = BatchRunner::new(gate, config.injection.clone())?;
    let report = runner.run(stage, path(args, "input")?, path(args, "output")?)?;
    println!("{report}");
    Ok(())
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    match matches.subcommand() {
        Some(("filter", args)) => run_batch(&config, Stage::Filter, args),
        Some(("reduce", args)) => run_batch(&config, Stage::Reduce, args),
        Some(("inject", args)) => {
            let seed = args.get_one::<u64>("seed").copied().unwrap_or(config.seed);
            run_batch(&config, Stage::Inject { seed }, args)
        }
        Some(("describe", args)) => {
            let report = describe_dir(path(args, "input")?, path(args, "output")?)?;
            println!("{report}");
            Ok(())
        }
        Some(("build", args)) => {
            let client = ChatClient::from_config(&config.llm)?;
            let dataset = resolve_dataset_path(path(args, "output")?);
            let report =
                build_dataset(&client, path(args, "input")?, &dataset, path(args, "errors")?)
                    .await?;
            println!(
                "Total: {}\nWritten: {}\nAlready present: {}\nErrors: {}",
                report.total,
                report.written,
                report.skipped,
                report.errors.len()
            );
            Ok(())
        }
        Some(("reverse", args)) => {
            let output = resolve_dataset_path(path(args, "output")?);
            let report = reverse_dataset(path(args, "input")?, &output)?;
            println!(
                "Read: {}\nWritten: {} -> {}",
                report.total,
                report.written,
                output.display()
            );
            Ok(())
        }
        Some(("check", args)) => {
            let gate = ValidationGate::new(config.build_validator());
            let report = check_dataset(&gate, path(args, "input")?)?;
            println!(
                "Total: {}\nValid: {}\nInvalid: {}\nSkipped: {}\nMalformed: {}",
                report.total, report.valid, report.invalid, report.skipped, report.malformed
            );
            Ok(())
        }
        Some(("stats", args)) => {
            println!("{}", collect_stats(path(args, "input")?)?);
            Ok(())
        }
        Some(("unused-tags", args)) => {
            let schema = std::fs::read_to_string(&config.schema_path)
                .with_context(|| format!("reading schema {}", config.schema_path.display()))?;
            let declared = declared_elements(&schema)?;
            let report = tag_usage(path(args, "input")?, &declared)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(())
        }
        _ => anyhow::bail!("unknown command"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(scoped(&matches).get_flag("verbose"));
    if let Err(err) = run(&matches).await {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_override_config() {
        let matches = cli()
            .try_get_matches_from([
                "xosc",
                "filter",
                "--input",
                "in",
                "--output",
                "out",
                "--schema",
                "other.xsd",
                "--validator",
                "vocabulary",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.schema_path, PathBuf::from("other.xsd"));
        assert_eq!(config.validator, ValidatorKind::Vocabulary);
    }

    #[test]
    fn inject_seed_is_optional() {
        let matches = cli()
            .try_get_matches_from(["xosc", "inject", "--input", "a", "--output", "b"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<u64>("seed"), None);
    }
}
