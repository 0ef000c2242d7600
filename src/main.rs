use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tool_runner::config::{Cli, Commands, OutputFormat, RunnerConfig};
use tool_runner::discovery::{self, Locator};
use tool_runner::invoker::ToolInvoker;
use tool_runner::junit::JunitReporter;
use tool_runner::preflight;
use tool_runner::provision::{Initializer, Provisioner};
use tool_runner::registry::ToolRegistry;
use tool_runner::reporter::{HumanReporter, JsonReporter, MultiReporter, Reporter};
use tool_runner::scheduler::InitScheduler;
use tool_runner::signals;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = signals::install_signal_handlers() {
        tracing::warn!("Failed to install signal handlers: {}", e);
    }

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => discovery::resolve_repo_root().context("Failed to resolve repository root")?,
    };
    let config = RunnerConfig::load(&root)?;
    config.apply_env();

    let workers = cli.workers.unwrap_or(config.workers);
    let locator = Locator::new(&root, &config.provisioner.root_file);
    let command = cli.command.clone().unwrap_or(Commands::Init);

    // Listing commands do no work, so they skip the preflight
    let needs_preflight = !matches!(command, Commands::Tools | Commands::Cases);
    if needs_preflight && !cli.no_preflight {
        preflight::check(&preflight::default_probes(&config.provisioner))?;
    }

    let registry = ToolRegistry::discover(&config.provisioner)?;
    let provisioner = Arc::new(Provisioner::new(config.provisioner.clone()));

    match command {
        Commands::Init => {
            InitScheduler::new(provisioner, workers).run_pass(&locator)?;
        }
        Commands::Run { tool, init, strict } => {
            if init {
                InitScheduler::new(provisioner, workers).run_pass(&locator)?;
            }

            let mut reporter = build_reporter(&cli);
            let report = ToolInvoker::new(&registry, &locator).run(&tool, reporter.as_mut())?;

            if strict && !report.all_passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Tools => {
            for tool in registry.iter() {
                println!("{}\t{}", tool.name(), tool.pretty_name());
            }
        }
        Commands::Cases => {
            let mut cases = locator.locate()?;
            cases.sort();
            for case in &cases {
                println!(
                    "{}\t{}",
                    provisioner.state(case).as_str(),
                    locator.case_id(case)
                );
            }
        }
        Commands::Version { tool } => {
            let tool = registry.get(&tool)?;
            let version = tool
                .version()
                .with_context(|| format!("Could not read {} version", tool.pretty_name()))?;
            println!("{} {}", tool.pretty_name(), version);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_reporter(cli: &Cli) -> Box<dyn Reporter> {
    let primary: Box<dyn Reporter> = match cli.format {
        OutputFormat::Human => Box::new(HumanReporter::default()),
        OutputFormat::Json => Box::new(JsonReporter),
    };

    match &cli.junit_xml {
        Some(path) => Box::new(MultiReporter::new(vec![
            primary,
            Box::new(JunitReporter::new(path.clone())),
        ])),
        None => primary,
    }
}
