//! `bci run`: bisect a revision range with isolated workers.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::lineage::LineageOutput;
use super::LineageSelection;
use crate::adapters::{DockerCliRuntime, SnapshotAvailability, SqliteResultStore};
use crate::cli::output::{output, CommandOutput};
use crate::cli::progress::track_events;
use crate::cli::table::TableFormatter;
use crate::domain::models::{BrowserConfigOption, Config, EvalParams};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    DispatcherSettings, SearchOptions, SearchOrchestrator, SearchReport, StrategyKind,
    WorkerDispatcher,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: LineageSelection,

    /// Search strategy: bin_seq, bin_search or comp_search
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Maximum number of concurrent workers
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Number of samples taken by the fixed-sampling pass
    #[arg(long)]
    pub sequence_limit: Option<usize>,

    /// Branching factor of the adaptive search (defaults to the concurrency)
    #[arg(long)]
    pub branching_factor: Option<usize>,

    /// Evaluation framework run by the worker
    #[arg(long)]
    pub framework: String,

    /// Browser automation used by the worker
    #[arg(long)]
    pub automation: String,

    /// Browser under test
    #[arg(long)]
    pub browser: String,

    /// Browser configuration: default, btpc, tp, no-tp, pb, allow-java-applets
    #[arg(long, default_value = "default")]
    pub config_option: String,

    /// Mechanism group whose results decide the outcome (repeatable)
    #[arg(long = "mech-group", required = true)]
    pub mech_groups: Vec<String>,

    /// Mechanism id of the outcome
    #[arg(long)]
    pub mech_id: Option<String>,

    /// Extension loaded into the browser
    #[arg(long)]
    pub extension: Option<String>,

    /// Extra browser command-line option (repeatable)
    #[arg(long = "cli-option", allow_hyphen_values = true)]
    pub cli_options: Vec<String>,

    /// Cookie whose presence decides the outcome
    #[arg(long)]
    pub cookie_name: Option<String>,
}

impl RunArgs {
    /// Command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(ref strategy) = self.strategy {
            config.search.strategy = strategy.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.search.concurrency = concurrency;
        }
        if let Some(limit) = self.sequence_limit {
            config.search.sequence_limit = limit;
        }
        if self.branching_factor.is_some() {
            config.search.branching_factor = self.branching_factor;
        }
        ConfigLoader::validate(config).context("Invalid run options")?;
        Ok(())
    }

    pub fn eval_params(&self) -> Result<EvalParams> {
        let params = EvalParams {
            framework_name: self.framework.clone(),
            automation: self.automation.clone(),
            browser: self.browser.clone(),
            configuration: self.config_option.parse::<BrowserConfigOption>()?,
            mech_id: self.mech_id.clone(),
            mech_groups: self.mech_groups.clone(),
            extension_name: self.extension.clone(),
            additional_cli_args: self.cli_options.clone(),
            cookie_name: self.cookie_name.clone(),
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub report: SearchReport,
    pub lineage: LineageOutput,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n{}",
            self.lineage.to_human(),
            TableFormatter::new().format_report(&self.report)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply_overrides(&mut config)?;
    let params = args.eval_params()?;
    let mut lineage = args.selection.build_lineage()?;

    let kind: StrategyKind = config.search.strategy.parse()?;
    let options = SearchOptions::new(
        kind,
        config.search.concurrency,
        config.search.sequence_limit,
    )
    .with_branching_factor(config.search.effective_branching_factor());

    let store = SqliteResultStore::connect(&config.results.database_path).await?;
    let oracle = SnapshotAvailability::new(&config.availability)?;
    let runtime = DockerCliRuntime::new(config.dispatcher.clone());
    let dispatcher = WorkerDispatcher::new(
        Arc::new(runtime),
        config.search.concurrency,
        DispatcherSettings::from(&config.dispatcher),
    );

    let mut orchestrator = SearchOrchestrator::new(params, Arc::new(store), dispatcher);
    let progress = if json_mode {
        None
    } else {
        let (tx, rx) = mpsc::unbounded_channel();
        orchestrator = orchestrator.with_events(tx);
        Some(track_events(rx))
    };

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, waiting for running workers");
            stop.request_stop();
        }
    });

    info!(
        revisions = lineage.len(),
        strategy = %kind,
        concurrency = config.search.concurrency,
        "starting search"
    );
    let report = orchestrator
        .run_search(&mut lineage, Arc::new(oracle), &options)
        .await;

    // Closes the event channel so the spinner finishes.
    drop(orchestrator);
    if let Some(progress) = progress {
        progress.await.context("Progress display task failed")?;
    }

    let report = report?;
    output(
        &RunOutput {
            report,
            lineage: LineageOutput::from(&lineage),
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::cli::Commands;
    use clap::Parser;

    fn parse(args: &[&str]) -> RunArgs {
        let mut argv = vec!["bci", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(run) => run,
            other => panic!("unexpected command {other:?}"),
        }
    }

    const REQUIRED: [&str; 8] = [
        "--framework",
        "custom",
        "--automation",
        "selenium",
        "--browser",
        "chromium",
        "--mech-group",
        "Set-Cookie",
    ];

    #[test]
    fn test_overrides_replace_config_values() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--lower", "1", "--upper", "9", "-s", "bin_search", "-n", "8"]);
        let args = parse(&argv);

        let mut config = Config::default();
        args.apply_overrides(&mut config).unwrap();
        assert_eq!(config.search.strategy, "bin_search");
        assert_eq!(config.search.concurrency, 8);
        assert_eq!(config.search.effective_branching_factor(), 8);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--lower", "1", "--upper", "9", "--branching-factor", "1"]);
        let args = parse(&argv);
        assert!(args.apply_overrides(&mut Config::default()).is_err());
    }

    #[test]
    fn test_eval_params_from_flags() {
        let mut argv = REQUIRED.to_vec();
        argv.extend([
            "--lower",
            "1",
            "--upper",
            "9",
            "--config-option",
            "no-tp",
            "--mech-group",
            "Referer",
            "--cli-option",
            "--headless",
        ]);
        let params = parse(&argv).eval_params().unwrap();
        assert_eq!(params.configuration, BrowserConfigOption::NoTp);
        assert_eq!(params.mech_groups, vec!["Set-Cookie", "Referer"]);
        assert_eq!(params.additional_cli_args, vec!["--headless"]);
    }

    #[test]
    fn test_unknown_config_option_fails() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--lower", "1", "--upper", "9", "--config-option", "turbo"]);
        assert!(parse(&argv).eval_params().is_err());
    }
}
