mod cli;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, PlanArgs, RulesArgs, SourceArgs};
use tira::reconcile::{self, DivisionInput};
use tira::sources::{
    CloudActorSource, FsArtifactSink, FsCloudActorSource, FsInventorySource, FsStateSource,
    MappingOracle, OfflineOracle, discover_divisions,
};
use tira::{Engine, ReconcileConfig, RunReport, TiraError, WorkspaceOracle, output, providers};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, aborting run");
            Err(TiraError::Cancelled.into())
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Plan(args) => plan(args).await,
        Command::Classify(args) => classify(args.source).await,
        Command::Rules(args) => list_rules(&args),
    }
}

async fn plan(args: PlanArgs) -> Result<()> {
    let (config, inputs) = load_inputs(&args.source).await?;
    let oracle = load_oracle(&args).await;

    let report = run_engine(Engine::new(config.watch.clone(), oracle), inputs).await?;
    print_report(&report);
    write_report(args.source.report.as_deref(), &report).await?;

    let run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let format = args.format.unwrap_or(config.format);
    let sink = FsArtifactSink::new(args.out_dir.clone(), config.workspace_directories.clone());

    let written = reconcile::write_artifacts(&report.plan, &run_id, format, &sink)
        .await
        .map_err(TiraError::from)?;

    tracing::info!(
        %run_id,
        artifacts = written,
        directives = report.plan.directive_count(),
        "plan complete"
    );
    Ok(())
}

async fn classify(source: SourceArgs) -> Result<()> {
    let (config, inputs) = load_inputs(&source).await?;
    let engine = Engine::new(
        config.watch,
        Arc::new(OfflineOracle::new("import planning disabled")),
    )
    .classify_only();

    let report = run_engine(engine, inputs).await?;
    print_report(&report);
    write_report(source.report.as_deref(), &report).await?;
    Ok(())
}

fn list_rules(args: &RulesArgs) -> Result<()> {
    let provider = providers::get_provider(&args.provider)?;
    for resource_type in provider.resource_types() {
        println!("{}", resource_type);
    }
    Ok(())
}

async fn load_inputs(source: &SourceArgs) -> Result<(ReconcileConfig, Vec<DivisionInput>)> {
    let config = ReconcileConfig::load(source.config.as_deref()).await?;
    let divisions = select_divisions(source, &config).await?;
    if divisions.is_empty() {
        tracing::warn!("no divisions to reconcile");
    }

    let state = FsStateSource::new(source.state_dir.clone());
    let inventory = FsInventorySource::new(source.inventory_dir.clone());
    let actors = source.actions_dir.clone().map(FsCloudActorSource::new);
    let inputs = reconcile::collect_inputs(
        &divisions,
        &state,
        &inventory,
        actors.as_ref().map(|source| source as &dyn CloudActorSource),
    )
    .await
    .map_err(TiraError::from)?;

    tracing::info!(divisions = inputs.len(), "inputs collected");
    Ok((config, inputs))
}

/// `--division` flags win over the config file; with neither, every
/// division directory on disk is used.
async fn select_divisions(
    source: &SourceArgs,
    config: &ReconcileConfig,
) -> Result<BTreeSet<String>, TiraError> {
    if !source.divisions.is_empty() {
        return Ok(source.divisions.iter().cloned().collect());
    }
    if !config.divisions.is_empty() {
        return Ok(config.divisions.iter().cloned().collect());
    }
    Ok(discover_divisions(&[source.state_dir.as_path(), source.inventory_dir.as_path()]).await?)
}

async fn load_oracle(args: &PlanArgs) -> Arc<dyn WorkspaceOracle> {
    let Some(path) = &args.assignments else {
        return Arc::new(MappingOracle::new(BTreeMap::new(), args.default_workspace.clone()));
    };

    match MappingOracle::from_path(path, args.default_workspace.clone()).await {
        Ok(oracle) => Arc::new(oracle),
        Err(error) => {
            tracing::warn!(%error, "workspace mapping unavailable, new resources will be deferred");
            Arc::new(OfflineOracle::new(error.to_string()))
        }
    }
}

async fn run_engine(engine: Engine, inputs: Vec<DivisionInput>) -> Result<RunReport, TiraError> {
    let report = tokio::task::spawn_blocking(move || engine.reconcile(inputs)).await?;

    for outcome in report.failed_divisions() {
        tracing::warn!(division = %outcome.division, "division failed, see report");
    }
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!("{}", output::summary_table(report));
    if let Some(actors) = output::actor_table(report) {
        println!("{}", actors);
    }
    if let Some(details) = output::detail_tree(report) {
        println!("{}", details);
    }
}

async fn write_report(path: Option<&Path>, report: &RunReport) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;

    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
