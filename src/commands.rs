//! Command implementations for dbcompare CLI

use crate::checkpoint::FileCheckpointStore;
use crate::cli::{Commands, ConnectionAction, OutputFormat};
use crate::connections::FileConnectionStore;
use crate::duckdb_source::DuckDbSource;
use crate::error::{DbCompareError, Result};
use crate::job::{new_job_id, BatchRequest, JobTracker};
use crate::output::{render_or_placeholder, JsonFormatter, PrettyPrinter};
use crate::progress::{create_spinner, ProgressReporter};
use crate::source::{resolve_connection, ConnectionInfo, DataSource, Driver};
use crate::table_compare::{compare_table_scripts, compare_tables, TableComparisonRequest};
use crate::workspace::{validate_job_id, DbCompareWorkspace};
use anyhow::Context;
use std::path::Path;

/// Execute a command
pub fn execute_command(command: Commands, workspace_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init { force } => init_command(workspace_path, force),
        Commands::Status => status_command(workspace_path),
        Commands::Connection { action } => connection_command(workspace_path, action),
        Commands::Schema {
            source,
            target,
            job_id,
            batch_size,
            format,
            keep_job,
        } => schema_command(
            workspace_path,
            &source,
            &target,
            job_id,
            batch_size,
            &format,
            keep_job,
        ),
        Commands::Batch {
            source,
            target,
            job_id,
            offset,
            limit,
        } => batch_command(workspace_path, &source, &target, job_id, offset, limit),
        Commands::Results { job_id, format } => results_command(workspace_path, &job_id, &format),
        Commands::Cleanup { job_id, force } => cleanup_command(workspace_path, &job_id, force),
        Commands::Jobs { format } => jobs_command(workspace_path, &format),
        Commands::Compare {
            source,
            target,
            table,
            target_table,
            columns,
            data,
            limit,
            format,
        } => {
            let mut request =
                TableComparisonRequest::new(&table).target_table(target_table.unwrap_or(table));
            if let Some(columns) = columns {
                request = request.columns(columns);
            }
            compare_command(workspace_path, &source, &target, request, data, limit, &format)
        }
        Commands::Script {
            source,
            target,
            table,
            target_table,
            format,
        } => {
            let target_table = target_table.unwrap_or_else(|| table.clone());
            script_command(workspace_path, &source, &target, &table, &target_table, &format)
        }
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::parse(format).map_err(DbCompareError::invalid_input)
}

/// Workspace plus the stores kept inside it
struct Session {
    workspace: DbCompareWorkspace,
    connections: FileConnectionStore,
    jobs: FileCheckpointStore,
}

impl Session {
    fn load(workspace_path: Option<&Path>) -> Result<Self> {
        let workspace = DbCompareWorkspace::find_or_create(workspace_path)?;
        let connections = FileConnectionStore::new(workspace.connections_path());
        let jobs = FileCheckpointStore::new(workspace.jobs_dir.clone());
        Ok(Self {
            workspace,
            connections,
            jobs,
        })
    }

    /// Resolve a saved connection into a data source. Relative file paths are
    /// taken relative to the workspace root.
    fn open_source(&self, name: &str) -> Result<DuckDbSource> {
        let mut info = resolve_connection(&self.connections, name)?;
        if info.driver.is_file_based() && Path::new(&info.database).is_relative() {
            info.database = self
                .workspace
                .root
                .join(&info.database)
                .to_string_lossy()
                .into_owned();
        }
        self.connections.touch(name)?;
        Ok(DuckDbSource::new(info))
    }
}

/// Initialize dbcompare workspace
fn init_command(workspace_path: Option<&Path>, force: bool) -> Result<()> {
    let current_dir = std::env::current_dir().context("Cannot determine current directory")?;
    let root = workspace_path.unwrap_or(&current_dir);

    let workspace = if force {
        let workspace = DbCompareWorkspace::from_root(root.to_path_buf())?;
        std::fs::create_dir_all(&workspace.jobs_dir)?;
        workspace.create_config_with_force(true)?;
        workspace.ensure_gitignore()?;
        workspace
    } else {
        // Always initialize here, never in a parent directory's workspace
        DbCompareWorkspace::create_new(root.to_path_buf())?
    };

    println!("✅ Initialized dbcompare workspace at: {}", workspace.root.display());
    println!("📁 Workspace directory: {}", workspace.dbcompare_dir.display());

    Ok(())
}

/// Show workspace statistics
fn status_command(workspace_path: Option<&Path>) -> Result<()> {
    let ctx = Session::load(workspace_path)?;
    let stats = ctx.workspace.stats()?;
    print!(
        "{}",
        render_or_placeholder(PrettyPrinter::format_workspace_stats(&stats))
    );
    Ok(())
}

fn connection_command(workspace_path: Option<&Path>, action: ConnectionAction) -> Result<()> {
    let ctx = Session::load(workspace_path)?;

    match action {
        ConnectionAction::Add {
            name,
            driver,
            database,
            server,
            username,
            password,
            replace,
        } => {
            let driver: Driver = driver.parse()?;
            if !driver.is_file_based() && server.is_empty() {
                return Err(DbCompareError::invalid_input(format!(
                    "A {} connection needs --server",
                    driver
                )));
            }
            let info = ConnectionInfo {
                name: name.clone(),
                server,
                database,
                username,
                password,
                driver,
            };
            ctx.connections.add(info, replace)?;
            println!("✅ Saved connection '{}'", name);
        }
        ConnectionAction::List { format } => {
            let connections = ctx.connections.list()?;
            let rendered = match parse_format(&format)? {
                OutputFormat::Pretty => PrettyPrinter::format_connections(&connections),
                OutputFormat::Json => {
                    // Passwords stay out of listings
                    let redacted: Vec<_> = connections
                        .into_iter()
                        .map(|mut c| {
                            c.info.password.clear();
                            c
                        })
                        .collect();
                    JsonFormatter::format(&redacted)
                }
            };
            println!("{}", render_or_placeholder(rendered).trim_end());
        }
        ConnectionAction::Remove { name } => {
            ctx.connections.remove(&name)?;
            println!("🗑  Removed connection '{}'", name);
        }
        ConnectionAction::Test { name } => {
            let mut source = ctx.open_source(&name)?;
            source.connect()?;
            let tables = source.list_tables()?;
            println!("✅ Connected to '{}': {} tables", name, tables.len());
        }
    }

    Ok(())
}

/// Compare every table's schema, batch by batch, until the job completes
fn schema_command(
    workspace_path: Option<&Path>,
    source: &str,
    target: &str,
    job_id: Option<String>,
    batch_size: Option<usize>,
    format: &str,
    keep_job: bool,
) -> Result<()> {
    let output_format = parse_format(format)?;
    let ctx = Session::load(workspace_path)?;
    let config = ctx.workspace.load_config()?;
    let batch_size = batch_size.unwrap_or(config.default_batch_size);

    let job_id = job_id.unwrap_or_else(new_job_id);
    validate_job_id(&job_id)?;

    let mut source = ctx.open_source(source)?;
    let mut target = ctx.open_source(target)?;
    let tracker = JobTracker::new(&ctx.jobs);

    let mut progress = match output_format {
        OutputFormat::Pretty => ProgressReporter::new_for_job(),
        OutputFormat::Json => ProgressReporter::new_minimal(),
    };

    let outcome = tracker.run_to_completion(&job_id, batch_size, &mut source, &mut target, |r| {
        progress.update_tables(r.processed_tables, r.total_tables)
    });
    if let Err(e) = outcome {
        progress.finish_all("failed");
        drop(progress);
        eprintln!(
            "Job '{}' stopped; rerun with --job-id {} to resume",
            job_id, job_id
        );
        return Err(e);
    }
    progress.finish_all("done");
    drop(progress);

    let job = tracker.load_job(&job_id)?;
    let rendered = match output_format {
        OutputFormat::Pretty => PrettyPrinter::format_job_results(&job),
        OutputFormat::Json => JsonFormatter::format(&job),
    };
    println!("{}", render_or_placeholder(rendered).trim_end());

    if !keep_job {
        tracker.cleanup(&job_id)?;
    }

    Ok(())
}

/// Apply a single batch, always answering with a JSON response
fn batch_command(
    workspace_path: Option<&Path>,
    source: &str,
    target: &str,
    job_id: String,
    offset: usize,
    limit: Option<usize>,
) -> Result<()> {
    let ctx = Session::load(workspace_path)?;
    let limit = match limit {
        Some(limit) => limit,
        None => ctx.workspace.load_config()?.default_batch_size,
    };

    let mut source = ctx.open_source(source)?;
    let mut target = ctx.open_source(target)?;
    let tracker = JobTracker::new(&ctx.jobs);

    let request = BatchRequest {
        job_id,
        offset,
        limit,
    };
    let response = tracker.respond(&request, &mut source, &mut target);
    println!("{}", render_or_placeholder(JsonFormatter::format(&response)));

    Ok(())
}

fn results_command(workspace_path: Option<&Path>, job_id: &str, format: &str) -> Result<()> {
    let output_format = parse_format(format)?;
    let ctx = Session::load(workspace_path)?;
    let tracker = JobTracker::new(&ctx.jobs);

    let rendered = match output_format {
        OutputFormat::Pretty => {
            // Fails on incomplete jobs
            tracker.results(job_id)?;
            PrettyPrinter::format_job_results(&tracker.load_job(job_id)?)
        }
        OutputFormat::Json => JsonFormatter::format(&tracker.results(job_id)?),
    };
    println!("{}", render_or_placeholder(rendered).trim_end());

    Ok(())
}

fn cleanup_command(workspace_path: Option<&Path>, job_id: &str, force: bool) -> Result<()> {
    let ctx = Session::load(workspace_path)?;
    if force {
        ctx.jobs.break_lease(job_id)?;
    }

    JobTracker::new(&ctx.jobs).cleanup(job_id)?;
    println!("🗑  Removed comparison job '{}'", job_id);
    Ok(())
}

fn jobs_command(workspace_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = parse_format(format)?;
    let ctx = Session::load(workspace_path)?;
    let jobs = JobTracker::new(&ctx.jobs).list_jobs()?;

    let rendered = match output_format {
        OutputFormat::Pretty => PrettyPrinter::format_job_list(&jobs),
        OutputFormat::Json => JsonFormatter::format(&jobs),
    };
    println!("{}", render_or_placeholder(rendered).trim_end());
    Ok(())
}

/// Compare one table's schema and optionally a data sample
fn compare_command(
    workspace_path: Option<&Path>,
    source: &str,
    target: &str,
    mut request: TableComparisonRequest,
    data: bool,
    limit: Option<usize>,
    format: &str,
) -> Result<()> {
    let output_format = parse_format(format)?;
    let ctx = Session::load(workspace_path)?;
    if data {
        let limit = match limit {
            Some(limit) => limit,
            None => ctx.workspace.load_config()?.default_row_limit,
        };
        request = request.with_data(limit);
    }

    let mut source = ctx.open_source(source)?;
    let mut target = ctx.open_source(target)?;

    let spinner = (output_format == OutputFormat::Pretty).then(|| {
        create_spinner(&format!(
            "Comparing {} with {}...",
            request.source_table, request.target_table
        ))
    });
    let comparison = compare_tables(&mut source, &mut target, &request);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let comparison = comparison?;

    let rendered = match output_format {
        OutputFormat::Pretty => PrettyPrinter::format_table_comparison(&comparison),
        OutputFormat::Json => JsonFormatter::format(&comparison),
    };
    println!("{}", render_or_placeholder(rendered).trim_end());
    Ok(())
}

/// Diff the generated DDL of one table
fn script_command(
    workspace_path: Option<&Path>,
    source: &str,
    target: &str,
    source_table: &str,
    target_table: &str,
    format: &str,
) -> Result<()> {
    let output_format = parse_format(format)?;
    let ctx = Session::load(workspace_path)?;

    let mut source = ctx.open_source(source)?;
    let mut target = ctx.open_source(target)?;
    let diff = compare_table_scripts(&mut source, &mut target, source_table, target_table)?;

    let rendered = match output_format {
        OutputFormat::Pretty => PrettyPrinter::format_script_diff(&diff),
        OutputFormat::Json => JsonFormatter::format(&diff),
    };
    println!("{}", render_or_placeholder(rendered).trim_end());
    Ok(())
}
