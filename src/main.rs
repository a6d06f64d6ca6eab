use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aip_core::batch::{BatchCoordinator, ProgressMonitor};
use aip_core::builder::PackageBuilder;
use aip_core::config::{AipConfig, BatchOptions, default_max_workers, resolve_schema_dir};
use aip_core::constants::{
    DEFAULT_AGENCY_CODE, DEFAULT_AGENT_VERSION, DEFAULT_CHUNK_SIZE,
    DEFAULT_ORGANIZATION_NAME, DEFAULT_TIMEOUT_PER_RECORD_SECS, OUTPUT_DIR_PREFIX,
};
use aip_core::grouping::{FileGrouper, GroupingOutcome, Severity};
use aip_core::manifest::load_records;
use aip_core::metadata::MetadataGenerator;
use aip_core::model::Record;
use aip_core::validator::{ValidationResult, Validator};
use aip_core::PdfInspector;

const DEFAULT_MANIFEST_PATH: &str = "data/input/records.yaml";
const DEFAULT_POOL_ROOT: &str = "data/input/PDF_Files";
const DEFAULT_OUTPUT_PARENT: &str = "data";

#[derive(Parser)]
#[command(name = "aip")]
#[command(about = "Archival Information Package builder and validator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Group the content pool into record folders and report what matched
    Group {
        /// Records manifest (YAML or JSON)
        #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,
        /// Root directory of the content pool
        #[arg(long, default_value = DEFAULT_POOL_ROOT)]
        pool_root: PathBuf,
        /// Print the full grouping outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the package for a single record
    Build {
        /// Identifier of the record to build
        record_id: String,
        /// Records manifest (YAML or JSON)
        #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,
        /// Root directory of the content pool
        #[arg(long, default_value = DEFAULT_POOL_ROOT)]
        pool_root: PathBuf,
        /// Output directory (default: data/output_<timestamp>)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Remove the package directory once the archive is written
        #[arg(long)]
        cleanup: bool,
        /// Validate the package before cleanup
        #[arg(long)]
        validate: bool,
        /// Print the build result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build packages for every record matched to a pool folder
    BatchBuild {
        /// Records manifest (YAML or JSON)
        #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,
        /// Root directory of the content pool
        #[arg(long, default_value = DEFAULT_POOL_ROOT)]
        pool_root: PathBuf,
        /// Output directory (default: data/output_<timestamp>)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Concurrent chunks (default: twice the cores, at most 8)
        #[arg(long)]
        workers: Option<usize>,
        /// Records per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Time budget per record, in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_PER_RECORD_SECS)]
        timeout_secs: u64,
        /// Stop submitting chunks after the first failed record
        #[arg(long)]
        fail_fast: bool,
        /// Skip validating each package after it is built
        #[arg(long)]
        no_validate: bool,
        /// Remove package directories once their archives are written
        #[arg(long)]
        cleanup: bool,
        /// Build only the first N matched records
        #[arg(long)]
        limit: Option<usize>,
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate one package or every package under a directory
    Validate {
        /// A single package directory
        #[arg(long, conflicts_with = "packages_root", required_unless_present = "packages_root")]
        package_dir: Option<PathBuf>,
        /// Directory whose immediate sub-directories are packages
        #[arg(long)]
        packages_root: Option<PathBuf>,
        /// Recompute content digests against the preservation metadata
        #[arg(long)]
        check_checksums: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Entry point for the `aip` command line tool
///
/// # Environment Variables
/// - `AIP_ORGANIZATION_NAME`: holding organization recorded as creator
/// - `AIP_AGENCY_CODE`: agency code used in object identifiers (default: "HTJSC")
/// - `AIP_AGENT_NAME`: software agent recorded in headers and events
/// - `AIP_SCHEMA_DIR`: directory holding mets.xsd, ead.xsd and premis.xsd
/// - `RUST_LOG`: log filter, added to the default `aip=info`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("aip=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Group {
            manifest,
            pool_root,
            json,
        }) => {
            let config = load_config(false)?;
            let (records, outcome) = group_records(&manifest, &pool_root, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_grouping(&records, &outcome);
            }
            if outcome.has_errors() {
                anyhow::bail!("grouping reported errors");
            }
        }
        Some(Commands::Build {
            record_id,
            manifest,
            pool_root,
            output_dir,
            cleanup,
            validate,
            json,
        }) => {
            let config = load_config(cleanup)?;
            let (records, _) = group_records(&manifest, &pool_root, &config)?;
            let mut record = records
                .into_iter()
                .find(|r| r.record_id() == record_id)
                .ok_or_else(|| anyhow::anyhow!("record {} is not in the manifest", record_id))?;

            let output_root = output_dir.unwrap_or_else(timestamped_output_dir);
            let builder = package_builder(config).with_validator(validate.then(Validator::new));
            let result = builder.build_package(&mut record, &pool_root, &output_root);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.success {
                println!(
                    "Built {} ({} files, {} bytes archived)",
                    result
                        .archive_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    result.files_copied,
                    result.archive_size_bytes
                );
                for outcome in result.item_outcomes.iter().filter(|o| !o.copied()) {
                    println!(
                        "  item {} not copied: {}",
                        outcome.sequence_number,
                        outcome.error.as_deref().unwrap_or_default()
                    );
                }
                if let Some(validation) = &result.validation {
                    print_validation(&record_id, validation);
                }
            }

            if !result.success {
                anyhow::bail!(
                    "build failed at {}: {}",
                    result
                        .failed_stage
                        .map(|stage| stage.to_string())
                        .unwrap_or_else(|| "start".into()),
                    result.error.unwrap_or_default()
                );
            }
        }
        Some(Commands::BatchBuild {
            manifest,
            pool_root,
            output_dir,
            workers,
            chunk_size,
            timeout_secs,
            fail_fast,
            no_validate,
            cleanup,
            limit,
            json,
        }) => {
            let config = load_config(cleanup)?;
            let (records, outcome) = group_records(&manifest, &pool_root, &config)?;
            for id in &outcome.unmatched_records {
                tracing::warn!(record_id = %id, "record has no matching folder, not building");
            }
            let records: Vec<Record> = records
                .into_iter()
                .filter(|r| !r.items().is_empty())
                .collect();

            let options = BatchOptions {
                max_workers: workers.unwrap_or_else(default_max_workers),
                chunk_size,
                timeout_per_record: Duration::from_secs(timeout_secs),
                continue_on_error: !fail_fast,
                validate_after_build: !no_validate,
                limit,
            };
            let coordinator = BatchCoordinator::new(package_builder(config), options)?;
            let _monitor = ProgressMonitor::attach(coordinator.progress());

            let output_root = output_dir.unwrap_or_else(timestamped_output_dir);
            tracing::info!(
                records = records.len(),
                output = %output_root.display(),
                "starting batch build"
            );
            let report = coordinator.run(records, &pool_root, &output_root).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
                println!("Output: {}", output_root.display());
            }
            if report.failed > 0 || report.halted.is_some() {
                anyhow::bail!("{} of {} records failed", report.failed, report.total);
            }
        }
        Some(Commands::Validate {
            package_dir,
            packages_root,
            check_checksums,
            json,
        }) => {
            let validator = Validator::new().with_checksums(check_checksums);

            let all_valid = match (package_dir, packages_root) {
                (Some(dir), _) => {
                    let result = validator.validate_package(&dir);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        print_validation(&dir.display().to_string(), &result);
                    }
                    result.is_valid()
                }
                (None, Some(root)) => {
                    let aggregate = validator.validate_all(&root)?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&aggregate)?);
                    } else {
                        for (name, result) in &aggregate.results {
                            print_validation(name, result);
                        }
                        println!(
                            "{} packages: {} valid, {} invalid ({} errors, {} warnings)",
                            aggregate.total,
                            aggregate.valid,
                            aggregate.invalid,
                            aggregate.total_errors,
                            aggregate.total_warnings
                        );
                    }
                    aggregate.all_valid()
                }
                (None, None) => anyhow::bail!("either --package-dir or --packages-root is required"),
            };

            if !all_valid {
                anyhow::bail!("validation failed");
            }
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Resolve package-building configuration from the environment, once.
fn load_config(cleanup: bool) -> anyhow::Result<AipConfig> {
    let organization = std::env::var("AIP_ORGANIZATION_NAME")
        .unwrap_or_else(|_| DEFAULT_ORGANIZATION_NAME.into());
    let agency_code =
        std::env::var("AIP_AGENCY_CODE").unwrap_or_else(|_| DEFAULT_AGENCY_CODE.into());

    let mut config = AipConfig::new(organization, Some(agency_code))?;
    if let Ok(agent_name) = std::env::var("AIP_AGENT_NAME") {
        config = config.with_agent(agent_name, DEFAULT_AGENT_VERSION)?;
    }

    let schema_dir = resolve_schema_dir(std::env::var_os("AIP_SCHEMA_DIR").map(PathBuf::from))?;
    if schema_dir.is_none() {
        tracing::warn!("no schema directory found, packages will carry placeholder schemas");
    }

    Ok(config.with_schema_dir(schema_dir).with_cleanup(cleanup))
}

fn group_records(
    manifest: &Path,
    pool_root: &Path,
    config: &AipConfig,
) -> anyhow::Result<(Vec<Record>, GroupingOutcome)> {
    let mut records = load_records(manifest, config)?;
    let outcome = FileGrouper::new(pool_root)?.group_by_folder(&mut records)?;
    tracing::info!(
        records = records.len(),
        folders = outcome.groups.len(),
        unmatched_records = outcome.unmatched_records.len(),
        unmatched_folders = outcome.unmatched_folders.len(),
        "grouped content pool"
    );
    Ok((records, outcome))
}

fn package_builder(config: AipConfig) -> PackageBuilder {
    PackageBuilder::new(
        Arc::new(config),
        Arc::new(PdfInspector),
        MetadataGenerator::default(),
    )
}

fn timestamped_output_dir() -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Path::new(DEFAULT_OUTPUT_PARENT).join(format!("{}{}", OUTPUT_DIR_PREFIX, timestamp))
}

fn print_grouping(records: &[Record], outcome: &GroupingOutcome) {
    for group in outcome.groups.values() {
        match &group.record_id {
            Some(id) => println!(
                "{} -> record {} ({} files)",
                group.folder_name,
                id,
                group.files.len()
            ),
            None => println!("{} -> unmatched ({} files)", group.folder_name, group.files.len()),
        }
    }

    for severity in [Severity::Error, Severity::Warning] {
        for diagnostic in outcome.diagnostics_at(severity) {
            println!("{:?}: {}", severity, diagnostic.message);
        }
    }

    let matched = records.iter().filter(|r| !r.items().is_empty()).count();
    println!(
        "{} of {} records matched, {} folders unmatched, {} skipped",
        matched,
        records.len(),
        outcome.unmatched_folders.len(),
        outcome.skipped_folders.len()
    );
}

fn print_validation(name: &str, result: &ValidationResult) {
    println!(
        "{}: {} ({} files, {} bytes)",
        name,
        if result.is_valid() { "valid" } else { "INVALID" },
        result.checked_files(),
        result.total_size()
    );
    for error in result.errors() {
        println!("  error: {}", error);
    }
    for warning in result.warnings() {
        println!("  warning: {}", warning);
    }
}
