//! GRIB2 dataset assembler.
//!
//! Lists and writes inventories, builds templates from a complete model
//! run, and assembles datasets over many runs, optionally writing them to a
//! Zarr store.

mod files;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use grib2_dataset::{
    inventory_path, load_or_make_inventory, make_inventory, make_template, open_dataset,
    read_inventory_file, save_inventory, write_zarr, AssemblyConfig, Inventory, NativeDecoder,
    ProcessingTable, SelectionConfig, Selector, Template, VertLevelClass, ZarrOptions,
    INVENTORY_SUFFIX,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use files::{collect_grib_files, collect_inventory_files};

#[derive(Parser, Debug)]
#[command(name = "assembler")]
#[command(about = "Assemble GRIB2 model runs into labeled datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Inventory directory (default: next to each GRIB2 file)
    #[arg(long, global = true)]
    inv_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the inventory of each file
    List {
        /// GRIB2 files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print saved inventory files without reading the GRIB2 files
    CatInv {
        /// Inventory files, or GRIB2 files whose inventories were saved
        inputs: Vec<PathBuf>,

        /// Directory to search for inventory files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Search subdirectories of --dir
        #[arg(short, long)]
        recursive: bool,
    },

    /// Scan files and write their inventories
    MakeInv {
        /// GRIB2 files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Build a template from one complete model run
    Template {
        /// GRIB2 files or directories of the run
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output path of the template (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Level classes to merge into vertical dimensions (e.g. isobaric,height_agl)
        #[arg(long, value_delimiter = ',')]
        vertlevels: Vec<VertLevelClass>,

        /// Reference time to use when the files hold several runs
        #[arg(long, value_parser = parse_reftime)]
        reftime: Option<DateTime<Utc>>,

        /// Variable selection (YAML)
        #[arg(long)]
        select: Option<PathBuf>,

        /// Statistical processing keywords (YAML)
        #[arg(long)]
        processing: Option<PathBuf>,
    },

    /// Assemble files against a template and print a summary
    Assemble {
        /// Template written by the `template` command
        template: PathBuf,

        /// GRIB2 files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Reference time the dataset must cover (repeatable)
        #[arg(long = "expected-reftime", value_parser = parse_reftime)]
        expected_reftimes: Vec<DateTime<Utc>>,

        /// Chunk size hint, e.g. reftime=1 (repeatable)
        #[arg(long = "chunk", value_parser = parse_chunk)]
        chunks: Vec<(String, usize)>,

        /// Variable selection (YAML) to reattach to the template
        #[arg(long)]
        select: Option<PathBuf>,

        /// Assemble reference times in parallel
        #[arg(long)]
        parallel: bool,

        /// Write the dataset to this Zarr store instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Blosc/zstd compression level of the Zarr store (1-9, 0 to disable)
        #[arg(long, default_value_t = 1)]
        compression_level: u8,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if cli.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let mut config = AssemblyConfig::from_env();
    if cli.inv_dir.is_some() {
        config.inventory_dir = cli.inv_dir;
    }
    let decoder = NativeDecoder::new();

    match cli.command {
        Commands::List { inputs } => {
            for file in collect_grib_files(&inputs) {
                let inventory = load_or_make_inventory(
                    &decoder,
                    &file,
                    config.inventory_dir.as_deref(),
                    config.save_inventory,
                )
                .with_context(|| format!("Failed to inventory {}", file.display()))?;
                println!("# {}", file.display());
                for item in &inventory {
                    println!("{}", item);
                }
            }
        }
        Commands::CatInv {
            inputs,
            dir,
            recursive,
        } => {
            let mut files = match &dir {
                Some(dir) => collect_inventory_files(dir, recursive),
                None => Vec::new(),
            };
            files.extend(inputs);
            if files.is_empty() {
                bail!("No inventory files given");
            }
            for file in files {
                let (path, inventory) =
                    read_saved_inventory(&file, config.inventory_dir.as_deref())?;
                println!("# {}", path.display());
                for item in &inventory {
                    println!("{}", item);
                }
            }
        }
        Commands::MakeInv { inputs } => {
            for file in collect_grib_files(&inputs) {
                let inventory = make_inventory(&decoder, &file)
                    .with_context(|| format!("Failed to scan {}", file.display()))?;
                save_inventory(&inventory, &file, config.inventory_dir.as_deref())?;
                info!(file = %file.display(), messages = inventory.len(), "Wrote inventory");
            }
        }
        Commands::Template {
            inputs,
            output,
            vertlevels,
            reftime,
            select,
            processing,
        } => {
            let selector = load_selector(select.as_ref())?;
            let processing = match processing {
                Some(path) => ProcessingTable::from_yaml_file(&path)?,
                None => ProcessingTable::default(),
            };
            let mut options = config.template_options(vertlevels, processing);
            options.reftime = reftime;

            let files = collect_grib_files(&inputs);
            let Some(template) = make_template(&decoder, &files, &selector, &options)? else {
                bail!("No messages selected from {} files", files.len());
            };
            template.save(&output)?;
            info!(
                path = %output.display(),
                reftime = %template.reftime,
                variables = template.var_specs.len(),
                "Saved template"
            );
        }
        Commands::Assemble {
            template,
            inputs,
            expected_reftimes,
            chunks,
            select,
            parallel,
            output,
            compression_level,
        } => {
            let mut template = Template::load(&template)
                .with_context(|| format!("Failed to load template {}", template.display()))?;
            if select.is_some() {
                template = template.with_selector(load_selector(select.as_ref())?);
            }

            let mut options = config.open_options();
            options.parallel |= parallel;
            options.chunks = chunks.into_iter().collect::<BTreeMap<_, _>>();
            if !expected_reftimes.is_empty() {
                options.expected_reftimes = Some(expected_reftimes);
            }

            let files = collect_grib_files(&inputs);
            if files.is_empty() {
                warn!("No input files found");
            }
            let dataset = open_dataset(&decoder, &files, &template, &options)?;
            match output {
                Some(output) => {
                    let zarr = ZarrOptions {
                        compression_level: (compression_level > 0).then_some(compression_level),
                    };
                    write_zarr(&dataset, &output, &zarr)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    info!(
                        path = %output.display(),
                        reftimes = dataset.reftimes().len(),
                        variables = dataset.data_vars.len(),
                        "Wrote dataset"
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&dataset.summary())?),
            }
        }
    }

    Ok(())
}

/// Read the inventory saved for `file`.
///
/// `file` is either an inventory file itself or a GRIB2 file whose inventory
/// sits next to it or in `inv_dir`.
fn read_saved_inventory(file: &Path, inv_dir: Option<&Path>) -> Result<(PathBuf, Inventory)> {
    let path = if file.to_string_lossy().ends_with(INVENTORY_SUFFIX) {
        file.to_path_buf()
    } else {
        inventory_path(file, inv_dir)
    };
    let inventory = read_inventory_file(&path)
        .with_context(|| format!("Failed to read inventory {}", path.display()))?;
    Ok((path, inventory))
}

fn load_selector(path: Option<&PathBuf>) -> Result<Selector> {
    Ok(match path {
        Some(path) => SelectionConfig::from_yaml_file(path)?.into_selector(),
        None => Selector::new(),
    })
}

/// RFC 3339 timestamp or `YYYYMMDDHH`.
fn parse_reftime(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&format!("{}0000", s), "%Y%m%d%H%M%S")
        .map(|time| time.and_utc())
        .map_err(|_| format!("invalid reference time '{}', expected RFC 3339 or YYYYMMDDHH", s))
}

/// `dimension=size`.
fn parse_chunk(s: &str) -> std::result::Result<(String, usize), String> {
    let (dim, size) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid chunk '{}', expected dimension=size", s))?;
    let size = size
        .parse()
        .map_err(|_| format!("invalid chunk size in '{}'", s))?;
    Ok((dim.to_string(), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_reftime() {
        let expected = Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap();
        assert_eq!(parse_reftime("2020010106").unwrap(), expected);
        assert_eq!(parse_reftime("2020-01-01T06:00:00Z").unwrap(), expected);
        assert!(parse_reftime("yesterday").is_err());
    }

    #[test]
    fn test_parse_chunk() {
        assert_eq!(parse_chunk("reftime=1").unwrap(), ("reftime".to_string(), 1));
        assert!(parse_chunk("reftime").is_err());
        assert!(parse_chunk("reftime=x").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "assembler",
            "template",
            "run/",
            "-o",
            "t.json",
            "--vertlevels",
            "isobaric,height_agl",
            "--reftime",
            "2020010100",
        ])
        .unwrap();
        match cli.command {
            Commands::Template { vertlevels, reftime, .. } => {
                assert_eq!(
                    vertlevels,
                    vec![VertLevelClass::Isobaric, VertLevelClass::HeightAgl]
                );
                assert!(reftime.is_some());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_zarr_output() {
        let cli = Cli::try_parse_from([
            "assembler",
            "assemble",
            "t.json",
            "runs/",
            "--output",
            "runs.zarr",
            "--compression-level",
            "0",
            "--chunk",
            "reftime=1",
        ])
        .unwrap();
        match cli.command {
            Commands::Assemble {
                output,
                compression_level,
                chunks,
                ..
            } => {
                assert_eq!(output, Some(PathBuf::from("runs.zarr")));
                assert_eq!(compression_level, 0);
                assert_eq!(chunks, vec![("reftime".to_string(), 1)]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_read_saved_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run.grib2");
        let err = read_saved_inventory(&file, None).unwrap_err();
        assert!(err.to_string().contains("run.grib2.inv.gz"));

        let hashed = read_saved_inventory(&file, Some(dir.path())).unwrap_err();
        assert!(hashed.to_string().contains(INVENTORY_SUFFIX));
    }
}
