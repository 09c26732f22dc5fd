use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use mftsift::cli::{Cli, EXIT_FATAL_PARSE, EXIT_INPUT_IO, EXIT_OUTPUT_IO, EXIT_USAGE};
use mftsift::config::AnalysisConfig;
use mftsift::errors::MftError;
use mftsift::mft::parser::{Analysis, CancelToken, MftParser};
use mftsift::output::write_output;
use mftsift::rules::PathFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code as u8),
    }
}

fn run(cli: &Cli) -> Result<(), i32> {
    let started = Instant::now();

    let mut config = AnalysisConfig::from_profile(cli.profile);
    if let Some(path) = &cli.config {
        config.apply_file(path).map_err(|err| {
            error!("cannot load config {}: {err}", path.display());
            EXIT_USAGE
        })?;
    }
    cli.apply_to_config(&mut config);

    let filter = PathFilter::from_patterns(&config.file_types_include, &config.file_types_exclude)
        .map_err(|err| {
            error!("bad filename filter pattern: {err}");
            EXIT_USAGE
        })?;

    let cancel = CancelToken::new();
    let mut parser =
        MftParser::open(&cli.input, config.clone(), cancel).map_err(|err| match err {
            MftError::Io(err) => {
                error!("cannot open {}: {err}", cli.input.display());
                EXIT_INPUT_IO
            }
            err => {
                error!("{} is not an MFT image: {err}", cli.input.display());
                EXIT_FATAL_PARSE
            }
        })?;

    let mut analysis = parser.analyze().map_err(|err| match err {
        MftError::Io(err) => {
            error!("error reading {}: {err}", cli.input.display());
            EXIT_INPUT_IO
        }
        err => {
            error!("fatal parse error: {err}");
            EXIT_FATAL_PARSE
        }
    })?;

    let rows = analysis.to_rows(&config, &filter);
    let format = cli.format.resolve();
    write_output(format, &cli.output, &rows, &analysis.records, &config).map_err(|err| {
        error!("cannot write {}: {err}", cli.output.display());
        EXIT_OUTPUT_IO
    })?;

    info!("finished in {} ms", started.elapsed().as_millis());
    print_summary(cli, &config, &analysis);
    Ok(())
}

fn print_summary(cli: &Cli, config: &AnalysisConfig, analysis: &Analysis) {
    let stats = &analysis.stats;
    if stats.cancelled {
        println!("Analysis cancelled; partial results were flushed.");
    }
    println!("Records processed:   {}", stats.total_records);
    println!("Active records:      {}", stats.active_records);
    println!("Deleted records:     {}", stats.deleted_records);
    println!("Directories:         {}", stats.directories);
    println!("Files:               {}", stats.files);
    println!("Records with errors: {}", stats.error_records);
    if stats.filtered_records > 0 {
        println!("Filtered out:        {}", stats.filtered_records);
    }
    if stats.truncated_tail {
        println!("Input was truncated mid-record.");
    }
    if config.compute_hashes {
        println!("Unique MD5:          {}", stats.hash_stats.unique_md5());
        println!("Unique SHA-256:      {}", stats.hash_stats.unique_sha256());
        println!("Unique SHA-512:      {}", stats.hash_stats.unique_sha512());
        println!("Unique CRC-32:       {}", stats.hash_stats.unique_crc32());
    }
    if cli.verbose >= 2 && !stats.attribute_counts.is_empty() {
        println!("Attribute counts:");
        for (type_code, count) in &stats.attribute_counts {
            println!("  {type_code:#06x}: {count}");
        }
    }
}
