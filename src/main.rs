use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf_signing::config::job::JobFile;
use pdf_signing::config;
use pdf_signing::pipeline::job_runner::JobConfig;
use pdf_signing::pipeline::orchestrator::run_all_jobs;

/// 出力パス省略時のファイル名
const DEFAULT_OUTPUT_NAME: &str = "signed_output.pdf";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: pdf_signing <jobs.yaml>...");
        eprintln!("  Stamp a signature image onto PDF pages according to job specifications.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_signing {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    // Collect job configs from all job files.
    let mut job_configs: Vec<JobConfig> = Vec::new();

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Read and parse the job YAML file.
        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file: JobFile = match serde_yml::from_str(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            let input_path = resolve_path(&job_dir, &job.input);
            let signature_path = resolve_path(&job_dir, &job.signature);

            // Omitted output: signed_output.pdf next to the input file.
            let output_path = match &job.output {
                Some(o) => resolve_path(&job_dir, o),
                None => input_path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(DEFAULT_OUTPUT_NAME),
            };

            // Convert 1-based placement page numbers to the core's 0-based table.
            let mut placements = match job.placement_table() {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("ERROR: {job_file_arg}: {e}");
                    return ExitCode::FAILURE;
                }
            };
            // Explicit job entries win over the settings default, which wins
            // over the built-in default.
            if let Some(default_placement) = settings.default_placement {
                placements.set_default(default_placement);
            }

            job_configs.push(JobConfig {
                input_path,
                output_path,
                signature_path,
                jpeg_quality: job.jpeg_quality.unwrap_or(settings.jpeg_quality),
                placements,
            });
        }
    }

    // Run all jobs through the pipeline.
    let results = run_all_jobs(&job_configs);

    // Report results.
    let mut has_error = false;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(job_result) => {
                eprintln!(
                    "OK: {} -> {} ({} pages)",
                    job_result.input_path.display(),
                    job_result.output_path.display(),
                    job_result.pages_signed
                );
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    job_configs[i].input_path.display(),
                    job_configs[i].output_path.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
