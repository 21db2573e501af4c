// ジョブ単位: ファイル読込 -> 署名準備 -> 組立 -> 出力書込

use std::path::PathBuf;

use tracing::info;

use crate::error::PdfSignError;
use crate::pdf::reader::PdfReader;
use crate::pipeline::assembler::assemble;
use crate::placement::PlacementTable;
use crate::signature::PreparedImage;

/// Configuration for a single signing job.
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub signature_path: PathBuf,
    pub jpeg_quality: u8,
    /// 0-based placement table (from Job::placement_table).
    pub placements: PlacementTable,
}

/// Result of processing a single job.
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub pages_signed: usize,
}

/// Run a single signing job.
///
/// Reads the PDF and signature files, validates explicit placement
/// entries against the page count, runs the core assembly, and writes
/// the output file. The output file is only written on full success.
pub fn run_job(config: &JobConfig) -> crate::error::Result<JobResult> {
    let pdf_bytes = std::fs::read(&config.input_path)?;
    let sig_bytes = std::fs::read(&config.signature_path)?;

    let reader = PdfReader::from_bytes(&pdf_bytes)?;
    let page_count = reader.page_count();

    // Validate placement page indices are within range
    for (&page_index, _) in config.placements.iter() {
        if page_index >= page_count {
            return Err(PdfSignError::config(format!(
                "placement page {} out of range (document has {} pages)",
                page_index + 1,
                page_count
            )));
        }
    }

    let image = PreparedImage::prepare(&sig_bytes, config.jpeg_quality)?;
    info!(
        input = %config.input_path.display(),
        pages = page_count,
        signature = %config.signature_path.display(),
        "running signing job"
    );

    let output_bytes = assemble(&pdf_bytes, &image, &config.placements)?;
    std::fs::write(&config.output_path, &output_bytes)?;

    Ok(JobResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        pages_signed: page_count as usize,
    })
}
