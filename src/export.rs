// Artifact download
//
// Writes a produced document to disk under a timestamped name.

use crate::models::TaskKind;
use crate::resources::Resource;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::fs;

/// `Pagesmith_Merged_<millis>.pdf` for saves, `Pagesmith_Extract_<millis>.pdf`
/// for extractions
pub fn artifact_file_name(kind: TaskKind, unix_millis: i64) -> String {
    let label = match kind {
        TaskKind::Save => "Merged",
        TaskKind::Extract => "Extract",
    };
    format!("Pagesmith_{}_{}.pdf", label, unix_millis)
}

/// Write an artifact into `output_dir`, creating the directory if needed.
///
/// # Returns
/// The path of the written file
pub fn write_artifact(output_dir: &Utf8Path, kind: TaskKind, artifact: &Resource) -> Result<Utf8PathBuf> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir))?;
    }

    let path = output_dir.join(artifact_file_name(kind, Utc::now().timestamp_millis()));
    fs::write(&path, &artifact.bytes).with_context(|| format!("Failed to write artifact: {}", path))?;

    tracing::info!("Wrote {} artifact ({} bytes) to {}", kind, artifact.bytes.len(), path);
    Ok(path)
}
