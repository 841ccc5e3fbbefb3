//! Turns a file or directory into an [`Artifact`]

use std::io::{Cursor, Write};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::package::artifact::Artifact;
use crate::utils::sha256_hash;

/// Directory names that never ship with a deployment
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "__pycache__", "venv", "target"];

/// Whether an entry is left out of directory archives
pub fn is_excluded(name: &str, is_dir: bool) -> bool {
    name.starts_with('.') || (is_dir && EXCLUDED_DIRS.contains(&name))
}

/// Package `path`, which must be a regular file or a directory
pub async fn pack(path: &Path, is_dir: bool) -> Result<Artifact, DeployError> {
    let artifact = if is_dir {
        pack_dir(&Dir::new(path)).await?
    } else {
        pack_file(&File::new(path)).await?
    };

    debug!(
        kind = artifact.kind(),
        bytes = artifact.content().len(),
        sha256 = %sha256_hash(artifact.content().as_bytes()),
        "Artifact ready"
    );
    Ok(artifact)
}

/// Ship a single file as text
pub async fn pack_file(file: &File) -> Result<Artifact, DeployError> {
    let content = file.read_string().await?;
    Ok(Artifact::SingleFile {
        file: content,
        filename: file.name(),
    })
}

/// Zip a directory tree and base64 it
pub async fn pack_dir(dir: &Dir) -> Result<Artifact, DeployError> {
    let walked = dir.walk_files(is_excluded).await?;

    let mut entries = Vec::with_capacity(walked.len());
    for walked_file in walked {
        let bytes = walked_file.file.read_bytes().await?;
        entries.push((walked_file.relative_path, bytes));
    }

    info!("Packing {} files from {}", entries.len(), dir.path().display());

    let zipped = tokio::task::spawn_blocking(move || write_zip(entries))
        .await
        .map_err(|e| DeployError::Internal(format!("Archive task failed: {}", e)))??;

    Ok(Artifact::Archive {
        artifact: STANDARD.encode(zipped),
        workdir: dir.name().await,
    })
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, DeployError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, bytes) in entries {
        writer.start_file(name, options)?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}
