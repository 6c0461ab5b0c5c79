use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use futures::future::try_join_all;
use tracing::debug;

use crate::fetcher::CrudError;
use crate::model::Attachment;

/// A file chosen in a file control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    /// Name sent to the server; defaults to the file name of `path`.
    pub name: String,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, name }
    }
}

pub fn data_url(file_name: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    format!(
        "data:{};base64,{}",
        mime.essence_str(),
        general_purpose::STANDARD.encode(bytes)
    )
}

pub async fn encode_file(file: &SelectedFile) -> Result<Attachment, CrudError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| CrudError::Attachment {
            path: display_path(&file.path),
            source: e,
        })?;
    debug!(path = %file.path.display(), bytes = bytes.len(), "encoded attachment");
    Ok(Attachment {
        name: file.name.clone(),
        content: data_url(&file.name, &bytes),
    })
}

/// Reads every `(field, file)` pair concurrently. Fails as a whole if any read fails.
pub async fn encode_all(files: &[(String, SelectedFile)]) -> Result<Vec<(String, Attachment)>, CrudError> {
    let reads = files.iter().map(|(field, file)| async move {
        let attachment = encode_file(file).await?;
        Ok::<_, CrudError>((field.clone(), attachment))
    });
    try_join_all(reads).await
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
