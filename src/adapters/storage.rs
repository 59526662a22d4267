use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_path.join(candidate)
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn location(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }
}

/// 一個報表檔案：檔名與內容
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl ReportFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Packs the report files into one in-memory zip archive.
pub fn bundle_zip(files: &[ReportFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for file in files {
        zip.start_file::<_, ()>(file.name.as_str(), FileOptions::default())?;
        zip.write_all(&file.contents)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Writes the files either as one zip bundle or one by one.
/// Returns the locations written.
pub async fn write_reports<S: Storage>(
    storage: &S,
    files: Vec<ReportFile>,
    compress: bool,
    bundle_name: &str,
) -> Result<Vec<String>> {
    if compress {
        let archive = bundle_zip(&files)?;
        tracing::debug!("📦 Bundling {} files into {}", files.len(), bundle_name);
        storage.write_file(bundle_name, &archive).await?;
        return Ok(vec![storage.location(bundle_name)]);
    }

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        storage.write_file(&file.name, &file.contents).await?;
        written.push(storage.location(&file.name));
    }
    Ok(written)
}
