use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{BlobStore, ByteStream, GetResult, ObjectHead, PutResult, UploadError, UploadResult};

/// Blob store on a local directory.
///
/// Objects are written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written object. Content types live in a
/// `.meta.json` sidecar next to the object.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    content_type: String,
}

impl FsBlobStore {
    pub async fn open<P: AsRef<Path>>(root: P) -> UploadResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> UploadResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(UploadError::validation(format!("Invalid object key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".meta.json");
        path.with_file_name(name)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        name.push(path.file_name().unwrap_or_default());
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        path.with_file_name(name)
    }

    async fn prepare_parent(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Move a finished temp file into place, or drop it on failure
    async fn commit(tmp: &Path, path: &Path, written: io::Result<u64>) -> io::Result<u64> {
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(tmp).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(tmp, path).await {
            let _ = fs::remove_file(tmp).await;
            return Err(e);
        }
        Ok(size)
    }

    async fn write_meta(path: &Path, content_type: Option<&str>) -> UploadResult<()> {
        let meta_path = Self::meta_path(path);
        match content_type {
            Some(content_type) => {
                let raw = serde_json::to_vec(&ObjectMeta {
                    content_type: content_type.to_string(),
                })?;
                fs::write(meta_path, raw).await?;
            }
            None => remove_if_exists(&meta_path).await?,
        }
        Ok(())
    }

    async fn read_meta(path: &Path) -> UploadResult<Option<String>> {
        match fs::read(Self::meta_path(path)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice::<ObjectMeta>(&raw)?.content_type)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn write_stream(tmp: &Path, mut stream: ByteStream) -> io::Result<u64> {
    let mut file = fs::File::create(tmp).await?;
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

async fn concat_files(tmp: &Path, sources: &[PathBuf]) -> io::Result<u64> {
    let mut file = fs::File::create(tmp).await?;
    let mut size = 0u64;
    for source in sources {
        let mut part = fs::File::open(source).await?;
        size += tokio::io::copy(&mut part, &mut file).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> UploadResult<PutResult> {
        let path = self.object_path(key)?;
        Self::prepare_parent(&path).await?;
        let tmp = Self::temp_path(&path);

        let written = write_stream(&tmp, stream).await;
        let size_bytes = Self::commit(&tmp, &path, written).await?;
        Self::write_meta(&path, content_type).await?;

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> UploadResult<GetResult> {
        let path = self.object_path(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(UploadError::not_found(key));
            }
            Err(e) => return Err(e.into()),
        };
        let size_bytes = file.metadata().await?.len();
        let content_type = Self::read_meta(&path).await?;

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(file)),
            size_bytes,
            content_type,
        })
    }

    async fn head(&self, key: &str) -> UploadResult<Option<ObjectHead>> {
        let path = self.object_path(key)?;
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(ObjectHead {
            size_bytes: metadata.len(),
            content_type: Self::read_meta(&path).await?,
            etag: None,
        }))
    }

    async fn compose(&self, sources: &[String], dest: &str) -> UploadResult<PutResult> {
        let paths = sources
            .iter()
            .map(|key| self.object_path(key))
            .collect::<UploadResult<Vec<_>>>()?;
        let path = self.object_path(dest)?;
        Self::prepare_parent(&path).await?;
        let tmp = Self::temp_path(&path);

        let written = concat_files(&tmp, &paths).await;
        let size_bytes = Self::commit(&tmp, &path, written).await?;
        Self::write_meta(&path, None).await?;

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> UploadResult<()> {
        let path = self.object_path(key)?;
        if fs::metadata(&path).await.is_err() {
            return Err(UploadError::not_found(key));
        }
        Self::write_meta(&path, Some(content_type)).await
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        let path = self.object_path(key)?;
        remove_if_exists(&path).await?;
        remove_if_exists(&Self::meta_path(&path)).await?;
        Ok(())
    }
}
