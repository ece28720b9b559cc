use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use std::env;
use tracing::{debug, warn};

use crate::store::collect_stream;
use crate::{BlobStore, ByteStream, GetResult, ObjectHead, PutResult, UploadError, UploadResult};

/// Parts of a composed object are buffered to at least this size; S3 rejects
/// non-final parts under 5 MiB.
pub const MIN_COMPOSE_PART_BYTES: usize = 8 * 1024 * 1024;

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl S3Config {
    /// Read `S3_REGION`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY` and the
    /// optional `S3_ENDPOINT_URL`
    pub fn from_env() -> UploadResult<Self> {
        fn get_env(key: &str) -> UploadResult<String> {
            env::var(key)
                .map_err(|_| UploadError::validation(format!("{} environment variable required", key)))
        }

        Ok(Self {
            region: get_env("S3_REGION")?,
            access_key_id: get_env("S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("S3_SECRET_ACCESS_KEY")?,
            endpoint_url: env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Blob store backed by an S3-compatible bucket.
///
/// Uses path-style addressing so self-hosted servers work without DNS tricks.
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config, bucket: String) -> Self {
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    pub async fn from_env(bucket: String) -> UploadResult<Self> {
        Ok(Self::new(S3Config::from_env()?, bucket).await)
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "reel-s3",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> UploadError {
        UploadError::backend(err)
    }

    async fn upload_part(
        &self,
        dest: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> UploadResult<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(dest)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(AwsByteStream::from(data))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(result.e_tag)
            .build())
    }

    async fn compose_into(
        &self,
        sources: &[String],
        dest: &str,
        upload: &mut MultipartState,
    ) -> UploadResult<PutResult> {
        let mut buffer = PartBuffer::new(MIN_COMPOSE_PART_BYTES);
        let mut size_bytes = 0u64;

        for key in sources {
            let mut body = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(Self::map_aws_error)?
                .body;

            while let Some(chunk) = body.try_next().await.map_err(Self::map_aws_error)? {
                size_bytes += chunk.len() as u64;
                if let Some(part) = buffer.push(&chunk) {
                    let upload_id = self.ensure_multipart(dest, upload).await?;
                    let number = upload.parts.len() as i32 + 1;
                    let completed = self.upload_part(dest, &upload_id, number, part).await?;
                    upload.parts.push(completed);
                }
            }
        }

        let rest = buffer.finish();
        let Some(upload_id) = upload.upload_id.clone() else {
            // Small enough for a single object.
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(dest)
                .body(AwsByteStream::from(rest))
                .send()
                .await
                .map_err(Self::map_aws_error)?;
            return Ok(PutResult {
                etag: result.e_tag,
                size_bytes,
            });
        };

        if !rest.is_empty() {
            let number = upload.parts.len() as i32 + 1;
            let completed = self.upload_part(dest, &upload_id, number, rest).await?;
            upload.parts.push(completed);
        }

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(dest)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(upload.parts.clone()))
                    .build(),
            )
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        upload.upload_id = None;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn ensure_multipart(&self, dest: &str, upload: &mut MultipartState) -> UploadResult<String> {
        if let Some(id) = &upload.upload_id {
            return Ok(id.clone());
        }
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(dest)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        let id = created
            .upload_id
            .ok_or_else(|| UploadError::finalization(dest, "multipart upload id missing"))?;
        debug!(key = dest, upload_id = %id, "started multipart compose");
        upload.upload_id = Some(id.clone());
        Ok(id)
    }
}

#[derive(Default)]
struct MultipartState {
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
}

/// Accumulates bytes and hands out parts once they reach the minimum size
#[derive(Debug)]
struct PartBuffer {
    min_part: usize,
    buf: BytesMut,
}

impl PartBuffer {
    fn new(min_part: usize) -> Self {
        Self {
            min_part,
            buf: BytesMut::new(),
        }
    }

    fn push(&mut self, data: &[u8]) -> Option<Bytes> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.min_part {
            Some(self.buf.split().freeze())
        } else {
            None
        }
    }

    fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// `x-amz-copy-source` value for an object in a bucket
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> UploadResult<PutResult> {
        // The PUT is only issued once the whole body has arrived.
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> UploadResult<GetResult> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        let size_bytes = result.content_length.unwrap_or(0) as u64;
        let content_type = result.content_type;

        let mut body = result.body;
        let stream = async_stream::stream! {
            loop {
                match body.next().await {
                    Some(Ok(bytes)) => yield Ok(bytes),
                    Some(Err(e)) => {
                        yield Err(std::io::Error::other(e));
                        return;
                    }
                    None => return,
                }
            }
        };

        Ok(GetResult {
            stream: Box::pin(stream),
            size_bytes,
            content_type,
        })
    }

    async fn head(&self, key: &str) -> UploadResult<Option<ObjectHead>> {
        let result = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(result) => result,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(Self::map_aws_error(err));
            }
        };

        Ok(Some(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            content_type: result.content_type,
            etag: result.e_tag,
        }))
    }

    async fn compose(&self, sources: &[String], dest: &str) -> UploadResult<PutResult> {
        let mut upload = MultipartState::default();
        let result = self.compose_into(sources, dest, &mut upload).await;

        if result.is_err() {
            if let Some(upload_id) = upload.upload_id {
                if let Err(e) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(dest)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key = dest, upload_id = %upload_id, error = %e, "failed to abort multipart compose");
                }
            }
        }
        result
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> UploadResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(copy_source(&self.bucket, key))
            .content_type(content_type)
            .metadata_directive(MetadataDirective::Replace)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }
}
