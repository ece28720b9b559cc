use std::collections::HashMap;
use std::str::FromStr;

use reel_blob::{JobDescriptor, JobId};
use reel_core::errors::ReelError;

/// Content type used when the client could not tell one
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Query parameters of a Resumable.js chunk request.
///
/// Each parameter is read under its `resumable*` name first, then under the
/// bare name (`chunkNumber`, `identifier`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumableParams {
    pub chunk_number: u32,
    pub chunk_size: Option<u64>,
    pub current_chunk_size: Option<u64>,
    pub total_size: Option<u64>,
    pub content_type: String,
    pub identifier: String,
    pub filename: String,
    pub relative_path: Option<String>,
    pub total_chunks: u32,
}

struct Lookup<'a> {
    query: &'a HashMap<String, String>,
}

impl Lookup<'_> {
    fn raw(&self, name: &str) -> Option<&str> {
        let mut prefixed = String::from("resumable");
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            prefixed.extend(first.to_uppercase());
            prefixed.push_str(chars.as_str());
        }
        self.query
            .get(&prefixed)
            .or_else(|| self.query.get(name))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ReelError> {
        self.raw(name)
            .map(str::to_string)
            .ok_or_else(|| ReelError::bad_request(format!("Missing parameter: {name}")))
    }

    fn number<T: FromStr>(&self, name: &str) -> Result<Option<T>, ReelError> {
        match self.raw(name) {
            None => Ok(None),
            Some(v) => v
                .parse::<T>()
                .map(Some)
                .map_err(|_| ReelError::bad_request(format!("Invalid parameter: {name}"))),
        }
    }

    fn required_number<T: FromStr>(&self, name: &str) -> Result<T, ReelError> {
        self.number(name)?
            .ok_or_else(|| ReelError::bad_request(format!("Missing parameter: {name}")))
    }
}

impl ResumableParams {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ReelError> {
        let q = Lookup { query };

        let chunk_number: u32 = q.required_number("chunkNumber")?;
        if chunk_number < 1 {
            return Err(ReelError::bad_request("Invalid chunk number."));
        }

        Ok(Self {
            chunk_number,
            chunk_size: q.number("chunkSize")?,
            current_chunk_size: q.number("currentChunkSize")?,
            total_size: q.number("totalSize")?,
            content_type: q
                .raw("type")
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string(),
            identifier: q.required("identifier")?,
            filename: q.required("filename")?,
            relative_path: q.raw("relativePath").map(str::to_string),
            total_chunks: q.required_number("totalChunks")?,
        })
    }

    /// The job this chunk belongs to, as declared by the client
    pub fn descriptor(&self) -> Result<JobDescriptor, ReelError> {
        let id = JobId::parse(self.identifier.as_str())
            .map_err(|_| ReelError::bad_request("Invalid upload identifier."))?;
        Ok(JobDescriptor::new(
            id,
            self.total_chunks,
            self.filename.clone(),
            self.content_type.clone(),
        ))
    }
}
