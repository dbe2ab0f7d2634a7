use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// A file received from the client and parked in the temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Files received under one form field.
///
/// Multipart forms can send one file per field, several files under the same
/// field (`photos[]`), or keyed files (`photos[front]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileField {
    Single(UploadedFile),
    List(Vec<FileField>),
    Nested(Vec<(String, UploadedFile)>),
}

impl FileField {
    pub fn flatten_into(self, out: &mut Vec<UploadedFile>) {
        match self {
            FileField::Single(file) => out.push(file),
            FileField::List(fields) => {
                for field in fields {
                    field.flatten_into(out);
                }
            }
            FileField::Nested(entries) => out.extend(entries.into_iter().map(|(_, file)| file)),
        }
    }
}

/// Flatten form fields into the ordered list of files to process.
pub fn flatten_fields(fields: Vec<(String, FileField)>) -> Vec<UploadedFile> {
    let mut files = Vec::new();
    for (_, field) in fields {
        field.flatten_into(&mut files);
    }
    files
}

/// Outcome of one uploaded file, as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub original_name: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub destination_dir: String,
    pub url: String,
    pub success: bool,
    pub error: Option<String>,
    pub thumbnails: Vec<String>,
    pub thumbnail_obj: BTreeMap<String, String>,
}

impl FileResult {
    pub fn new(file: &UploadedFile, destination_dir: &str) -> Self {
        Self {
            original_name: file.name.clone(),
            name: file.name.clone(),
            size: file.size,
            content_type: file.content_type.clone(),
            destination_dir: destination_dir.to_string(),
            url: String::new(),
            success: false,
            error: None,
            thumbnails: Vec::new(),
            thumbnail_obj: BTreeMap::new(),
        }
    }

    pub fn succeed(mut self) -> Self {
        self.success = true;
        self.error = None;
        self
    }

    pub fn fail(mut self, err: &UploadError) -> Self {
        self.success = false;
        self.error = Some(err.to_string());
        self
    }

    pub fn record_thumbnail(&mut self, key: String, url: String) {
        self.thumbnails.push(url.clone());
        self.thumbnail_obj.insert(key, url);
    }
}

/// Response body of an upload request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Batch(Vec<FileResult>),
    Single(FileResult),
    NoFiles { error: String },
}

impl UploadOutcome {
    pub fn no_files() -> Self {
        UploadOutcome::NoFiles { error: UploadError::NoFiles.to_string() }
    }

    /// Number of files that were stored successfully.
    pub fn uploaded(&self) -> usize {
        match self {
            UploadOutcome::Batch(results) => results.iter().filter(|r| r.success).count(),
            UploadOutcome::Single(result) => usize::from(result.success),
            UploadOutcome::NoFiles { .. } => 0,
        }
    }
}
