//! File-processing jobs for the PDF, image and audio tools.
//!
//! Uploads are validated against the operation's limits, tracked as a
//! [`FileProcessingJob`], staged under `uploads/`, handed to a
//! [`FileTransform`] and written to `processed/`. The job record expires one
//! job TTL after creation and is reclaimed by the cleanup sweep.
//!
//! Byte-level codec work is not part of this crate. [`Passthrough`] returns
//! the first input unchanged; real PDF/image/audio backends implement
//! [`FileTransform`].

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{CleanupConfig, StorageConfig};
use crate::error::{ToolboxError, ToolboxResult};
use crate::storage::{FileProcessingJob, JobKind, JobStatus, Storage};

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    Ranges,
    Pages,
    Every,
}

impl SplitMode {
    fn parse(s: &str) -> ToolboxResult<Self> {
        match s {
            "ranges" => Ok(SplitMode::Ranges),
            "pages" => Ok(SplitMode::Pages),
            "every" => Ok(SplitMode::Every),
            other => Err(ToolboxError::InvalidInput(format!(
                "splitMode must be ranges, pages or every, got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCutParams {
    pub start_time: f64,
    pub end_time: f64,
    pub fade_in: bool,
    pub fade_out: bool,
    pub fade_duration: f64,
}

/// An operation together with its validated form parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum FileOperation {
    PdfMerge,
    PdfSplit {
        mode: SplitMode,
        ranges: Option<String>,
    },
    ImageResize {
        width: u32,
        height: u32,
    },
    ImageCompress {
        quality: u8,
    },
    AudioCut(AudioCutParams),
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn number<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    name: &str,
) -> ToolboxResult<Option<T>> {
    match field(fields, name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ToolboxError::InvalidInput(format!("{} must be a number", name))),
        None => Ok(None),
    }
}

fn flag(fields: &HashMap<String, String>, name: &str) -> bool {
    matches!(field(fields, name), Some("true" | "1" | "on" | "yes"))
}

fn bounded<T: PartialOrd + std::fmt::Display>(name: &str, value: T, min: T, max: T) -> ToolboxResult<T> {
    if value < min || value > max {
        Err(ToolboxError::InvalidInput(format!(
            "{} must be between {} and {}",
            name, min, max
        )))
    } else {
        Ok(value)
    }
}

impl FileOperation {
    /// Build an operation from multipart text fields.
    pub fn from_fields(kind: JobKind, fields: &HashMap<String, String>) -> ToolboxResult<Self> {
        match kind {
            JobKind::PdfMerge => Ok(FileOperation::PdfMerge),
            JobKind::PdfSplit => {
                let mode = SplitMode::parse(field(fields, "splitMode").unwrap_or("pages"))?;
                let ranges = field(fields, "ranges").map(str::to_string);
                if mode == SplitMode::Ranges && ranges.is_none() {
                    return Err(ToolboxError::InvalidInput(
                        "ranges are required when splitMode is ranges".to_string(),
                    ));
                }
                Ok(FileOperation::PdfSplit { mode, ranges })
            }
            JobKind::ImageResize => {
                let width = number::<u32>(fields, "width")?.ok_or_else(|| {
                    ToolboxError::InvalidInput("width is required".to_string())
                })?;
                let height = number::<u32>(fields, "height")?.ok_or_else(|| {
                    ToolboxError::InvalidInput("height is required".to_string())
                })?;
                Ok(FileOperation::ImageResize {
                    width: bounded("width", width, 1, 10_000)?,
                    height: bounded("height", height, 1, 10_000)?,
                })
            }
            JobKind::ImageCompress => {
                let quality = number::<u32>(fields, "quality")?.unwrap_or(80);
                Ok(FileOperation::ImageCompress {
                    quality: bounded("quality", quality, 1, 100)? as u8,
                })
            }
            JobKind::AudioCut => {
                let start_time = number::<f64>(fields, "startTime")?.unwrap_or(0.0);
                let end_time = number::<f64>(fields, "endTime")?.ok_or_else(|| {
                    ToolboxError::InvalidInput("endTime is required".to_string())
                })?;
                let fade_duration = number::<f64>(fields, "fadeDuration")?.unwrap_or(0.0);

                if !start_time.is_finite() || !end_time.is_finite() || !fade_duration.is_finite() {
                    return Err(ToolboxError::InvalidInput(
                        "times must be finite numbers".to_string(),
                    ));
                }
                if start_time < 0.0 || end_time <= start_time {
                    return Err(ToolboxError::InvalidInput(
                        "startTime must be >= 0 and before endTime".to_string(),
                    ));
                }
                if fade_duration < 0.0 || fade_duration > end_time - start_time {
                    return Err(ToolboxError::InvalidInput(
                        "fadeDuration must fit inside the cut".to_string(),
                    ));
                }

                Ok(FileOperation::AudioCut(AudioCutParams {
                    start_time,
                    end_time,
                    fade_in: flag(fields, "fadeIn"),
                    fade_out: flag(fields, "fadeOut"),
                    fade_duration,
                }))
            }
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            FileOperation::PdfMerge => JobKind::PdfMerge,
            FileOperation::PdfSplit { .. } => JobKind::PdfSplit,
            FileOperation::ImageResize { .. } => JobKind::ImageResize,
            FileOperation::ImageCompress { .. } => JobKind::ImageCompress,
            FileOperation::AudioCut(_) => JobKind::AudioCut,
        }
    }

    /// Content type every result of this operation carries, if fixed.
    pub fn output_content_type(&self) -> Option<&'static str> {
        match self {
            FileOperation::AudioCut(_) => Some("audio/mpeg"),
            _ => None,
        }
    }

    /// Per-file size cap in bytes.
    pub fn max_file_size(&self) -> u64 {
        match self.kind() {
            JobKind::PdfMerge | JobKind::PdfSplit => 50 * MB,
            JobKind::ImageResize => 10 * MB,
            JobKind::ImageCompress => 20 * MB,
            JobKind::AudioCut => 100 * MB,
        }
    }

    fn file_count(&self) -> (usize, usize) {
        match self.kind() {
            JobKind::PdfMerge => (2, 20),
            _ => (1, 1),
        }
    }

    fn accepts(&self, file: &UploadedFile) -> bool {
        match self.kind() {
            JobKind::PdfMerge | JobKind::PdfSplit => is_pdf(&file.bytes),
            JobKind::ImageResize | JobKind::ImageCompress => matches!(
                file.content_type.as_str(),
                "image/jpeg" | "image/png" | "image/webp" | "image/gif"
            ),
            JobKind::AudioCut => file.content_type.starts_with("audio/"),
        }
    }

    /// Check count, size and type of the uploads before any job is created.
    pub fn validate(&self, files: &[UploadedFile]) -> ToolboxResult<()> {
        let (min, max) = self.file_count();
        if files.len() < min || files.len() > max {
            return Err(ToolboxError::InvalidInput(if min == max {
                format!("{} expects exactly {} file", self.kind(), min)
            } else {
                format!("{} expects {} to {} files", self.kind(), min, max)
            }));
        }

        let limit = self.max_file_size();
        for file in files {
            if file.bytes.is_empty() {
                return Err(ToolboxError::InvalidInput(format!(
                    "{} is empty",
                    file.file_name
                )));
            }
            if file.bytes.len() as u64 > limit {
                return Err(ToolboxError::InvalidInput(format!(
                    "{} exceeds the {} MB limit",
                    file.file_name,
                    limit / MB
                )));
            }
            if !self.accepts(file) {
                return Err(ToolboxError::InvalidInput(format!(
                    "{} ({}) is not a supported file for {}",
                    file.file_name,
                    file.content_type,
                    self.kind()
                )));
            }
        }
        Ok(())
    }
}

/// Multipart field name carrying the files for `kind`.
pub fn upload_field(kind: JobKind) -> &'static str {
    match kind {
        JobKind::PdfMerge | JobKind::PdfSplit => "pdf",
        JobKind::ImageResize | JobKind::ImageCompress => "image",
        JobKind::AudioCut => "audio",
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn extension(&self) -> &str {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| extension_for(&self.content_type))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
}

/// Content type of a stored result, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedOutput {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Backend that performs the actual document/image/audio transformation.
pub trait FileTransform: Send + Sync {
    fn apply(
        &self,
        operation: &FileOperation,
        inputs: &[UploadedFile],
    ) -> ToolboxResult<ProcessedOutput>;
}

/// Returns the first input unchanged.
pub struct Passthrough;

impl FileTransform for Passthrough {
    fn apply(
        &self,
        operation: &FileOperation,
        inputs: &[UploadedFile],
    ) -> ToolboxResult<ProcessedOutput> {
        let first = inputs
            .first()
            .ok_or_else(|| ToolboxError::Processing("no input files".to_string()))?;
        tracing::debug!(
            "No codec backend configured, passing {} through for {}",
            first.file_name,
            operation.kind()
        );

        Ok(ProcessedOutput {
            bytes: first.bytes.clone(),
            content_type: first.content_type.clone(),
        })
    }
}

/// A finished job with its output.
#[derive(Debug)]
pub struct ProcessedFile {
    pub job: FileProcessingJob,
    pub output: ProcessedOutput,
}

pub struct FileProcessor {
    storage: Arc<dyn Storage>,
    transform: Arc<dyn FileTransform>,
    uploads_dir: PathBuf,
    processed_dir: PathBuf,
    job_ttl: chrono::Duration,
}

impl FileProcessor {
    pub fn new(
        storage: Arc<dyn Storage>,
        transform: Arc<dyn FileTransform>,
        storage_config: &StorageConfig,
        cleanup_config: &CleanupConfig,
    ) -> Self {
        Self {
            storage,
            transform,
            uploads_dir: storage_config.uploads_dir(),
            processed_dir: storage_config.processed_dir(),
            job_ttl: cleanup_config.job_ttl(),
        }
    }

    /// Validate, track and run one processing request.
    ///
    /// Validation failures return before a job exists. Failures after that
    /// mark the job failed and are returned to the caller.
    pub async fn process(
        &self,
        operation: FileOperation,
        files: Vec<UploadedFile>,
    ) -> ToolboxResult<ProcessedFile> {
        operation.validate(&files)?;

        let job = FileProcessingJob::new(operation.kind(), Utc::now(), self.job_ttl);
        let id = job.id;
        self.storage.insert_job(job)?;
        tracing::info!("Job {} started ({}, {} files)", id, operation.kind(), files.len());

        match self.run(id, operation, files).await {
            Ok((path, output)) => {
                let job = self.storage.complete_job(id, path, Utc::now())?;
                tracing::info!("Job {} completed", id);
                Ok(ProcessedFile { job, output })
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", id, e);
                if let Err(store_err) = self.storage.fail_job(id, e.to_string(), Utc::now()) {
                    tracing::warn!("Could not record failure of job {}: {}", id, store_err);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        id: Uuid,
        operation: FileOperation,
        files: Vec<UploadedFile>,
    ) -> ToolboxResult<(PathBuf, ProcessedOutput)> {
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::create_dir_all(&self.processed_dir).await?;

        let mut staged = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let path = self
                .uploads_dir
                .join(format!("{}-{}.{}", id, i, file.extension()));
            tokio::fs::write(&path, &file.bytes).await?;
            staged.push(path);
        }
        self.storage
            .update_job_progress(id, JobStatus::Processing, 25)?;

        let fixed_type = operation.output_content_type();
        let transform = Arc::clone(&self.transform);
        let result = tokio::task::spawn_blocking(move || transform.apply(&operation, &files))
            .await
            .map_err(|e| ToolboxError::Processing(format!("transform panicked: {}", e)))?;

        for path in &staged {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("Failed to remove staged upload {}: {}", path.display(), e);
            }
        }

        let mut output = result?;
        if let Some(content_type) = fixed_type {
            output.content_type = content_type.to_string();
        }
        self.storage
            .update_job_progress(id, JobStatus::Processing, 75)?;

        let result_path = self
            .processed_dir
            .join(format!("{}.{}", id, extension_for(&output.content_type)));
        tokio::fs::write(&result_path, &output.bytes).await?;

        Ok((result_path, output))
    }

    pub fn job(&self, id: Uuid) -> ToolboxResult<FileProcessingJob> {
        self.storage
            .get_job(id)?
            .ok_or_else(|| ToolboxError::NotFound(format!("job {}", id)))
    }

    /// Read back the result of a completed job.
    pub async fn read_result(&self, id: Uuid) -> ToolboxResult<(FileProcessingJob, Vec<u8>)> {
        let job = self.job(id)?;
        let path = match (&job.status, &job.result_path) {
            (JobStatus::Completed, Some(path)) => path.clone(),
            _ => {
                return Err(ToolboxError::NotFound(format!(
                    "job {} has no result",
                    id
                )))
            }
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((job, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolboxError::NotFound(
                format!("result of job {} has expired", id),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub pages: usize,
    pub size: usize,
    pub title: Option<String>,
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

/// Count `/Type /Page` objects, falling back to the largest `/Count` when
/// pages live in compressed object streams.
fn count_pages(bytes: &[u8]) -> usize {
    let pages = find_all(bytes, b"/Type")
        .filter(|&i| {
            let j = skip_whitespace(bytes, i + 5);
            bytes[j..].starts_with(b"/Page")
                && !bytes
                    .get(j + 5)
                    .is_some_and(|b| b.is_ascii_alphanumeric())
        })
        .count();
    if pages > 0 {
        return pages;
    }

    find_all(bytes, b"/Count")
        .filter_map(|i| {
            let j = skip_whitespace(bytes, i + 6);
            let digits: Vec<u8> = bytes[j..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .copied()
                .collect();
            std::str::from_utf8(&digits).ok()?.parse::<usize>().ok()
        })
        .max()
        .unwrap_or(0)
}

/// Literal `(...)` or hex `<...>` string following `/Title`.
fn read_title(bytes: &[u8]) -> Option<String> {
    let start = find_all(bytes, b"/Title").next()? + 6;
    let i = skip_whitespace(bytes, start);
    match bytes.get(i)? {
        b'(' => {
            let mut out = Vec::new();
            let mut depth = 0usize;
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => {
                        if let Some(&next) = bytes.get(j + 1) {
                            out.push(match next {
                                b'n' => b'\n',
                                b't' => b'\t',
                                b'r' => b'\r',
                                other => other,
                            });
                        }
                        j += 2;
                        continue;
                    }
                    b'(' => depth += 1,
                    b')' if depth == 0 => break,
                    b')' => depth -= 1,
                    _ => {}
                }
                out.push(bytes[j]);
                j += 1;
            }
            Some(String::from_utf8_lossy(&out).into_owned())
        }
        b'<' => {
            let end = bytes[i + 1..].iter().position(|&b| b == b'>')? + i + 1;
            let hex: Vec<u8> = bytes[i + 1..end]
                .iter()
                .copied()
                .filter(|b| b.is_ascii_hexdigit())
                .collect();
            let decoded: Vec<u8> = hex
                .chunks(2)
                .filter_map(|pair| {
                    let s = std::str::from_utf8(pair).ok()?;
                    u8::from_str_radix(&format!("{:0<2}", s), 16).ok()
                })
                .collect();
            // UTF-16BE with BOM
            if decoded.starts_with(&[0xFE, 0xFF]) {
                let units: Vec<u16> = decoded[2..]
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            } else {
                Some(String::from_utf8_lossy(&decoded).into_owned())
            }
        }
        _ => None,
    }
    .filter(|t| !t.trim().is_empty())
}

/// Page count, byte size and document title of a PDF.
pub fn pdf_info(bytes: &[u8]) -> ToolboxResult<PdfInfo> {
    if !is_pdf(bytes) {
        return Err(ToolboxError::InvalidInput("not a PDF document".to_string()));
    }

    Ok(PdfInfo {
        pages: count_pages(bytes),
        size: bytes.len(),
        title: read_title(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemStorage;

    const TWO_PAGE_PDF: &[u8] = b"%PDF-1.4\n\
        1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
        2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >> endobj\n\
        3 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
        4 0 obj << /Type/Page /Parent 2 0 R >> endobj\n\
        5 0 obj << /Title (Quarterly \\(draft\\) report) >> endobj\n\
        %%EOF";

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: TWO_PAGE_PDF.to_vec(),
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn processor(root: &Path) -> (Arc<MemStorage>, FileProcessor) {
        let mut config = Config::default();
        config.storage.data_dir = root.to_path_buf();
        let storage = Arc::new(MemStorage::new());
        let processor = FileProcessor::new(
            storage.clone(),
            Arc::new(Passthrough),
            &config.storage,
            &config.cleanup,
        );
        (storage, processor)
    }

    #[test]
    fn test_pdf_info() {
        let info = pdf_info(TWO_PAGE_PDF).unwrap();
        assert_eq!(info.pages, 2);
        assert_eq!(info.size, TWO_PAGE_PDF.len());
        assert_eq!(info.title.as_deref(), Some("Quarterly (draft) report"));
        assert!(pdf_info(b"GIF89a").is_err());
    }

    #[test]
    fn test_pdf_info_hex_title_and_count_fallback() {
        let doc = b"%PDF-1.7\n<< /Type /Pages /Count 7 >>\n<< /Title <FEFF00480069> >>";
        let info = pdf_info(doc).unwrap();
        assert_eq!(info.pages, 7);
        assert_eq!(info.title.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_operation_parsing() {
        let op = FileOperation::from_fields(JobKind::PdfSplit, &fields(&[("splitMode", "every")]))
            .unwrap();
        assert_eq!(
            op,
            FileOperation::PdfSplit {
                mode: SplitMode::Every,
                ranges: None
            }
        );
        assert!(
            FileOperation::from_fields(JobKind::PdfSplit, &fields(&[("splitMode", "ranges")]))
                .is_err()
        );
        assert!(
            FileOperation::from_fields(JobKind::PdfSplit, &fields(&[("splitMode", "halves")]))
                .is_err()
        );

        let op = FileOperation::from_fields(
            JobKind::AudioCut,
            &fields(&[
                ("startTime", "1.5"),
                ("endTime", "10"),
                ("fadeIn", "true"),
                ("fadeDuration", "2"),
            ]),
        )
        .unwrap();
        let FileOperation::AudioCut(params) = op else {
            panic!("expected audio cut");
        };
        assert!(params.fade_in && !params.fade_out);
        assert_eq!(params.end_time, 10.0);

        assert!(FileOperation::from_fields(
            JobKind::AudioCut,
            &fields(&[("startTime", "5"), ("endTime", "2")])
        )
        .is_err());
        assert!(FileOperation::from_fields(
            JobKind::ImageResize,
            &fields(&[("width", "0"), ("height", "10")])
        )
        .is_err());
        assert_eq!(
            FileOperation::from_fields(JobKind::ImageCompress, &HashMap::new()).unwrap(),
            FileOperation::ImageCompress { quality: 80 }
        );
    }

    #[test]
    fn test_quality_out_of_range_reports_bounds() {
        let err =
            FileOperation::from_fields(JobKind::ImageCompress, &fields(&[("quality", "150")]))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: quality must be between 1 and 100"
        );
        assert!(
            FileOperation::from_fields(JobKind::ImageCompress, &fields(&[("quality", "high")]))
                .unwrap_err()
                .to_string()
                .contains("must be a number")
        );
    }

    #[test]
    fn test_validation() {
        let merge = FileOperation::PdfMerge;
        assert!(merge.validate(&[pdf("a.pdf")]).is_err());
        assert!(merge.validate(&[pdf("a.pdf"), pdf("b.pdf")]).is_ok());

        let mut fake = pdf("fake.pdf");
        fake.bytes = b"hello".to_vec();
        assert!(merge.validate(&[pdf("a.pdf"), fake]).is_err());

        let resize = FileOperation::ImageResize {
            width: 10,
            height: 10,
        };
        let big = UploadedFile {
            file_name: "big.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0; (10 * MB + 1) as usize],
        };
        assert!(resize.validate(&[big]).is_err());

        let svg = UploadedFile {
            file_name: "x.svg".into(),
            content_type: "image/svg+xml".into(),
            bytes: b"<svg/>".to_vec(),
        };
        assert!(resize.validate(&[svg]).is_err());
    }

    #[tokio::test]
    async fn test_process_creates_completed_job() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, processor) = processor(dir.path());

        let done = processor
            .process(FileOperation::PdfMerge, vec![pdf("a.pdf"), pdf("b.pdf")])
            .await
            .unwrap();

        assert_eq!(done.job.status, JobStatus::Completed);
        assert_eq!(done.job.progress, 100);
        assert_eq!(done.output.content_type, "application/pdf");
        assert_eq!(done.job.delete_at, done.job.created_at + chrono::Duration::hours(1));

        let path = done.job.result_path.clone().unwrap();
        assert!(path.starts_with(dir.path().join("processed")));
        assert!(path.exists());

        // Staged inputs are gone.
        let staged: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .collect();
        assert!(staged.is_empty());

        let (job, bytes) = processor.read_result(done.job.id).await.unwrap();
        assert_eq!(job.id, done.job.id);
        assert_eq!(bytes, TWO_PAGE_PDF);
        assert_eq!(storage.job_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_upload_creates_no_job() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, processor) = processor(dir.path());

        let err = processor
            .process(FileOperation::PdfMerge, vec![pdf("only.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolboxError::InvalidInput(_)));
        assert_eq!(storage.job_count().unwrap(), 0);
    }

    struct Broken;

    impl FileTransform for Broken {
        fn apply(&self, _: &FileOperation, _: &[UploadedFile]) -> ToolboxResult<ProcessedOutput> {
            Err(ToolboxError::Processing("codec exploded".into()))
        }
    }

    #[tokio::test]
    async fn test_transform_failure_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let storage = Arc::new(MemStorage::new());
        let processor =
            FileProcessor::new(storage.clone(), Arc::new(Broken), &config.storage, &config.cleanup);

        let err = processor
            .process(
                FileOperation::PdfSplit {
                    mode: SplitMode::Pages,
                    ranges: None,
                },
                vec![pdf("a.pdf")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolboxError::Processing(_)));

        let jobs = storage.expired_jobs(Utc::now() + chrono::Duration::days(1)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(jobs[0].error_message.as_deref(), Some("Processing error: codec exploded"));
        assert!(processor.read_result(jobs[0].id).await.is_err());
    }

    #[tokio::test]
    async fn test_audio_cut_result_is_mpeg() {
        let dir = tempfile::tempdir().unwrap();
        let (_, processor) = processor(dir.path());

        let wav = UploadedFile {
            file_name: "take.wav".into(),
            content_type: "audio/wav".into(),
            bytes: b"RIFFfake".to_vec(),
        };
        let op = FileOperation::from_fields(JobKind::AudioCut, &fields(&[("endTime", "3")]))
            .unwrap();
        let done = processor.process(op, vec![wav]).await.unwrap();

        assert_eq!(done.output.content_type, "audio/mpeg");
        let path = done.job.result_path.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
        assert_eq!(content_type_for(&path), "audio/mpeg");
    }
}
