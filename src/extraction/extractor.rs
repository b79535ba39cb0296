//! `TextExtractor`: Poppler and Tesseract driven from the command line.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{DocumentText, ExtractionError};

/// External programs the extractor shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    PdfToText,
    PdfInfo,
    PdfToPpm,
    Tesseract,
}

impl Tool {
    const ALL: [Tool; 4] = [Tool::PdfToText, Tool::PdfToPpm, Tool::PdfInfo, Tool::Tesseract];

    fn program(self) -> &'static str {
        match self {
            Tool::PdfToText => "pdftotext",
            Tool::PdfInfo => "pdfinfo",
            Tool::PdfToPpm => "pdftoppm",
            Tool::Tesseract => "tesseract",
        }
    }

    fn package(self) -> &'static str {
        match self {
            Tool::Tesseract => "tesseract-ocr",
            _ => "poppler-utils",
        }
    }

    fn command(self) -> Command {
        Command::new(self.program())
    }

    /// Run to completion and hand back stdout, or map the failure.
    fn run(self, cmd: &mut Command) -> Result<Output, ExtractionError> {
        match cmd.output() {
            Ok(output) if output.status.success() => Ok(output),
            Ok(output) => Err(ExtractionError::ExtractionFailed(format!(
                "{} exited with {}: {}",
                self.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ExtractionError::ToolNotFound(format!(
                    "{} (install {})",
                    self.program(),
                    self.package()
                )))
            }
            Err(e) => Err(ExtractionError::Io(e)),
        }
    }

    fn run_to_string(self, cmd: &mut Command) -> Result<String, ExtractionError> {
        let output = self.run(cmd)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// How a file's text is obtained, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Pdf,
    Image,
    PlainText,
}

impl SourceKind {
    fn of(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(SourceKind::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "gif" | "bmp" => Ok(SourceKind::Image),
            "txt" | "md" | "markdown" | "html" | "htm" | "csv" | "json" | "xml" => {
                Ok(SourceKind::PlainText)
            }
            _ => Err(ExtractionError::UnsupportedFileType(ext)),
        }
    }
}

fn density(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Text pulled out of one document.
#[derive(Debug)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
}

/// Which route produced an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// PDF text layer.
    PdfToText,
    /// Tesseract over rendered pages or an image.
    TesseractOcr,
    /// File contents used as-is.
    Direct,
}

/// Extracts text through external tools.
///
/// PDFs use their text layer unless it averages fewer than
/// `min_chars_per_page` non-whitespace characters per page, in which case the
/// pages are rendered and OCR'd and the denser result wins.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    min_chars_per_page: usize,
    ocr_language: String,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            min_chars_per_page: 100,
            ocr_language: "eng".to_string(),
        }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars_per_page = min_chars;
        self
    }

    /// Tesseract language code, e.g. `eng` or `eng+deu`.
    pub fn with_language(mut self, lang: &str) -> Self {
        self.ocr_language = lang.to_string();
        self
    }

    pub fn min_chars_per_page(&self) -> usize {
        self.min_chars_per_page
    }

    pub fn language(&self) -> &str {
        &self.ocr_language
    }

    /// Blocking extraction of one file.
    pub fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionError> {
        match SourceKind::of(path)? {
            SourceKind::Pdf => self.extract_pdf(path),
            SourceKind::Image => Ok(ExtractionResult {
                text: self.ocr_image(path)?,
                method: ExtractionMethod::TesseractOcr,
            }),
            SourceKind::PlainText => Ok(ExtractionResult {
                text: std::fs::read_to_string(path)?,
                method: ExtractionMethod::Direct,
            }),
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let layer = Tool::PdfToText.run_to_string(
            Tool::PdfToText
                .command()
                .args(["-layout", "-enc", "UTF-8"])
                .arg(path)
                .arg("-"),
        )?;

        let pages = self.page_count(path).unwrap_or(1).max(1) as usize;
        let layer_result = ExtractionResult {
            text: layer,
            method: ExtractionMethod::PdfToText,
        };
        if density(&layer_result.text) >= self.min_chars_per_page * pages {
            return Ok(layer_result);
        }

        debug!(
            "Sparse text layer in {} ({} pages), trying OCR",
            path.display(),
            pages
        );
        match self.ocr_pdf(path) {
            Ok(text) if density(&text) > density(&layer_result.text) => Ok(ExtractionResult {
                text,
                method: ExtractionMethod::TesseractOcr,
            }),
            Ok(_) => Ok(layer_result),
            Err(e) => {
                debug!("OCR of {} failed, keeping text layer: {}", path.display(), e);
                Ok(layer_result)
            }
        }
    }

    /// Page count from `pdfinfo`, if it can be determined.
    pub fn page_count(&self, path: &Path) -> Option<u32> {
        let info = Tool::PdfInfo
            .run_to_string(Tool::PdfInfo.command().arg(path))
            .ok()?;
        info.lines()
            .find_map(|line| line.strip_prefix("Pages:"))
            .and_then(|rest| rest.trim().parse().ok())
    }

    /// Render pages to PNG in a scratch dir and OCR them in page order.
    fn ocr_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        let scratch = TempDir::new()?;
        Tool::PdfToPpm.run(
            Tool::PdfToPpm
                .command()
                .args(["-png", "-r", "300"])
                .arg(path)
                .arg(scratch.path().join("page")),
        )?;

        let mut pages: Vec<PathBuf> = std::fs::read_dir(scratch.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        if pages.is_empty() {
            return Err(ExtractionError::ExtractionFailed(format!(
                "pdftoppm rendered no pages for {}",
                path.display()
            )));
        }
        pages.sort();

        let mut texts = Vec::with_capacity(pages.len());
        for (n, page) in pages.iter().enumerate() {
            match self.ocr_image(page) {
                Ok(text) => texts.push(text),
                Err(e) => warn!("OCR failed for page {} of {}: {}", n + 1, path.display(), e),
            }
        }
        // Form feed between pages, as pdftotext emits
        Ok(texts.join("\u{c}"))
    }

    fn ocr_image(&self, image: &Path) -> Result<String, ExtractionError> {
        Tool::Tesseract.run_to_string(
            Tool::Tesseract
                .command()
                .arg(image)
                .arg("stdout")
                .args(["-l", &self.ocr_language]),
        )
    }

    /// Each external tool and whether it is on `PATH`.
    pub fn check_tools() -> Vec<(String, bool)> {
        Tool::ALL
            .iter()
            .map(|tool| (tool.program().to_string(), which::which(tool.program()).is_ok()))
            .collect()
    }
}

#[async_trait]
impl DocumentText for TextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let extractor = self.clone();
        let owned = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| {
                ExtractionError::ExtractionFailed(format!("extraction task failed: {}", e))
            })??;

        debug!(
            "{}: {} chars via {:?}",
            path.display(),
            result.text.len(),
            result.method
        );
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_check_tools_lists_every_tool() {
        let names: Vec<String> = TextExtractor::check_tools()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["pdftotext", "pdftoppm", "pdfinfo", "tesseract"]);
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::of(Path::new("a/b.PDF")).unwrap(), SourceKind::Pdf);
        assert_eq!(SourceKind::of(Path::new("scan.tiff")).unwrap(), SourceKind::Image);
        assert_eq!(SourceKind::of(Path::new("notes.md")).unwrap(), SourceKind::PlainText);
        assert!(matches!(
            SourceKind::of(Path::new("archive.zip")),
            Err(ExtractionError::UnsupportedFileType(ext)) if ext == "zip"
        ));
        assert!(matches!(
            SourceKind::of(Path::new("README")),
            Err(ExtractionError::UnsupportedFileType(ext)) if ext.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_plain_text_is_read_directly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.TXT");
        std::fs::write(&path, "hello world").unwrap();

        let text = TextExtractor::new().extract_text(&path).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_missing_plain_file_is_io_error() {
        let err = TextExtractor::new()
            .extract(Path::new("/no/such/file.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }
}
