//! Page text extraction: per-page plain text with header/footer bands cut off.
//!
//! Running heads, page numbers and conference footers repeat on every page
//! and look like body text to the section builder. Cropping a fixed fraction
//! from the top and bottom of each page removes most of them before any line
//! is classified.
//!
//! The pdfium calls are blocking and pdfium keeps thread-local state, so the
//! file-level entry point runs inside `spawn_blocking`. Everything else works
//! against the [`DocumentSource`] trait and is testable without a PDF.

use crate::config::CropBand;
use crate::error::{DigestError, PageFault};
use crate::pipeline::postprocess;
use crate::pipeline::sections::{build_sections, SectionTree};
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Page number (1-based) → cropped, trimmed text. Blank pages are absent.
pub type PageTexts = BTreeMap<usize, String>;

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Region of a page to read, measured from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRegion {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextRegion {
    /// Full page width, restricted vertically to the crop band.
    pub fn cropped(size: PageSize, band: CropBand) -> Self {
        let (top, bottom) = band.band(size.height);
        Self {
            left: 0.0,
            right: size.width,
            top,
            bottom,
        }
    }
}

/// A readable paginated document. Indices are 0-based.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageSize, PageFault>;

    /// Text inside `region`, or `None` when the page has no text there.
    fn text_in_region(&self, index: usize, region: TextRegion) -> Result<Option<String>, PageFault>;
}

/// Result of extracting every page of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPages {
    pub pages: PageTexts,
    pub total_pages: usize,
    /// Set when a page-level failure stopped extraction early.
    pub stopped_at: Option<PageFault>,
}

/// Extract cropped text from every page, in page order.
///
/// Pages that yield no text are omitted. A page-level failure stops the scan;
/// pages read before it are returned and the fault is recorded.
pub fn extract_pages<D: DocumentSource + ?Sized>(doc: &D, band: CropBand) -> ExtractedPages {
    let total_pages = doc.page_count();
    let mut pages = PageTexts::new();
    let mut stopped_at = None;

    for index in 0..total_pages {
        let page_num = index + 1;
        let text = doc
            .page_size(index)
            .and_then(|size| doc.text_in_region(index, TextRegion::cropped(size, band)));

        match text {
            Ok(Some(raw)) => {
                let text = postprocess::clean_page_text(&raw);
                if text.is_empty() {
                    debug!("Page {}: no text inside crop band", page_num);
                } else {
                    debug!("Page {}: {} chars", page_num, text.len());
                    pages.insert(page_num, text);
                }
            }
            Ok(None) => debug!("Page {}: no text inside crop band", page_num),
            Err(fault) => {
                warn!(
                    "Stopping extraction at page {}/{}: {}",
                    page_num, total_pages, fault
                );
                stopped_at = Some(fault);
                break;
            }
        }
    }

    ExtractedPages {
        pages,
        total_pages,
        stopped_at,
    }
}

/// Extract pages and build the section tree in one step.
pub fn extract_sections<D: DocumentSource + ?Sized>(doc: &D, band: CropBand) -> SectionTree {
    build_sections(&extract_pages(doc, band).pages)
}

// ── pdfium-backed source ─────────────────────────────────────────────────

/// A [`DocumentSource`] over a pdfium document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        Self { document }
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, PageFault> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| PageFault {
                page: index + 1,
                detail: format!("{:?}", e),
            })
    }
}

impl DocumentSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, PageFault> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn text_in_region(&self, index: usize, region: TextRegion) -> Result<Option<String>, PageFault> {
        let page = self.page(index)?;
        let height = page.height().value;
        let text = page.text().map_err(|e| PageFault {
            page: index + 1,
            detail: format!("text layer unavailable: {:?}", e),
        })?;

        // PDF user space grows upwards from the bottom edge.
        let rect = PdfRect::new_from_values(
            height - region.bottom,
            region.left,
            height - region.top,
            region.right,
        );
        let extracted = text.inside_rect(rect);
        Ok((!extracted.trim().is_empty()).then_some(extracted))
    }
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, DigestError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DigestError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open `pdf_path` and extract its cropped page texts.
///
/// Runs inside `spawn_blocking` since pdfium is blocking.
pub async fn extract_pdf_pages(
    pdf_path: &Path,
    password: Option<&str>,
    band: CropBand,
) -> Result<ExtractedPages, DigestError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_pdf_pages_blocking(&path, pwd.as_deref(), band))
        .await
        .map_err(|e| DigestError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_pdf_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    band: CropBand,
) -> Result<ExtractedPages, DigestError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                DigestError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                DigestError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            DigestError::DocumentRead {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let source = PdfiumDocument::new(document);
    let extracted = extract_pages(&source, band);
    info!(
        "Extracted text from {}/{} pages of {}",
        extracted.pages.len(),
        extracted.total_pages,
        pdf_path.display()
    );
    Ok(extracted)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory document: each page is a list of `(y_from_top, line)`.
    pub(crate) struct FakeDocument {
        pub height: f32,
        pub pages: Vec<Result<Vec<(f32, &'static str)>, &'static str>>,
    }

    impl DocumentSource for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, index: usize) -> Result<PageSize, PageFault> {
            match &self.pages[index] {
                Ok(_) => Ok(PageSize {
                    width: 600.0,
                    height: self.height,
                }),
                Err(detail) => Err(PageFault {
                    page: index + 1,
                    detail: detail.to_string(),
                }),
            }
        }

        fn text_in_region(
            &self,
            index: usize,
            region: TextRegion,
        ) -> Result<Option<String>, PageFault> {
            let lines = self.pages[index].as_ref().map_err(|d| PageFault {
                page: index + 1,
                detail: d.to_string(),
            })?;
            let kept: Vec<&str> = lines
                .iter()
                .filter(|(y, _)| *y >= region.top && *y <= region.bottom)
                .map(|(_, l)| *l)
                .collect();
            Ok((!kept.is_empty()).then(|| kept.join("\r\n")))
        }
    }

    #[test]
    fn region_uses_band_from_top() {
        let r = TextRegion::cropped(
            PageSize {
                width: 612.0,
                height: 792.0,
            },
            CropBand::default(),
        );
        assert_eq!(r.left, 0.0);
        assert_eq!(r.right, 612.0);
        assert!((r.top - 79.2).abs() < 1e-3);
        assert!((r.bottom - 712.8).abs() < 1e-3);
    }

    #[test]
    fn header_and_footer_lines_are_cut() {
        let doc = FakeDocument {
            height: 1000.0,
            pages: vec![Ok(vec![
                (20.0, "Proceedings of Things 2024"),
                (150.0, "1 Introduction"),
                (200.0, "  We study X.  "),
                (980.0, "Page 1"),
            ])],
        };
        let out = extract_pages(&doc, CropBand::default());
        assert_eq!(out.total_pages, 1);
        assert_eq!(out.pages.get(&1).unwrap(), "1 Introduction\n  We study X.");
        assert!(out.stopped_at.is_none());
    }

    #[test]
    fn blank_pages_are_omitted() {
        let doc = FakeDocument {
            height: 1000.0,
            pages: vec![
                Ok(vec![(500.0, "1 Intro")]),
                Ok(vec![(10.0, "header only")]),
                Ok(vec![(500.0, "   ")]),
                Ok(vec![(500.0, "2 Method")]),
            ],
        };
        let out = extract_pages(&doc, CropBand::default());
        assert_eq!(out.pages.keys().copied().collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn page_fault_keeps_earlier_pages() {
        let doc = FakeDocument {
            height: 1000.0,
            pages: vec![
                Ok(vec![(500.0, "1 Intro")]),
                Err("broken content stream"),
                Ok(vec![(500.0, "2 Method")]),
            ],
        };
        let out = extract_pages(&doc, CropBand::default());
        assert_eq!(out.pages.len(), 1);
        assert_eq!(out.stopped_at.unwrap().page, 2);
    }

    #[test]
    fn extract_sections_from_source() {
        let doc = FakeDocument {
            height: 1000.0,
            pages: vec![
                Ok(vec![(150.0, "A Paper"), (300.0, "1 Introduction"), (320.0, "Text.")]),
                Ok(vec![(150.0, "1.1 Background"), (170.0, "More.")]),
            ],
        };
        let tree = extract_sections(&doc, CropBand::default());
        assert_eq!(tree.ids(), vec!["1"]);
        assert_eq!(tree.get("1").unwrap().subsection("1.1").unwrap().page, 2);
    }
}
