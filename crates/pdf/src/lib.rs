//! PDF adapters for the price redaction engine.
//!
//! 提取器（lopdf / pdfium）把页面变成带坐标的词，合成器按脱敏计划
//! 删除字形并绘制白框，页数、页序、页面尺寸保持不变。

mod extract;
mod fonts;
mod metadata;
#[cfg(feature = "pdfium")]
mod pdfium;
mod standard_fonts;
mod strip;
mod utils;
mod walker;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use lopdf::{Document, ObjectId};
use pricemask_core::{InvoiceDocument, Page, PagePlan, RedactConfig};
use serde::{Deserialize, Serialize};

use fonts::FontTable;
use strip::{add_white_overlay, strip_content_stream, UserRect};
use utils::{get_media_box, get_page_content, get_page_fonts, replace_page_content};

pub use utils::PageBox;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("无法加载 PDF: {0}")]
    Load(String),
    #[error("PDF 结构错误: {0}")]
    Parse(String),
    #[error("页面 {} 内容流无法解析: {reason}", page + 1)]
    Content { page: usize, reason: String },
    #[error("文档中没有可提取的文字（可能是扫描件）")]
    NoText,
    #[error("pdfium 错误: {0}")]
    Pdfium(String),
    #[error("页数不一致: 计划 {plans} 页, 文档 {pages} 页")]
    PageCountMismatch { plans: usize, pages: usize },
    #[error("保存失败: {0}")]
    Save(String),
}

/// 合成策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// 删除矩形内的字形后再绘制白框
    #[default]
    StripAndCover,
    /// 只绘制白框，文字仍可被提取
    CoverOnly,
}

impl FromStr for RedactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip" | "strip-and-cover" | "strip_and_cover" => Ok(Self::StripAndCover),
            "cover" | "cover-only" | "cover_only" => Ok(Self::CoverOnly),
            other => Err(format!("未知的脱敏模式: {other}（可选 strip, cover）")),
        }
    }
}

impl fmt::Display for RedactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StripAndCover => write!(f, "strip"),
            Self::CoverOnly => write!(f, "cover"),
        }
    }
}

/// 文字提取器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// 优先 pdfium，不可用时回退到 lopdf
    #[default]
    Auto,
    Lopdf,
    Pdfium,
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "lopdf" => Ok(Self::Lopdf),
            "pdfium" => Ok(Self::Pdfium),
            other => Err(format!("未知的提取器: {other}（可选 auto, lopdf, pdfium）")),
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Lopdf => write!(f, "lopdf"),
            Self::Pdfium => write!(f, "pdfium"),
        }
    }
}

/// 清理选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleaningOptions {
    /// 清理 Info 字典中的原有字段
    pub document_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfOptions {
    pub mode: RedactionMode,
    pub extractor: ExtractorKind,
    pub cleaning: CleaningOptions,
    /// 拼词时允许的水平间隙
    pub x_tolerance: f64,
    /// 拼词时允许的垂直跳动
    pub y_tolerance: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self::from_config(&RedactConfig::default())
    }
}

impl PdfOptions {
    /// 拼词容差与引擎配置保持一致
    pub fn from_config(config: &RedactConfig) -> Self {
        Self {
            mode: RedactionMode::default(),
            extractor: ExtractorKind::default(),
            cleaning: CleaningOptions::default(),
            x_tolerance: config.word_gap_tolerance,
            y_tolerance: config.line_tolerance,
        }
    }
}

/// 已加载的 PDF 文档
pub struct PdfDocument {
    doc: Document,
    #[cfg_attr(not(feature = "pdfium"), allow(dead_code))]
    bytes: Vec<u8>,
    options: PdfOptions,
}

impl PdfDocument {
    pub fn from_bytes(bytes: Vec<u8>, options: PdfOptions) -> Result<Self, PdfError> {
        let doc = Document::load_mem(&bytes).map_err(|e| PdfError::Load(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(PdfError::Load("不支持加密的 PDF".to_string()));
        }
        Ok(Self {
            doc,
            bytes,
            options,
        })
    }

    pub fn load_with(path: &Path, options: PdfOptions) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        log::info!("[Load] {} ({} 字节)", path.display(), bytes.len());
        Self::from_bytes(bytes, options)
    }

    pub fn options(&self) -> &PdfOptions {
        &self.options
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// 每页的 MediaBox，按页序
    pub fn page_boxes(&self) -> Vec<PageBox> {
        self.page_ids()
            .into_iter()
            .map(|id| get_media_box(&self.doc, id))
            .collect()
    }

    fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().values().copied().collect()
    }

    #[cfg(feature = "pdfium")]
    fn extract_with_pdfium(&self) -> Result<Vec<Page>, PdfError> {
        let pdfium = pdfium::bind_pdfium()?;
        pdfium::extract_document(
            &pdfium,
            &self.bytes,
            &self.page_boxes(),
            self.options.x_tolerance,
            self.options.y_tolerance,
        )
    }

    #[cfg(not(feature = "pdfium"))]
    fn extract_with_pdfium(&self) -> Result<Vec<Page>, PdfError> {
        Err(PdfError::Pdfium("编译时未启用 pdfium 功能".to_string()))
    }

    fn extract_with_lopdf(&self) -> Result<Vec<Page>, PdfError> {
        extract::extract_document(&self.doc, self.options.x_tolerance, self.options.y_tolerance)
    }
}

/// 在单页上执行合成
fn compose_page(
    doc: &mut Document,
    page_id: ObjectId,
    plan: &PagePlan,
    mode: RedactionMode,
) -> Result<(), PdfError> {
    let page = plan.page_index;
    let media_box = get_media_box(doc, page_id);
    let rects: Vec<UserRect> = plan
        .rects
        .iter()
        .map(|r| UserRect::from_plan(r, &media_box))
        .collect();

    let content_data = get_page_content(doc, page_id)?;
    let body = match mode {
        RedactionMode::StripAndCover => {
            let fonts = FontTable::from_resources(doc, get_page_fonts(doc, page_id));
            let (data, removed) = strip_content_stream(&content_data, &fonts, &rects)
                .map_err(|reason| PdfError::Content { page, reason })?;
            if removed == 0 {
                log::warn!("[Compose] 页面 {} 没有删除任何字形，仅绘制白框", page + 1);
            }
            data
        }
        RedactionMode::CoverOnly => content_data,
    };

    let final_data =
        add_white_overlay(&body, &rects).map_err(|reason| PdfError::Content { page, reason })?;
    replace_page_content(doc, page_id, final_data)?;

    log::info!(
        "[Compose] 页面 {}: {} 个白框 ({})",
        page + 1,
        rects.len(),
        mode
    );
    Ok(())
}

impl InvoiceDocument for PdfDocument {
    type Error = PdfError;

    fn load(path: &Path) -> Result<Self, Self::Error> {
        Self::load_with(path, PdfOptions::default())
    }

    fn get_pages(&self) -> Result<Vec<Page>, Self::Error> {
        let pages = match self.options.extractor {
            ExtractorKind::Lopdf => self.extract_with_lopdf()?,
            ExtractorKind::Pdfium => self.extract_with_pdfium()?,
            ExtractorKind::Auto if cfg!(feature = "pdfium") => match self.extract_with_pdfium() {
                Ok(pages) => pages,
                Err(e) => {
                    log::warn!("[Extract] pdfium 提取失败: {}，回退到 lopdf", e);
                    self.extract_with_lopdf()?
                }
            },
            ExtractorKind::Auto => self.extract_with_lopdf()?,
        };

        if pages.iter().all(|p| p.tokens.is_empty()) {
            return Err(PdfError::NoText);
        }
        Ok(pages)
    }

    fn redact(&self, plans: &[PagePlan]) -> Result<Vec<u8>, Self::Error> {
        let mut doc = self.doc.clone();
        let page_ids = self.page_ids();
        if plans.len() != page_ids.len() {
            return Err(PdfError::PageCountMismatch {
                plans: plans.len(),
                pages: page_ids.len(),
            });
        }

        for (plan, page_id) in plans.iter().zip(&page_ids) {
            // 无矩形的页（含退化页）原样保留
            if plan.rects.is_empty() {
                continue;
            }
            compose_page(&mut doc, *page_id, plan, self.options.mode)?;
        }

        // 被替换的旧内容流不再被引用，不能留在输出文件里
        let pruned = doc.prune_objects();
        log::debug!("[Redact] 删除 {} 个未引用对象", pruned.len());

        if self.options.cleaning.document_info {
            let cleaned = metadata::clean_info_dict(&mut doc);
            for detail in &cleaned.details {
                log::debug!("[Metadata] {}", detail);
            }
        }
        metadata::set_redaction_metadata(&mut doc)?;

        doc.compress();
        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| PdfError::Save(e.to_string()))?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use pricemask_core::{redact_document, PageStatus};

    type Words<'a> = Vec<(&'a str, f64, f64)>;

    fn page_content(words: &[(&str, f64, f64)]) -> Vec<u8> {
        let mut operations = Vec::new();
        for (text, x, y) in words {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 9.into()]));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(*x as f32), Object::Real(*y as f32)],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        Content { operations }.encode().unwrap()
    }

    fn build_pdf(pages: &[Words<'_>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for words in pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(words)));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    fn invoice_page() -> Words<'static> {
        vec![
            ("INVOICE", 40.0, 780.0),
            ("NO.", 100.0, 780.0),
            ("2024", 420.0, 780.0),
            ("ITEM", 40.0, 640.0),
            ("DESCRIPTION", 90.0, 640.0),
            ("QTY", 300.0, 640.0),
            ("UNIT", 400.0, 640.0),
            ("PRICE", 430.0, 640.0),
            ("1", 40.0, 620.0),
            ("BOLT", 90.0, 620.0),
            ("45", 300.0, 620.0),
            ("USD", 400.0, 620.0),
            ("1,234.56", 430.0, 620.0),
            ("PAYMENT", 40.0, 600.0),
            ("TERM:", 100.0, 600.0),
            ("45", 150.0, 600.0),
            ("DAYS", 170.0, 600.0),
            ("O/A", 200.0, 600.0),
            ("99.00", 420.0, 600.0),
            ("TOTAL", 40.0, 560.0),
            ("QUANTITY", 80.0, 560.0),
            ("45", 300.0, 560.0),
            ("SUB", 300.0, 540.0),
            ("TOTAL", 330.0, 540.0),
            ("AMOUNT", 365.0, 540.0),
            ("USD", 410.0, 540.0),
            ("100.00", 440.0, 540.0),
            ("SAY", 40.0, 300.0),
            ("TOTAL:", 70.0, 300.0),
            ("FIVE", 120.0, 300.0),
            ("HUNDRED", 150.0, 300.0),
            ("DOLLARS", 200.0, 300.0),
            ("ONLY", 250.0, 300.0),
        ]
    }

    fn notes_page() -> Words<'static> {
        vec![("THANK", 40.0, 700.0), ("YOU", 90.0, 700.0), ("12.50", 420.0, 680.0)]
    }

    fn lopdf_options(mode: RedactionMode) -> PdfOptions {
        PdfOptions {
            mode,
            extractor: ExtractorKind::Lopdf,
            ..PdfOptions::default()
        }
    }

    fn texts(page: &Page) -> Vec<String> {
        page.tokens.iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn test_extract_words_with_positions() {
        let doc = PdfDocument::from_bytes(build_pdf(&[invoice_page()]), lopdf_options(RedactionMode::StripAndCover)).unwrap();
        let pages = doc.get_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].height, 842.0);

        let usd = pages[0].tokens.iter().find(|t| t.text == "USD").unwrap();
        assert!((usd.x0 - 400.0).abs() < 1e-6);
        // Helvetica: U 722 + S 667 + D 722
        assert!((usd.x1 - 418.999).abs() < 1e-6);
        // 基线 620，上沿 620 + 0.8 * 9
        assert!((usd.top - (842.0 - 627.2)).abs() < 1e-6);
        assert_eq!(pages[0].tokens.len(), invoice_page().len());
    }

    #[test]
    fn test_strip_and_cover_end_to_end() {
        let input = build_pdf(&[invoice_page(), notes_page()]);
        let doc = PdfDocument::from_bytes(input, lopdf_options(RedactionMode::StripAndCover)).unwrap();
        let config = RedactConfig::default();
        let (output, plan) = redact_document(&doc, &config).unwrap();

        assert_eq!(plan.pages[0].rects.len(), 8);
        assert_eq!(plan.pages[0].status, PageStatus::Redacted);
        assert_eq!(plan.degraded_pages(), vec![1]);

        let redacted = PdfDocument::from_bytes(output, lopdf_options(RedactionMode::StripAndCover)).unwrap();
        assert_eq!(redacted.page_count(), 2);
        assert_eq!(redacted.page_boxes(), doc.page_boxes());

        let pages = redacted.get_pages().unwrap();
        let first = texts(&pages[0]);
        for gone in ["USD", "1,234.56", "100.00", "FIVE", "HUNDRED", "DOLLARS", "ONLY"] {
            assert!(!first.iter().any(|t| t == gone), "{gone} 应被删除");
        }
        for kept in ["INVOICE", "2024", "ITEM", "UNIT", "PRICE", "45", "99.00", "SUB", "AMOUNT", "SAY", "TOTAL:"] {
            assert!(first.iter().any(|t| t == kept), "{kept} 应保留");
        }
        // 未受影响的词位置不变
        let before = doc.get_pages().unwrap();
        let bolt = |p: &Page| p.tokens.iter().find(|t| t.text == "BOLT").cloned().unwrap();
        assert_eq!(bolt(&before[0]), bolt(&pages[0]));

        // 退化页原样输出
        assert_eq!(texts(&pages[1]), texts(&before[1]));

        // 再跑一次不再产生矩形
        let (_, second) = redact_document(&redacted, &config).unwrap();
        assert_eq!(second.total_rects(), 0);
    }

    fn streams_containing(output: &[u8], needle: &[u8]) -> Vec<ObjectId> {
        let doc = Document::load_mem(output).unwrap();
        doc.objects
            .iter()
            .filter_map(|(id, object)| match object {
                Object::Stream(stream) => Some((*id, utils::get_stream_content(stream))),
                _ => None,
            })
            .filter(|(_, data)| data.windows(needle.len()).any(|w| w == needle))
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn test_stripped_prices_absent_from_every_stream() {
        let input = build_pdf(&[invoice_page()]);
        let config = RedactConfig::default();

        let doc = PdfDocument::from_bytes(input.clone(), lopdf_options(RedactionMode::StripAndCover)).unwrap();
        let (output, _) = redact_document(&doc, &config).unwrap();
        for price in [b"1,234.56".as_slice(), b"100.00", b"HUNDRED"] {
            assert!(
                streams_containing(&output, price).is_empty(),
                "{} 仍残留在输出文件中",
                String::from_utf8_lossy(price)
            );
        }
        // 未脱敏的词仍在
        assert!(!streams_containing(&output, b"BOLT").is_empty());

        // 仅覆盖模式下价格仍在内容流里
        let doc = PdfDocument::from_bytes(input, lopdf_options(RedactionMode::CoverOnly)).unwrap();
        let (output, _) = redact_document(&doc, &config).unwrap();
        assert!(!streams_containing(&output, b"1,234.56").is_empty());
    }

    #[test]
    fn test_degraded_page_content_untouched() {
        let input = build_pdf(&[invoice_page(), notes_page()]);
        let doc = PdfDocument::from_bytes(input, lopdf_options(RedactionMode::StripAndCover)).unwrap();
        let (output, _) = redact_document(&doc, &RedactConfig::default()).unwrap();
        let redacted = PdfDocument::from_bytes(output, lopdf_options(RedactionMode::StripAndCover)).unwrap();

        let original_ids = doc.page_ids();
        let redacted_ids = redacted.page_ids();
        let before = get_page_content(&doc.doc, original_ids[1]).unwrap();
        let after = get_page_content(&redacted.doc, redacted_ids[1]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_cover_only_keeps_text_and_paints_white() {
        let input = build_pdf(&[invoice_page()]);
        let doc = PdfDocument::from_bytes(input, lopdf_options(RedactionMode::CoverOnly)).unwrap();
        let (output, plan) = redact_document(&doc, &RedactConfig::default()).unwrap();
        assert_eq!(plan.total_rects(), 8);

        let redacted = PdfDocument::from_bytes(output, lopdf_options(RedactionMode::CoverOnly)).unwrap();
        let pages = redacted.get_pages().unwrap();
        assert!(texts(&pages[0]).iter().any(|t| t == "1,234.56"));

        let content = get_page_content(&redacted.doc, redacted.page_ids()[0]).unwrap();
        let ops = Content::decode(&content).unwrap().operations;
        assert_eq!(ops.iter().filter(|op| op.operator == "re").count(), 8);
        assert!(ops.iter().any(|op| op.operator == "rg"));
    }

    #[test]
    fn test_document_without_text_fails() {
        let input = build_pdf(&[vec![]]);
        let doc = PdfDocument::from_bytes(input, lopdf_options(RedactionMode::StripAndCover)).unwrap();
        assert!(matches!(redact_document(&doc, &RedactConfig::default()), Err(PdfError::NoText)));
    }

    #[test]
    fn test_plan_count_must_match() {
        let doc = PdfDocument::from_bytes(build_pdf(&[invoice_page()]), PdfOptions::default()).unwrap();
        assert!(matches!(
            doc.redact(&[]),
            Err(PdfError::PageCountMismatch { plans: 0, pages: 1 })
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_load() {
        assert!(matches!(
            PdfDocument::from_bytes(b"not a pdf".to_vec(), PdfOptions::default()),
            Err(PdfError::Load(_))
        ));
    }

    #[test]
    fn test_mode_and_extractor_parsing() {
        assert_eq!("cover".parse::<RedactionMode>().unwrap(), RedactionMode::CoverOnly);
        assert_eq!("STRIP".parse::<RedactionMode>().unwrap(), RedactionMode::StripAndCover);
        assert!("blur".parse::<RedactionMode>().is_err());
        assert_eq!("lopdf".parse::<ExtractorKind>().unwrap(), ExtractorKind::Lopdf);
        assert_eq!(RedactionMode::CoverOnly.to_string(), "cover");
    }
}
