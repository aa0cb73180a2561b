//! 批量处理
//!
//! 每份文档独立处理：读取 → 计划 → 合成 →（可选）复查 → 写出。
//! 任何一步失败都不写输出文件。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pricemask_core::{redact_document, AnchorKind, PagePlan, PageStatus, RedactConfig};
use pricemask_pdf::{PdfDocument, PdfOptions, RedactionMode};
use pricemask_verify::{verify_output, VerifyOptions, VerifyResult};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub out_dir: PathBuf,
    pub suffix: String,
    pub pdf: PdfOptions,
    pub config: RedactConfig,
    pub verify: bool,
}

/// 需要人工复核的页
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedPage {
    /// 页码，从 1 开始
    pub page: usize,
    pub missing: Vec<AnchorKind>,
    /// 锚点齐全但表尾在表头之上
    pub region_inverted: bool,
}

impl DegradedPage {
    fn from_plan(plan: &PagePlan) -> Option<Self> {
        let (missing, region_inverted) = match &plan.status {
            PageStatus::Degraded { missing } => (missing.clone(), false),
            PageStatus::RegionInverted => (Vec::new(), true),
            _ => return None,
        };
        Some(Self {
            page: plan.page_index + 1,
            missing,
            region_inverted,
        })
    }

    pub fn describe(&self) -> String {
        if self.region_inverted {
            "表尾位于表头之上".to_string()
        } else {
            format!("缺少 {:?}", self.missing)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub pages: usize,
    pub rects: usize,
    pub degraded_pages: Vec<DegradedPage>,
    /// 只凭 ITEM 定位表头的页（从 1 开始）
    pub item_only_header_pages: Vec<usize>,
    /// 几何退化而未覆盖的词数
    pub skipped_malformed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    fn failed(input: &Path, error: String) -> Self {
        Self {
            input: input.to_path_buf(),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    pub fn degraded(&self) -> usize {
        self.documents
            .iter()
            .map(|d| d.degraded_pages.len())
            .sum()
    }
}

/// `<out_dir>/<stem><suffix>.pdf`
pub fn output_path(input: &Path, out_dir: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    out_dir.join(format!("{}{}.pdf", stem, suffix))
}

/// 处理单份文档
pub fn process_document(input: &Path, output: &Path, options: &BatchOptions) -> Result<DocumentReport> {
    if output == input {
        bail!("输出路径与输入相同: {}", input.display());
    }

    let doc = PdfDocument::load_with(input, options.pdf.clone())
        .with_context(|| format!("无法读取 {}", input.display()))?;
    let (bytes, plan) = redact_document(&doc, &options.config)
        .with_context(|| format!("脱敏失败 {}", input.display()))?;

    let degraded_pages: Vec<DegradedPage> = plan.pages.iter().filter_map(DegradedPage::from_plan).collect();
    for page in &degraded_pages {
        log::warn!(
            "[Batch] {} 第 {} 页{}，未脱敏，需要人工复核",
            input.display(),
            page.page,
            page.describe()
        );
    }
    let item_only_header_pages: Vec<usize> = plan
        .pages
        .iter()
        .filter(|p| p.header_degraded)
        .map(|p| p.page_index + 1)
        .collect();
    let skipped_malformed: usize = plan.pages.iter().map(|p| p.skipped_malformed).sum();
    if skipped_malformed > 0 {
        log::warn!("[Batch] {} 有 {} 个词几何退化，未覆盖", input.display(), skipped_malformed);
    }

    let verify = if options.verify {
        let redacted = PdfDocument::from_bytes(bytes.clone(), options.pdf.clone())
            .context("无法重新读取输出文档")?;
        let verify_options = VerifyOptions {
            text_removed: options.pdf.mode == RedactionMode::StripAndCover,
            geometry: true,
        };
        let result = verify_output(&doc, &redacted, &options.config, &verify_options)?;
        if !result.ok {
            bail!("复查未通过: {}", result.warnings.join("; "));
        }
        Some(result)
    } else {
        None
    };

    fs::write(output, &bytes).with_context(|| format!("无法写入 {}", output.display()))?;
    log::info!(
        "[Batch] {} -> {} ({} 个覆盖框)",
        input.display(),
        output.display(),
        plan.total_rects()
    );

    Ok(DocumentReport {
        input: input.to_path_buf(),
        output: Some(output.to_path_buf()),
        pages: plan.pages.len(),
        rects: plan.total_rects(),
        degraded_pages,
        item_only_header_pages,
        skipped_malformed,
        verify,
        error: None,
    })
}

/// 并行处理多份文档，结果按输入顺序返回
pub fn run_batch(inputs: &[PathBuf], options: &BatchOptions) -> BatchReport {
    // 同名输入会写到同一个输出文件，后出现的直接判为失败
    let mut seen = HashSet::new();
    let jobs: Vec<(&PathBuf, PathBuf, bool)> = inputs
        .iter()
        .map(|input| {
            let output = output_path(input, &options.out_dir, &options.suffix);
            let unique = seen.insert(output.clone());
            (input, output, unique)
        })
        .collect();

    let documents = jobs
        .par_iter()
        .map(|(input, output, unique)| {
            if !unique {
                return DocumentReport::failed(
                    input,
                    format!("输出文件名冲突: {}", output.display()),
                );
            }
            match process_document(input, output, options) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("[Batch] {} 处理失败: {:#}", input.display(), e);
                    DocumentReport::failed(input, format!("{:#}", e))
                }
            }
        })
        .collect();

    BatchReport { documents }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(out_dir: &Path) -> BatchOptions {
        BatchOptions {
            out_dir: out_dir.to_path_buf(),
            suffix: "_tosale".to_string(),
            pdf: PdfOptions::default(),
            config: RedactConfig::default(),
            verify: false,
        }
    }

    fn plan(status: PageStatus) -> PagePlan {
        PagePlan {
            page_index: 2,
            width: 595.0,
            height: 842.0,
            rects: Vec::new(),
            status,
            skipped_malformed: 0,
            header_degraded: false,
        }
    }

    #[test]
    fn test_degraded_page_reasons() {
        let missing = DegradedPage::from_plan(&plan(PageStatus::Degraded {
            missing: vec![AnchorKind::TableFooter],
        }))
        .unwrap();
        assert_eq!(missing.page, 3);
        assert!(!missing.region_inverted);
        assert!(missing.describe().contains("TableFooter"));

        let inverted = DegradedPage::from_plan(&plan(PageStatus::RegionInverted)).unwrap();
        assert!(inverted.region_inverted);
        assert!(inverted.missing.is_empty());
        assert!(inverted.describe().contains("表尾"));

        assert!(DegradedPage::from_plan(&plan(PageStatus::NothingToRedact)).is_none());
    }

    #[test]
    fn test_output_name_appends_suffix() {
        let path = output_path(Path::new("/in/INV-2024-001.pdf"), Path::new("/out"), "_tosale");
        assert_eq!(path, PathBuf::from("/out/INV-2024-001_tosale.pdf"));
    }

    #[test]
    fn test_output_name_without_extension() {
        let path = output_path(Path::new("scan"), Path::new("out"), "_tosale");
        assert_eq!(path, PathBuf::from("out/scan_tosale.pdf"));
    }

    #[test]
    fn test_missing_file_is_reported_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.pdf");
        let report = run_batch(&[input], &options(dir.path()));
        assert_eq!(report.failed(), 1);
        assert!(report.documents[0].output.is_none());
        assert!(!dir.path().join("missing_tosale.pdf").exists());
    }

    #[test]
    fn test_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.pdf");
        fs::write(&input, b"%PDF-1.4 garbage").unwrap();
        let report = run_batch(&[input], &options(dir.path()));
        assert_eq!(report.succeeded(), 0);
        assert!(report.documents[0].error.is_some());
    }

    #[test]
    fn test_colliding_outputs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            dir.path().join("a").join("invoice.pdf"),
            dir.path().join("b").join("invoice.pdf"),
        ];
        let report = run_batch(&inputs, &options(dir.path()));
        assert_eq!(report.documents.len(), 2);
        let collision = report.documents[1].error.as_deref().unwrap();
        assert!(collision.contains("冲突"));
    }

    #[test]
    fn test_same_input_and_output_refused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("invoice.pdf");
        let err = process_document(&input, &input, &options(dir.path())).unwrap_err();
        assert!(err.to_string().contains("相同"));
    }
}
