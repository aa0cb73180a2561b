//! Post-processing verification checks.
//!
//! 对输出文档做一次独立复查：页数与页面尺寸必须和输入一致；
//! 内容删除模式下，用同一配置重新计划，不应再产生任何覆盖框。

use pricemask_core::{plan_page, InvoiceDocument, RedactConfig};
use pricemask_pdf::{PdfDocument, PdfError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("复查时读取文档失败: {0}")]
    Pdf(#[from] PdfError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyOptions {
    /// 重新提取输出文字，检查价格是否已被删除
    pub text_removed: bool,
    /// 检查页数与页面尺寸
    pub geometry: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            text_removed: true,
            geometry: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub ok: bool,
    pub warnings: Vec<String>,
    /// 重新计划后仍有覆盖框的页（从 0 开始）
    pub residual_pages: Vec<usize>,
}

impl VerifyResult {
    fn warn(&mut self, message: String) {
        log::warn!("[Verify] {}", message);
        self.warnings.push(message);
    }
}

/// 复查输出文档
pub fn verify_output(
    input: &PdfDocument,
    output: &PdfDocument,
    config: &RedactConfig,
    options: &VerifyOptions,
) -> Result<VerifyResult, VerifyError> {
    let mut result = VerifyResult::default();

    if options.geometry {
        let (before, after) = (input.page_boxes(), output.page_boxes());
        if before.len() != after.len() {
            result.warn(format!("页数不一致: 输入 {} 页, 输出 {} 页", before.len(), after.len()));
        } else {
            for (index, (a, b)) in before.iter().zip(&after).enumerate() {
                if a != b {
                    result.warn(format!("页面 {} 尺寸发生变化: {:?} -> {:?}", index + 1, a, b));
                }
            }
        }
    }

    if options.text_removed {
        match output.get_pages() {
            Ok(pages) => {
                for page in &pages {
                    let plan = plan_page(page, config);
                    if !plan.rects.is_empty() {
                        result.residual_pages.push(page.page_index);
                        result.warn(format!(
                            "页面 {} 仍可提取到 {} 个待脱敏的词",
                            page.page_index + 1,
                            plan.rects.len()
                        ));
                    }
                }
            }
            // 输出里一个字都提取不到，也就没有残留
            Err(PdfError::NoText) => {}
            Err(e) => return Err(e.into()),
        }
    }

    result.ok = result.warnings.is_empty();
    log::info!(
        "[Verify] 复查{}，{} 条警告",
        if result.ok { "通过" } else { "未通过" },
        result.warnings.len()
    );
    Ok(result)
}
