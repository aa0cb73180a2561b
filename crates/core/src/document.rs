//! 统一文档接口定义
//!
//! 文档适配器（提取器 + 合成器）都必须实现 `InvoiceDocument` trait，
//! 核心流程只通过这个接口与具体的文件格式打交道。

use serde::{Deserialize, Serialize};

use crate::config::RedactConfig;
use crate::plan::{plan_page, PagePlan};
use crate::geometry::Token;

/// 页面数据结构
///
/// 由提取器创建；覆盖矩形计算完成、输出组装后即丢弃。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 页面索引，从 0 开始
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    /// 该页所有词（提取器坐标系）
    pub tokens: Vec<Token>,
}

/// 统一文档接口
pub trait InvoiceDocument: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// 加载文档
    ///
    /// # 返回
    /// - 成功：已加载的文档实例
    /// - 失败：文件不存在、格式损坏等
    fn load(path: &std::path::Path) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// 提取每页带坐标的词
    ///
    /// 任何一页无法解析都视为整份文档失败，不产生部分输出。
    fn get_pages(&self) -> Result<Vec<Page>, Self::Error>;

    /// 按计划在每页绘制不透明白框并组装输出
    ///
    /// 页数、页序、页面尺寸必须与输入完全一致。
    fn redact(&self, plans: &[PagePlan]) -> Result<Vec<u8>, Self::Error>;
}

/// 一份文档的脱敏结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPlan {
    pub pages: Vec<PagePlan>,
}

impl DocumentPlan {
    pub fn total_rects(&self) -> usize {
        self.pages.iter().map(|p| p.rects.len()).sum()
    }

    /// 需要人工复核的页（从 0 开始）
    pub fn degraded_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| p.is_degraded())
            .map(|p| p.page_index)
            .collect()
    }
}

/// 逐页计算脱敏计划
pub fn plan_document(pages: &[Page], config: &RedactConfig) -> DocumentPlan {
    DocumentPlan {
        pages: pages.iter().map(|page| plan_page(page, config)).collect(),
    }
}

/// 完整流程：提取 → 计划 → 合成
pub fn redact_document<D: InvoiceDocument>(
    doc: &D,
    config: &RedactConfig,
) -> Result<(Vec<u8>, DocumentPlan), D::Error> {
    let pages = doc.get_pages()?;
    let plan = plan_document(&pages, config);
    let bytes = doc.redact(&plan.pages)?;
    Ok((bytes, plan))
}
