//! Layout-aware price redaction engine for invoice documents.
//!
//! 纯函数流水线，不做任何 I/O：
//! 行分组 → 锚点定位 → 区域界定 → 逐词分类 → 覆盖矩形。

pub mod anchors;
pub mod classify;
pub mod config;
pub mod document;
pub mod geometry;
pub mod glyphs;
pub mod lines;
pub mod plan;
pub mod region;
pub mod rules;

pub use anchors::{locate_anchors, Anchor, AnchorKind, PageAnchors};
pub use classify::{classify_page, Reason, Selection};
pub use config::{load_config, save_config, RedactConfig};
pub use document::{plan_document, redact_document, DocumentPlan, InvoiceDocument, Page};
pub use geometry::{ExtractorBox, RedactionRect, Region, RendererBox, Token};
pub use glyphs::{assemble_words, Glyph};
pub use lines::{group_lines, normalize_keyword, Line};
pub use plan::{build_rects, plan_page, PagePlan, PageStatus};
pub use region::bound_region;
pub use rules::{PriceShape, RuleSet};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
