//! 页面脱敏计划
//!
//! 行分组 → 锚点 → 区域 → 分类 → 矩形，每页独立计算，只读该页的词。

use serde::{Deserialize, Serialize};

use crate::anchors::{locate_anchors, AnchorKind};
use crate::classify::{classify_page, PageFrame, Reason, Selection};
use crate::config::RedactConfig;
use crate::document::Page;
use crate::geometry::RedactionRect;
use crate::lines::group_lines;
use crate::region::bound_region;

/// 页面处理状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// 生成了覆盖矩形
    Redacted,
    /// 锚点齐全，但没有需要脱敏的内容
    NothingToRedact,
    /// 缺少必需锚点，整页原样输出，需要人工复核
    Degraded { missing: Vec<AnchorKind> },
    /// 锚点齐全但表尾在表头之上，同样整页原样输出
    RegionInverted,
}

/// 一页的脱敏计划
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePlan {
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    pub rects: Vec<RedactionRect>,
    pub status: PageStatus,
    /// 几何退化而跳过的词
    pub skipped_malformed: usize,
    /// 表头只匹配到 ITEM
    pub header_degraded: bool,
}

impl PagePlan {
    fn untouched(page: &Page, status: PageStatus) -> Self {
        Self {
            page_index: page.page_index,
            width: page.width,
            height: page.height,
            rects: Vec::new(),
            status,
            skipped_malformed: 0,
            header_degraded: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            PageStatus::Degraded { .. } | PageStatus::RegionInverted
        )
    }
}

/// 为选中的词生成覆盖矩形，一词一框，不合并
///
/// 返回矩形和被跳过的退化词数量。
pub fn build_rects(
    selections: &[Selection<'_>],
    page_height: f64,
    padding: f64,
) -> (Vec<RedactionRect>, usize) {
    let mut rects = Vec::with_capacity(selections.len());
    let mut skipped = 0;

    for selection in selections {
        let token = selection.token;
        if token.is_malformed() {
            log::warn!(
                "[Rects] 跳过几何退化的词 {:?} ({:.2}, {:.2}, {:.2}, {:.2})",
                token.text,
                token.x0,
                token.top,
                token.x1,
                token.bottom
            );
            skipped += 1;
            continue;
        }
        rects.push(RedactionRect::from_token(token, page_height, padding));
    }

    (rects, skipped)
}

/// 计算一页的脱敏计划
pub fn plan_page(page: &Page, config: &RedactConfig) -> PagePlan {
    let lines = group_lines(&page.tokens, config.line_tolerance);
    let anchors = locate_anchors(&lines, &config.rules, config.allow_item_only_header);

    let missing = anchors.missing_required();
    if !missing.is_empty() {
        log::warn!(
            "[Plan] 页面 {} 缺少锚点 {:?}，整页不脱敏",
            page.page_index + 1,
            missing
        );
        return PagePlan::untouched(page, PageStatus::Degraded { missing });
    }

    let Some(region) = bound_region(&anchors, page.height, config) else {
        return PagePlan::untouched(page, PageStatus::RegionInverted);
    };
    let Some(price_x) = anchors.price_column.and_then(|a| a.x) else {
        return PagePlan::untouched(
            page,
            PageStatus::Degraded {
                missing: vec![AnchorKind::PriceColumn],
            },
        );
    };

    let frame = PageFrame {
        region,
        price_x,
        page_height: page.height,
    };
    let selections = classify_page(&lines, &anchors, frame, config);
    let (rects, skipped_malformed) = build_rects(&selections, page.height, config.rect_padding);

    let tail = selections
        .iter()
        .filter(|s| s.reason == Reason::SayTotalTail)
        .count();
    log::info!(
        "[Plan] 页面 {}: {} 个词, {} 行, {} 个覆盖框 (SAY TOTAL 尾部 {})",
        page.page_index + 1,
        page.tokens.len(),
        lines.len(),
        rects.len(),
        tail
    );

    let status = if rects.is_empty() {
        PageStatus::NothingToRedact
    } else {
        PageStatus::Redacted
    };

    PagePlan {
        page_index: page.page_index,
        width: page.width,
        height: page.height,
        rects,
        status,
        skipped_malformed,
        header_degraded: anchors.header_degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Token;

    const H: f64 = 842.0;

    fn row(words: &[(&str, f64)], top: f64) -> Vec<Token> {
        words
            .iter()
            .map(|(w, x)| Token::new(*w, *x, top, *x + 6.0 * w.chars().count() as f64, top + 9.0, 0))
            .collect()
    }

    fn page(tokens: Vec<Token>) -> Page {
        Page {
            page_index: 0,
            width: 595.0,
            height: H,
            tokens,
        }
    }

    fn invoice() -> Vec<Token> {
        let mut tokens = Vec::new();
        tokens.extend(row(&[("ITEM", 40.0), ("DESCRIPTION", 90.0), ("UNIT", 400.0), ("PRICE", 430.0)], 200.0));
        tokens.extend(row(&[("1", 40.0), ("NUT", 90.0), ("USD", 410.0), ("1,234.56", 440.0)], 220.0));
        tokens.extend(row(&[("TOTAL", 40.0), ("QUANTITY", 80.0)], 300.0));
        tokens
    }

    #[test]
    fn test_one_rect_per_token() {
        let plan = plan_page(&page(invoice()), &RedactConfig::default());
        assert_eq!(plan.status, PageStatus::Redacted);
        assert_eq!(plan.rects.len(), 2);

        let usd = plan.rects[0];
        assert_eq!(usd.x0, 409.0);
        assert_eq!(usd.x1, 429.0);
        assert_eq!(usd.y0, H - 229.0 - 1.0);
        assert_eq!(usd.y1, H - 220.0 + 1.0);
    }

    #[test]
    fn test_page_without_unit_price_is_degraded() {
        let mut tokens = invoice();
        tokens.retain(|t| t.text != "UNIT");
        let plan = plan_page(&page(tokens), &RedactConfig::default());
        assert!(plan.rects.is_empty());
        assert_eq!(
            plan.status,
            PageStatus::Degraded {
                missing: vec![AnchorKind::PriceColumn]
            }
        );
    }

    #[test]
    fn test_page_without_footer_is_degraded() {
        let mut tokens = invoice();
        tokens.retain(|t| t.text != "QUANTITY");
        // SAY TOTAL 也不得在退化页上生效
        tokens.extend(row(&[("SAY", 40.0), ("TOTAL", 70.0), ("TEN", 120.0)], 600.0));
        let plan = plan_page(&page(tokens), &RedactConfig::default());
        assert!(plan.is_degraded());
        assert!(plan.rects.is_empty());
    }

    #[test]
    fn test_footer_above_header_is_region_inverted() {
        let mut tokens = row(&[("TOTAL", 40.0), ("QUANTITY", 80.0)], 100.0);
        tokens.extend(row(&[("ITEM", 40.0), ("DESCRIPTION", 90.0), ("UNIT", 400.0), ("PRICE", 430.0)], 200.0));
        tokens.extend(row(&[("1", 40.0), ("NUT", 90.0), ("USD", 410.0), ("1,234.56", 440.0)], 220.0));
        let plan = plan_page(&page(tokens), &RedactConfig::default());
        assert_eq!(plan.status, PageStatus::RegionInverted);
        assert!(plan.is_degraded());
        assert!(plan.rects.is_empty());
    }

    #[test]
    fn test_malformed_token_skipped() {
        let mut tokens = invoice();
        tokens.push(Token::new("9.99", 480.0, 221.0, 480.0, 230.0, 0));
        let plan = plan_page(&page(tokens), &RedactConfig::default());
        assert_eq!(plan.rects.len(), 2);
        assert_eq!(plan.skipped_malformed, 1);
    }

    #[test]
    fn test_nothing_to_redact() {
        let mut tokens = invoice();
        tokens.retain(|t| t.text != "USD" && t.text != "1,234.56");
        let plan = plan_page(&page(tokens), &RedactConfig::default());
        assert_eq!(plan.status, PageStatus::NothingToRedact);
    }

    #[test]
    fn test_replanning_redacted_tokens_is_stable() {
        // 去掉已脱敏的词后再跑一次，不再产生新的矩形
        let config = RedactConfig::default();
        let first = plan_page(&page(invoice()), &config);
        let remaining: Vec<Token> = invoice()
            .into_iter()
            .filter(|t| {
                let (cx, cy) = ((t.x0 + t.x1) / 2.0, H - (t.top + t.bottom) / 2.0);
                !first.rects.iter().any(|r| r.contains_point(cx, cy))
            })
            .collect();
        let second = plan_page(&page(remaining), &config);
        assert!(second.rects.is_empty());
    }
}
