//! 表格区域界定

use crate::anchors::PageAnchors;
use crate::config::RedactConfig;
use crate::geometry::{to_renderer_y, Region};

/// 由表头、表尾锚点推出表格的纵向范围（渲染器坐标系）
///
/// 表头向上、表尾向下各放宽一点，让恰好压在边界上的行也被包含。
/// 任一锚点缺失或范围倒置时返回 `None`，调用方必须整页放弃脱敏。
pub fn bound_region(anchors: &PageAnchors, page_height: f64, config: &RedactConfig) -> Option<Region> {
    let header = anchors.header?;
    let footer = anchors.footer?;

    let y_max = to_renderer_y(header.y - config.header_margin, page_height);
    let y_min = to_renderer_y(footer.y + config.footer_margin, page_height);

    if y_min > y_max {
        log::warn!(
            "[Region] 表尾位于表头之上 (header={:.2}, footer={:.2})，放弃该页",
            header.y,
            footer.y
        );
        return None;
    }

    Some(Region { y_min, y_max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::{Anchor, AnchorKind};

    fn at(kind: AnchorKind, y: f64) -> Option<Anchor> {
        Some(Anchor {
            kind,
            x: None,
            y,
            line: 0,
        })
    }

    #[test]
    fn test_region_with_margins() {
        let anchors = PageAnchors {
            header: at(AnchorKind::TableHeader, 200.0),
            footer: at(AnchorKind::TableFooter, 500.0),
            ..Default::default()
        };
        let region = bound_region(&anchors, 842.0, &RedactConfig::default()).unwrap();
        assert_eq!(region.y_max, 842.0 - 194.0);
        assert_eq!(region.y_min, 842.0 - 510.0);
        // 表头、表尾所在行都在范围内
        assert!(region.contains(842.0 - 200.0));
        assert!(region.contains(842.0 - 500.0));
    }

    #[test]
    fn test_missing_anchor_yields_none() {
        let anchors = PageAnchors {
            header: at(AnchorKind::TableHeader, 200.0),
            ..Default::default()
        };
        assert!(bound_region(&anchors, 842.0, &RedactConfig::default()).is_none());
    }

    #[test]
    fn test_inverted_region_yields_none() {
        let anchors = PageAnchors {
            header: at(AnchorKind::TableHeader, 600.0),
            footer: at(AnchorKind::TableFooter, 100.0),
            ..Default::default()
        };
        assert!(bound_region(&anchors, 842.0, &RedactConfig::default()).is_none());
    }
}
