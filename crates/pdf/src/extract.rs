//! lopdf 文字提取
//!
//! 解释页面内容流得到字形，再交给核心的拼词器组装成词。

use lopdf::content::Content;
use lopdf::{Document, ObjectId};
use pricemask_core::{assemble_words, Glyph, Page};

use crate::fonts::FontTable;
use crate::utils::{get_media_box, get_page_content, get_page_fonts, get_page_rotation, PageBox};
use crate::walker::{walk_text, GlyphPlacement};
use crate::PdfError;

/// 用户空间中的字形框 → 提取器坐标系（MediaBox 左上角为原点，y 向下）
pub(crate) fn user_space_glyph(ch: char, x0: f64, y0: f64, x1: f64, y1: f64, media_box: &PageBox) -> Glyph {
    Glyph::new(
        ch,
        x0 - media_box.llx,
        media_box.ury - y1,
        x1 - media_box.llx,
        media_box.ury - y0,
    )
}

/// 用户空间字形 → 提取器坐标系字形
///
/// 一个编码映射到多个字符时（如连字），平均切分字形宽度。
fn to_extractor_glyphs(placement: &GlyphPlacement, media_box: &PageBox, out: &mut Vec<Glyph>) {
    let chars: Vec<char> = placement.text.chars().collect();
    if chars.is_empty() {
        return;
    }
    let step = (placement.x1 - placement.x0) / chars.len() as f64;
    for (i, ch) in chars.into_iter().enumerate() {
        let x0 = placement.x0 + step * i as f64;
        out.push(user_space_glyph(ch, x0, placement.y0, x0 + step, placement.y1, media_box));
    }
}

/// 提取单页的词
pub fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    page_index: usize,
    x_tolerance: f64,
    y_tolerance: f64,
) -> Result<Page, PdfError> {
    let media_box = get_media_box(doc, page_id);
    if get_page_rotation(doc, page_id) % 360 != 0 {
        log::warn!("[Extract] 页面 {} 带有旋转，坐标按未旋转处理", page_index + 1);
    }

    let content_data = get_page_content(doc, page_id)?;
    let content = Content::decode(&content_data).map_err(|e| PdfError::Content {
        page: page_index,
        reason: e.to_string(),
    })?;
    let fonts = FontTable::from_resources(doc, get_page_fonts(doc, page_id));

    let mut glyphs = Vec::new();
    for item in walk_text(&content.operations, &fonts) {
        for placement in &item.glyphs {
            to_extractor_glyphs(placement, &media_box, &mut glyphs);
        }
    }

    let tokens = assemble_words(&glyphs, page_index, x_tolerance, y_tolerance);
    log::info!(
        "[Extract] 页面 {}: {} 个字形, {} 个词",
        page_index + 1,
        glyphs.len(),
        tokens.len()
    );

    Ok(Page {
        page_index,
        width: media_box.width(),
        height: media_box.height(),
        tokens,
    })
}

/// 提取整份文档，任何一页失败都视为整份失败
pub fn extract_document(
    doc: &Document,
    x_tolerance: f64,
    y_tolerance: f64,
) -> Result<Vec<Page>, PdfError> {
    doc.get_pages()
        .values()
        .enumerate()
        .map(|(index, page_id)| extract_page(doc, *page_id, index, x_tolerance, y_tolerance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ligature_splits_evenly() {
        let placement = GlyphPlacement {
            text: "fi".to_string(),
            bytes: 0..1,
            advance: 6.0,
            font_size: 10.0,
            x0: 110.0,
            y0: 98.0,
            x1: 116.0,
            y1: 108.0,
        };
        let media_box = PageBox {
            llx: 10.0,
            lly: 0.0,
            urx: 610.0,
            ury: 800.0,
        };
        let mut glyphs = Vec::new();
        to_extractor_glyphs(&placement, &media_box, &mut glyphs);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0], Glyph::new('f', 100.0, 692.0, 103.0, 702.0));
        assert_eq!(glyphs[1].x0, 103.0);
    }

    #[test]
    fn test_user_space_glyph_offset_media_box() {
        // MediaBox [20 30 620 830]：用户空间 (120, 730) 在左上角原点下为 (100, 100)
        let media_box = PageBox {
            llx: 20.0,
            lly: 30.0,
            urx: 620.0,
            ury: 830.0,
        };
        let glyph = user_space_glyph('7', 120.0, 720.0, 125.0, 730.0, &media_box);
        assert_eq!(glyph, Glyph::new('7', 100.0, 100.0, 105.0, 110.0));
    }
}
