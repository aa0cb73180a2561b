//! pdfium 文字提取（feature `pdfium`）
//!
//! 逐字符取 pdfium 给出的 loose bounds，再用核心拼词器组装成词。

use std::path::PathBuf;

use pdfium_render::prelude::*;
use pricemask_core::{assemble_words, Page};

use crate::extract::user_space_glyph;
use crate::utils::PageBox;
use crate::PdfError;

/// 获取 pdfium 库的搜索路径
fn get_pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 0. 显式指定的目录
    if let Ok(dir) = std::env::var("PRICEMASK_PDFIUM_DIR") {
        paths.push(PathBuf::from(dir));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // 1. 可执行文件同级的 libs 目录
            paths.push(exe_dir.join("libs"));

            // 2. 可执行文件同级目录
            paths.push(exe_dir.to_path_buf());

            // 3. macOS: app bundle 内的 Resources 目录
            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(contents_dir.join("Resources").join("libs"));
                }
            }
        }
    }

    // 4. 当前目录
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// 尝试绑定 pdfium 库
pub fn bind_pdfium() -> Result<Pdfium, PdfError> {
    for path in get_pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[Pdfium] 尝试加载 pdfium: {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Pdfium] 成功从 {:?} 加载 pdfium", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    log::debug!("[Pdfium] 尝试加载系统 pdfium 库");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::Pdfium(format!("Pdfium 库不可用: {}，可通过 PRICEMASK_PDFIUM_DIR 指定目录", e)))
}

/// 用 pdfium 提取整份文档的词
///
/// pdfium 给出的是页面用户空间坐标，按 lopdf 读到的 MediaBox 换算，
/// 与合成器使用同一个原点。
pub fn extract_document(
    pdfium: &Pdfium,
    bytes: &[u8],
    media_boxes: &[PageBox],
    x_tolerance: f64,
    y_tolerance: f64,
) -> Result<Vec<Page>, PdfError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PdfError::Pdfium(format!("加载 PDF 失败: {}", e)))?;

    let mut pages = Vec::new();
    for (page_index, page) in document.pages().iter().enumerate() {
        let media_box = media_boxes.get(page_index).copied().unwrap_or(PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: page.width().value as f64,
            ury: page.height().value as f64,
        });

        let text = page.text().map_err(|e| PdfError::Content {
            page: page_index,
            reason: format!("提取文本失败: {}", e),
        })?;

        let mut glyphs = Vec::new();
        for ch in text.chars().iter() {
            let (Some(c), Ok(bounds)) = (ch.unicode_char(), ch.loose_bounds()) else {
                continue;
            };
            glyphs.push(user_space_glyph(
                c,
                bounds.left().value as f64,
                bounds.bottom().value as f64,
                bounds.right().value as f64,
                bounds.top().value as f64,
                &media_box,
            ));
        }

        let tokens = assemble_words(&glyphs, page_index, x_tolerance, y_tolerance);
        log::info!(
            "[Pdfium] 页面 {}: {} 个字符, {} 个词",
            page_index + 1,
            glyphs.len(),
            tokens.len()
        );

        pages.push(Page {
            page_index,
            width: media_box.width(),
            height: media_box.height(),
            tokens,
        });
    }

    Ok(pages)
}
