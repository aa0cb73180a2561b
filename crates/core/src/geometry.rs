//! 坐标与几何类型
//!
//! 提取器使用左上角原点（y 向下增长），渲染器使用 PDF 的左下角原点。
//! 两个坐标系之间只差一次翻转：`renderer_y = page_height - extractor_y`。

use serde::{Deserialize, Serialize};

/// 提取出的文本单元（一个"词"）
///
/// 坐标为提取器坐标系，`top < bottom`。提取后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
    /// 页面索引，从 0 开始
    pub page_index: usize,
}

impl Token {
    pub fn new(
        text: impl Into<String>,
        x0: f64,
        top: f64,
        x1: f64,
        bottom: f64,
        page_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            x0,
            top,
            x1,
            bottom,
            page_index,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// 宽或高为零/负数，或坐标不是有限数
    pub fn is_malformed(&self) -> bool {
        let finite = [self.x0, self.top, self.x1, self.bottom]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn extractor_box(&self) -> ExtractorBox {
        ExtractorBox {
            x0: self.x0,
            top: self.top,
            x1: self.x1,
            bottom: self.bottom,
        }
    }
}

/// 提取器坐标系下的边界框（左上角原点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractorBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

/// 渲染器坐标系下的边界框（左下角原点，`y0 < y1`）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RendererBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ExtractorBox {
    /// 翻转 y 轴，上下边互换
    pub fn to_renderer(&self, page_height: f64) -> RendererBox {
        RendererBox {
            x0: self.x0,
            y0: page_height - self.bottom,
            x1: self.x1,
            y1: page_height - self.top,
        }
    }
}

impl RendererBox {
    pub fn to_extractor(&self, page_height: f64) -> ExtractorBox {
        ExtractorBox {
            x0: self.x0,
            top: page_height - self.y1,
            x1: self.x1,
            bottom: page_height - self.y0,
        }
    }

    pub fn pad(&self, padding: f64) -> RendererBox {
        RendererBox {
            x0: self.x0 - padding,
            y0: self.y0 - padding,
            x1: self.x1 + padding,
            y1: self.y1 + padding,
        }
    }
}

/// 提取器 y 坐标转换为渲染器 y 坐标
pub fn to_renderer_y(extractor_y: f64, page_height: f64) -> f64 {
    page_height - extractor_y
}

/// 表格的纵向范围（渲染器坐标系）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub y_min: f64,
    pub y_max: f64,
}

impl Region {
    /// 闭区间判断，边界上的行也算在内
    pub fn contains(&self, renderer_y: f64) -> bool {
        self.y_min <= renderer_y && renderer_y <= self.y_max
    }
}

/// 需要涂白的矩形（渲染器坐标系，已加内边距）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub page_index: usize,
}

impl RedactionRect {
    pub fn from_token(token: &Token, page_height: f64, padding: f64) -> Self {
        let rb = token.extractor_box().to_renderer(page_height).pad(padding);
        Self {
            x0: rb.x0,
            y0: rb.y0,
            x1: rb.x1,
            y1: rb.y1,
            page_index: token.page_index,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// 点是否落在矩形内（渲染器坐标系）
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.x0 <= x && x <= self.x1 && self.y0 <= y && y <= self.y1
    }
}
