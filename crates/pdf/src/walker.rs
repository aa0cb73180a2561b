//! 内容流文字状态解释器
//!
//! 跟踪 CTM 与文字状态，为每个文字显示操作给出字形在用户空间中的位置。
//! 提取与剥离共用这一份解释，保证两边对同一字形的定位完全一致。

use std::ops::Range;

use lopdf::content::Operation;
use lopdf::Object;

use crate::fonts::FontTable;
use crate::utils::get_number;

pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// 字形在字号为 1 时的下沿和上沿
const GLYPH_DESCENT: f64 = -0.2;
const GLYPH_ASCENT: f64 = 0.8;

/// 行向量约定下的矩阵乘法 `a × b`
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub fn apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn translate(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = get_number(operand)?;
    }
    Some(m)
}

fn number_at(operands: &[Object], index: usize) -> Option<f64> {
    operands.get(index).and_then(get_number)
}

/// 已定位的字形（用户空间）
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPlacement {
    pub text: String,
    /// 在字符串操作数中的字节范围
    pub bytes: Range<usize>,
    /// 前进量（文本空间，未乘水平缩放）：`w0 * Tfs + Tc + Tw`
    pub advance: f64,
    pub font_size: f64,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl GlyphPlacement {
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }
}

/// 一个字符串操作数的字形
///
/// `op_index` 指向内容流中的操作；`element` 对 TJ 是数组下标，
/// 对 Tj / ' / " 是字符串所在的操作数下标。
#[derive(Debug, Clone)]
pub struct ShowItem {
    pub op_index: usize,
    pub element: usize,
    pub glyphs: Vec<GlyphPlacement>,
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    font: Vec<u8>,
    font_size: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            font: Vec::new(),
            font_size: 12.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

struct Walker<'a> {
    fonts: &'a FontTable,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text_object: bool,
    items: Vec<ShowItem>,
}

impl<'a> Walker<'a> {
    fn new(fonts: &'a FontTable) -> Self {
        Self {
            fonts,
            state: GraphicsState {
                ctm: IDENTITY,
                text: TextState::default(),
            },
            stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_object: false,
            items: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&translate(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    /// 显示一个字符串，推进文字矩阵
    fn show(&mut self, bytes: &[u8], op_index: usize, element: usize) {
        let text = &self.state.text;
        let font = self.fonts.get(&text.font);
        let fs = text.font_size;
        let th = text.h_scale;
        let mut glyphs = Vec::new();

        for decoded in font.decode(bytes) {
            let render = multiply(
                &multiply(&[fs * th, 0.0, 0.0, fs, 0.0, text.rise], &self.text_matrix),
                &self.state.ctm,
            );
            let w0 = decoded.width / 1000.0;
            let corners = [
                apply(&render, 0.0, GLYPH_DESCENT),
                apply(&render, w0, GLYPH_DESCENT),
                apply(&render, 0.0, GLYPH_ASCENT),
                apply(&render, w0, GLYPH_ASCENT),
            ];
            let (mut x0, mut y0) = corners[0];
            let (mut x1, mut y1) = corners[0];
            for (x, y) in &corners[1..] {
                x0 = x0.min(*x);
                y0 = y0.min(*y);
                x1 = x1.max(*x);
                y1 = y1.max(*y);
            }

            let word_spacing = if !font.is_two_byte() && decoded.code == 32 {
                text.word_spacing
            } else {
                0.0
            };
            let advance = w0 * fs + text.char_spacing + word_spacing;
            self.text_matrix = multiply(&translate(advance * th, 0.0), &self.text_matrix);

            glyphs.push(GlyphPlacement {
                text: decoded.text,
                bytes: decoded.bytes,
                advance,
                font_size: fs,
                x0,
                y0,
                x1,
                y1,
            });
        }

        self.items.push(ShowItem {
            op_index,
            element,
            glyphs,
        });
    }

    /// TJ 数组中的数字：按千分之一字号反向平移
    fn adjust(&mut self, amount: f64) {
        let text = &self.state.text;
        let tx = -amount / 1000.0 * text.font_size * text.h_scale;
        self.text_matrix = multiply(&translate(tx, 0.0), &self.text_matrix);
    }

    fn step(&mut self, op_index: usize, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.in_text_object = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.in_text_object = false,
            "Tc" => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.h_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.leading = v;
                }
            }
            "Ts" => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.rise = v;
                }
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.state.text.font = name.clone();
                }
                if let Some(size) = number_at(operands, 1) {
                    self.state.text.font_size = size;
                }
            }
            "Tm" if self.in_text_object => {
                if let Some(m) = matrix_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "Td" if self.in_text_object => {
                if let (Some(tx), Some(ty)) = (number_at(operands, 0), number_at(operands, 1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" if self.in_text_object => {
                if let (Some(tx), Some(ty)) = (number_at(operands, 0), number_at(operands, 1)) {
                    self.state.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "T*" if self.in_text_object => self.next_line(),
            "Tj" if self.in_text_object => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, op_index, 0);
                }
            }
            "'" if self.in_text_object => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, op_index, 0);
                }
            }
            "\"" if self.in_text_object => {
                if let Some(v) = number_at(operands, 0) {
                    self.state.text.word_spacing = v;
                }
                if let Some(v) = number_at(operands, 1) {
                    self.state.text.char_spacing = v;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes, op_index, 2);
                }
            }
            "TJ" if self.in_text_object => {
                if let Some(Object::Array(arr)) = operands.first() {
                    for (element, item) in arr.iter().enumerate() {
                        match item {
                            Object::String(bytes, _) => self.show(bytes, op_index, element),
                            other => {
                                if let Some(amount) = get_number(other) {
                                    self.adjust(amount);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// 解释一段内容流，返回所有字符串操作数的字形位置
pub fn walk_text(operations: &[Operation], fonts: &FontTable) -> Vec<ShowItem> {
    let mut walker = Walker::new(fonts);
    for (index, op) in operations.iter().enumerate() {
        walker.step(index, op);
    }
    walker.items
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn walk(data: &[u8]) -> Vec<ShowItem> {
        let content = Content::decode(data).unwrap();
        walk_text(&content.operations, &FontTable::default())
    }

    #[test]
    fn test_multiply_applies_left_first() {
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let shift = translate(10.0, 5.0);
        // 先缩放再平移
        assert_eq!(apply(&multiply(&scale, &shift), 1.0, 1.0), (12.0, 7.0));
        // 先平移再缩放
        assert_eq!(apply(&multiply(&shift, &scale), 1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_tj_glyph_positions() {
        let items = walk(b"BT /F1 10 Tf 100 700 Td (AB) Tj ET");
        assert_eq!(items.len(), 1);
        let glyphs = &items[0].glyphs;
        assert_eq!(glyphs.len(), 2);
        assert!((glyphs[0].x0 - 100.0).abs() < 1e-9);
        assert!((glyphs[0].x1 - 105.5).abs() < 1e-9);
        assert!((glyphs[1].x0 - 105.5).abs() < 1e-9);
        assert!((glyphs[0].y0 - 698.0).abs() < 1e-9);
        assert!((glyphs[0].y1 - 708.0).abs() < 1e-9);
        assert!(close(glyphs[1].advance, 5.5));
    }

    #[test]
    fn test_tj_array_adjustment() {
        let items = walk(b"BT /F1 10 Tf 0 0 Td [(A) -1000 (B)] TJ ET");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].element, 2);
        // A 宽 5.5，-1000 再右移 10
        assert!((items[1].glyphs[0].x0 - 15.5).abs() < 1e-9);
    }

    #[test]
    fn test_ctm_and_state_restore() {
        let items = walk(b"q 1 0 0 1 50 50 cm BT /F1 10 Tf 0 0 Td (A) Tj ET Q BT /F1 10 Tf 0 0 Td (A) Tj ET");
        assert!((items[0].glyphs[0].x0 - 50.0).abs() < 1e-9);
        assert!((items[1].glyphs[0].x0 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_next_line_uses_leading() {
        let items = walk(b"BT /F1 10 Tf 12 TL 0 100 Td (A) Tj T* (B) Tj (C) ' ET");
        let y: Vec<f64> = items.iter().map(|i| i.glyphs[0].y0 + 2.0).collect();
        assert!(close(y[0], 100.0));
        assert!(close(y[1], 88.0));
        assert!(close(y[2], 76.0));
    }

    #[test]
    fn test_char_and_word_spacing() {
        let items = walk(b"BT /F1 10 Tf 1 Tc 2 Tw 0 0 Td (a b) Tj ET");
        let glyphs = &items[0].glyphs;
        assert!(close(glyphs[0].advance, 6.5));
        assert!(close(glyphs[1].advance, 8.5));
        assert!((glyphs[2].x0 - 15.0).abs() < 1e-9);
    }
}
