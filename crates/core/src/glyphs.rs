//! 字形 → 词 组装
//!
//! 提取器适配层按内容流顺序给出单个字形，这里把它们拼成 `Token`。
//! 遇到空白、换行、明显的水平间隙或回退时断词，保证不会把
//! 视觉上分开的两段文字合成一个词。

use crate::geometry::Token;

/// 单个字形（提取器坐标系）
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl Glyph {
    pub fn new(ch: char, x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            ch,
            x0,
            top,
            x1,
            bottom,
        }
    }
}

struct WordBuilder {
    text: String,
    x0: f64,
    top: f64,
    x1: f64,
    bottom: f64,
    last_x0: f64,
}

impl WordBuilder {
    fn start(glyph: &Glyph) -> Self {
        let mut text = String::new();
        text.push(glyph.ch);
        Self {
            text,
            x0: glyph.x0,
            top: glyph.top,
            x1: glyph.x1,
            bottom: glyph.bottom,
            last_x0: glyph.x0,
        }
    }

    fn continues_with(&self, glyph: &Glyph, x_tolerance: f64, y_tolerance: f64) -> bool {
        let same_line = (glyph.top - self.top).abs() <= y_tolerance;
        let gap = glyph.x0 - self.x1;
        let backwards = glyph.x0 < self.last_x0 - x_tolerance;
        same_line && gap <= x_tolerance && !backwards
    }

    fn push(&mut self, glyph: &Glyph) {
        self.text.push(glyph.ch);
        self.x0 = self.x0.min(glyph.x0);
        self.top = self.top.min(glyph.top);
        self.x1 = self.x1.max(glyph.x1);
        self.bottom = self.bottom.max(glyph.bottom);
        self.last_x0 = glyph.x0;
    }

    fn finish(self, page_index: usize) -> Token {
        Token::new(self.text, self.x0, self.top, self.x1, self.bottom, page_index)
    }
}

/// 将字形序列组装为词
pub fn assemble_words(
    glyphs: &[Glyph],
    page_index: usize,
    x_tolerance: f64,
    y_tolerance: f64,
) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<WordBuilder> = None;

    for glyph in glyphs {
        if glyph.ch.is_whitespace() || glyph.ch.is_control() {
            if let Some(word) = current.take() {
                tokens.push(word.finish(page_index));
            }
            continue;
        }

        match current.as_mut() {
            Some(word) if word.continues_with(glyph, x_tolerance, y_tolerance) => {
                word.push(glyph);
            }
            _ => {
                if let Some(word) = current.take() {
                    tokens.push(word.finish(page_index));
                }
                current = Some(WordBuilder::start(glyph));
            }
        }
    }

    if let Some(word) = current.take() {
        tokens.push(word.finish(page_index));
    }

    tokens
}
