//! 字体度量与编码
//!
//! 只读取定位字形所需的信息：字宽（/Widths、/W、/DW）、编码字节数
//! 以及 ToUnicode 映射。拿不到字宽时按字节估算。

use std::collections::HashMap;
use std::ops::Range;

use lopdf::{Dictionary, Document, Object};

use crate::standard_fonts::standard_widths;
use crate::utils::{get_number, get_stream_content, resolve, resolve_dict};

/// 一个字符编码及其在字符串操作数中的位置
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub code: u32,
    /// 在原始字符串字节中的范围
    pub bytes: Range<usize>,
    /// 对应的 Unicode 文本（可能为多个字符，也可能为空）
    pub text: String,
    /// 字宽，单位为 1/1000 文本空间
    pub width: f64,
}

/// 单个字体的度量信息
#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    widths: HashMap<u32, f64>,
    default_width: Option<f64>,
    /// Type0 字体使用双字节编码
    two_byte: bool,
    to_unicode: HashMap<u32, String>,
}

/// 估算单个字符的宽度（1/1000 文本空间）
fn estimate_char_width(code: u32) -> f64 {
    if code < 128 {
        550.0
    } else {
        1000.0
    }
}

impl FontMetrics {
    /// 没有字体字典时使用的估算度量
    pub fn estimated() -> Self {
        Self::default()
    }

    pub fn from_font_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = font.get(b"Subtype").and_then(Object::as_name).unwrap_or(b"".as_slice());
        let mut metrics = Self::default();

        if subtype == b"Type0" {
            metrics.two_byte = true;
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(cid_font) = descendant {
                metrics.default_width = Some(
                    cid_font
                        .get(b"DW")
                        .ok()
                        .and_then(get_number)
                        .unwrap_or(1000.0),
                );
                if let Some(Object::Array(w)) = cid_font.get(b"W").ok().and_then(|o| resolve(doc, o)) {
                    metrics.widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            let first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(get_number)
                .unwrap_or(0.0) as u32;
            if let Some(Object::Array(widths)) = font.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
                for (offset, width) in widths.iter().enumerate() {
                    if let Some(w) = resolve(doc, width).and_then(get_number) {
                        metrics.widths.insert(first_char.saturating_add(offset as u32), w);
                    }
                }
            } else if let Some(widths) = font
                .get(b"BaseFont")
                .and_then(Object::as_name)
                .ok()
                .and_then(|name| standard_widths(&String::from_utf8_lossy(name)))
            {
                metrics.widths.extend(widths);
            }
            metrics.default_width = font
                .get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|fd| fd.get(b"MissingWidth").ok())
                .and_then(get_number);
        }

        if let Some(Object::Stream(stream)) = font.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            metrics.to_unicode = parse_to_unicode(&get_stream_content(stream));
        }

        metrics
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    pub fn width(&self, code: u32) -> f64 {
        match self.widths.get(&code) {
            Some(w) => *w,
            None => self.default_width.unwrap_or_else(|| estimate_char_width(code)),
        }
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.two_byte {
            // 没有 ToUnicode 的 CID 字体无法还原文本
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default();
        }
        // 单字节：按 Latin-1 近似 WinAnsi
        String::from(code as u8 as char)
    }

    /// 把字符串操作数拆成字符编码
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        let step = if self.two_byte { 2 } else { 1 };
        let mut glyphs = Vec::with_capacity(bytes.len() / step + 1);
        let mut start = 0;
        while start < bytes.len() {
            let end = (start + step).min(bytes.len());
            let code = bytes[start..end]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32);
            glyphs.push(DecodedGlyph {
                code,
                bytes: start..end,
                text: self.text_for(code),
                width: self.width(code),
            });
            start = end;
        }
        glyphs
    }
}

/// 单个区间最多展开的编码数
const MAX_CID_RANGE: u32 = 0xFFFF;

/// 解析 CIDFont 的 /W 数组
///
/// 两种形式：`c [w1 w2 ...]` 与 `c_first c_last w`。越界的编码直接丢弃。
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let items: Vec<&Object> = w.iter().filter_map(|o| resolve(doc, o)).collect();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = get_number(items[i]) else {
            i += 1;
            continue;
        };
        let first = first as u32;
        match items.get(i + 1) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    let Some(code) = u32::try_from(offset).ok().and_then(|o| first.checked_add(o)) else {
                        break;
                    };
                    if let Some(width) = get_number(width) {
                        widths.insert(code, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    get_number(last),
                    items.get(i + 2).and_then(|o| get_number(o)),
                ) else {
                    break;
                };
                let last = (last as u32).min(first.saturating_add(MAX_CID_RANGE));
                for code in first..=last {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Keyword(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' => i += 1,
            b'<' => {
                let end = data[i..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(data.len(), |p| i + p);
                tokens.push(CMapToken::Hex(parse_hex(&data[i + 1..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                tokens.push(CMapToken::Keyword(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn parse_hex(hex: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// UTF-16BE 目标串
fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| ((pair[0] as u16) << 8) | pair.get(1).copied().unwrap_or(0) as u16)
        .collect();
    String::from_utf16_lossy(&units)
}

/// 目标串最后一个码元加上偏移
fn offset_text(base: &[u8], offset: u32) -> String {
    if base.len() < 2 {
        return utf16_text(base);
    }
    let mut bytes = base.to_vec();
    let n = bytes.len();
    let last = (((bytes[n - 2] as u32) << 8) | bytes[n - 1] as u32) + offset;
    bytes[n - 2] = (last >> 8) as u8;
    bytes[n - 1] = last as u8;
    utf16_text(&bytes)
}

/// 解析 ToUnicode CMap 的 bfchar / bfrange 段
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Keyword(k) if k == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(code_of(src), utf16_text(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Keyword(k) if k == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                        break;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                                map.insert(code, offset_text(dst, code - lo));
                            }
                            i += 3;
                        }
                        CMapToken::ArrayStart => {
                            i += 3;
                            let mut code = lo;
                            while let Some(CMapToken::Hex(dst)) = tokens.get(i) {
                                if code <= hi {
                                    map.insert(code, utf16_text(dst));
                                }
                                code += 1;
                                i += 1;
                            }
                            if tokens.get(i) == Some(&CMapToken::ArrayEnd) {
                                i += 1;
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    map
}

/// 页面上按资源名索引的字体表
#[derive(Debug, Default)]
pub struct FontTable {
    fonts: HashMap<Vec<u8>, FontMetrics>,
    fallback: FontMetrics,
}

impl FontTable {
    pub fn from_resources(doc: &Document, fonts: Option<&Dictionary>) -> Self {
        let mut table = Self::default();
        if let Some(fonts) = fonts {
            for (name, font) in fonts.iter() {
                if let Some(dict) = resolve_dict(doc, font) {
                    table
                        .fonts
                        .insert(name.clone(), FontMetrics::from_font_dict(doc, dict));
                }
            }
        }
        table
    }

    pub fn get(&self, name: &[u8]) -> &FontMetrics {
        match self.fonts.get(name) {
            Some(font) => font,
            None => {
                log::debug!("[Fonts] 未找到字体 /{}，按估算宽度处理", String::from_utf8_lossy(name));
                &self.fallback
            }
        }
    }
}
