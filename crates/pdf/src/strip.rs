//! 合成：剥离被覆盖的字形并绘制白框
//!
//! 字形中心落在任一矩形内即删除，删除的字节换成等量的 TJ 位移，
//! 同一操作中其余字形的位置不变。

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use pricemask_core::RedactionRect;

use crate::fonts::FontTable;
use crate::utils::PageBox;
use crate::walker::{walk_text, ShowItem};

/// 用户空间中的覆盖矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl UserRect {
    /// 渲染器坐标系以 MediaBox 左下角为原点，这里加回偏移
    pub fn from_plan(rect: &RedactionRect, media_box: &PageBox) -> Self {
        Self {
            x: rect.x0 + media_box.llx,
            y: rect.y0 + media_box.lly,
            width: rect.width(),
            height: rect.height(),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x <= x && x <= self.x + self.width && self.y <= y && y <= self.y + self.height
    }
}

/// 一个字符串操作数剥离后的 TJ 元素
fn rebuild_item(item: &ShowItem, bytes: &[u8], format: StringFormat, rects: &[UserRect]) -> Option<(Vec<Object>, usize)> {
    let removed: Vec<bool> = item
        .glyphs
        .iter()
        .map(|g| {
            let (cx, cy) = g.center();
            rects.iter().any(|r| r.contains(cx, cy))
        })
        .collect();
    let removed_count = removed.iter().filter(|r| **r).count();
    if removed_count == 0 {
        return None;
    }

    let mut elements = Vec::new();
    let mut kept: Vec<u8> = Vec::new();
    let mut displacement = 0.0;

    for (glyph, gone) in item.glyphs.iter().zip(&removed) {
        if *gone {
            if !kept.is_empty() {
                elements.push(Object::String(std::mem::take(&mut kept), format));
            }
            if glyph.font_size.abs() > f64::EPSILON {
                displacement += -glyph.advance * 1000.0 / glyph.font_size;
            }
        } else {
            if displacement != 0.0 {
                elements.push(Object::Real(displacement as f32));
                displacement = 0.0;
            }
            kept.extend_from_slice(&bytes[glyph.bytes.clone()]);
        }
    }
    if !kept.is_empty() {
        elements.push(Object::String(kept, format));
    }
    if displacement != 0.0 {
        elements.push(Object::Real(displacement as f32));
    }

    Some((elements, removed_count))
}

fn string_operand(op: &Operation, index: usize) -> Option<(&[u8], StringFormat)> {
    match op.operands.get(index) {
        Some(Object::String(bytes, format)) => Some((bytes.as_slice(), *format)),
        _ => None,
    }
}

/// 处理内容流，删除矩形内的字形
///
/// 返回新的内容流和删除的字形数。
pub fn strip_content_stream(
    content_data: &[u8],
    fonts: &FontTable,
    rects: &[UserRect],
) -> Result<(Vec<u8>, usize), String> {
    let content = Content::decode(content_data).map_err(|e| e.to_string())?;
    let items = walk_text(&content.operations, fonts);

    // (操作下标, 元素下标) → 替换元素
    let mut replacements: HashMap<(usize, usize), Vec<Object>> = HashMap::new();
    let mut removed_total = 0;
    for item in &items {
        let op = &content.operations[item.op_index];
        let operand = if op.operator == "TJ" {
            match op.operands.first() {
                Some(Object::Array(arr)) => match arr.get(item.element) {
                    Some(Object::String(bytes, format)) => Some((bytes.as_slice(), *format)),
                    _ => None,
                },
                _ => None,
            }
        } else {
            string_operand(op, item.element)
        };
        let Some((bytes, format)) = operand else {
            continue;
        };
        if let Some((elements, count)) = rebuild_item(item, bytes, format, rects) {
            removed_total += count;
            replacements.insert((item.op_index, item.element), elements);
        }
    }

    if replacements.is_empty() {
        return Ok((content_data.to_vec(), 0));
    }

    let mut new_operations: Vec<Operation> = Vec::with_capacity(content.operations.len());
    for (index, op) in content.operations.into_iter().enumerate() {
        match op.operator.as_str() {
            "Tj" if replacements.contains_key(&(index, 0)) => {
                let elements = replacements.remove(&(index, 0)).unwrap_or_default();
                log::debug!("[Strip] Tj 删除字形，改写为 TJ");
                new_operations.push(Operation::new("TJ", vec![Object::Array(elements)]));
            }
            "'" if replacements.contains_key(&(index, 0)) => {
                let elements = replacements.remove(&(index, 0)).unwrap_or_default();
                new_operations.push(Operation::new("T*", vec![]));
                new_operations.push(Operation::new("TJ", vec![Object::Array(elements)]));
            }
            "\"" if replacements.contains_key(&(index, 2)) => {
                let elements = replacements.remove(&(index, 2)).unwrap_or_default();
                let mut operands = op.operands.into_iter();
                let word_spacing = operands.next().unwrap_or(Object::Integer(0));
                let char_spacing = operands.next().unwrap_or(Object::Integer(0));
                new_operations.push(Operation::new("Tw", vec![word_spacing]));
                new_operations.push(Operation::new("Tc", vec![char_spacing]));
                new_operations.push(Operation::new("T*", vec![]));
                new_operations.push(Operation::new("TJ", vec![Object::Array(elements)]));
            }
            "TJ" => {
                let Some(Object::Array(arr)) = op.operands.first() else {
                    new_operations.push(op);
                    continue;
                };
                let mut new_array: Vec<Object> = Vec::with_capacity(arr.len());
                let mut changed = false;
                for (element, item) in arr.iter().enumerate() {
                    match replacements.remove(&(index, element)) {
                        Some(elements) => {
                            changed = true;
                            new_array.extend(elements);
                        }
                        None => new_array.push(item.clone()),
                    }
                }
                if changed {
                    new_operations.push(Operation::new("TJ", vec![Object::Array(new_array)]));
                } else {
                    new_operations.push(op);
                }
            }
            _ => new_operations.push(op),
        }
    }

    log::info!("[Strip] 删除 {} 个字形", removed_total);
    let new_content = Content {
        operations: new_operations,
    };
    new_content
        .encode()
        .map(|data| (data, removed_total))
        .map_err(|e| e.to_string())
}

/// 包裹原内容后追加白框
///
/// 原内容放进 `q … Q`，白框总是画在默认用户空间中。
pub fn add_white_overlay(content_data: &[u8], rects: &[UserRect]) -> Result<Vec<u8>, String> {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            vec![Object::Real(1.0), Object::Real(1.0), Object::Real(1.0)],
        ),
    ];

    for rect in rects {
        log::debug!(
            "[Compose] 绘制白框: x={:.2}, y={:.2}, w={:.2}, h={:.2}",
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x as f32),
                Object::Real(rect.y as f32),
                Object::Real(rect.width as f32),
                Object::Real(rect.height as f32),
            ],
        ));
        operations.push(Operation::new("f", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    let overlay = Content { operations }.encode().map_err(|e| e.to_string())?;

    let mut data = Vec::with_capacity(content_data.len() + overlay.len() + 8);
    data.extend_from_slice(b"q\n");
    data.extend_from_slice(content_data);
    data.extend_from_slice(b"\nQ\n");
    data.extend_from_slice(&overlay);
    Ok(data)
}
