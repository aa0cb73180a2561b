//! 逐词分类
//!
//! 规则优先级：禁止行 > 表格价格列 / 合计行 / SAY TOTAL 尾部。
//! 不满足任何规则的词保持原样，没有"不确定就删除"的分支。

use serde::{Deserialize, Serialize};

use crate::anchors::PageAnchors;
use crate::config::RedactConfig;
use crate::geometry::{to_renderer_y, Region, Token};
use crate::lines::Line;

/// 选中原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// 表格区域内、价格列右侧的价格词
    TableCell,
    /// 合计行上价格列右侧的价格词
    TotalsRow,
    /// SAY TOTAL 标签之后的全部内容
    SayTotalTail,
}

/// 被选中脱敏的词
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub token: &'a Token,
    pub reason: Reason,
}

/// 页面级分类所需的已定位信息
#[derive(Debug, Clone, Copy)]
pub struct PageFrame {
    pub region: Region,
    pub price_x: f64,
    pub page_height: f64,
}

/// 对一页的所有行分类，返回需要脱敏的词（每个词最多一次）
pub fn classify_page<'a>(
    lines: &[Line<'a>],
    anchors: &PageAnchors,
    frame: PageFrame,
    config: &RedactConfig,
) -> Vec<Selection<'a>> {
    let full_text = should_log_full_text();
    let column_x = frame.price_x - config.column_tolerance;
    let mut selections = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if config.rules.is_forbidden(&line.keys) {
            log::debug!("[Classify] 跳过受保护行: {}", preview(&line.text(), full_text));
            continue;
        }

        let in_table = frame.region.contains(to_renderer_y(line.top, frame.page_height));
        let totals = anchors.is_totals_line(index);
        let cut = anchors
            .disclaimer_cut(index)
            .map(|x| x + config.tail_tolerance);

        if !in_table && !totals && cut.is_none() {
            continue;
        }

        let before = selections.len();
        for &token in &line.tokens {
            let priced = (in_table || totals)
                && token.x0 >= column_x
                && config.rules.price_shape(&token.text).is_some();

            let reason = if priced && in_table {
                Some(Reason::TableCell)
            } else if priced {
                Some(Reason::TotalsRow)
            } else if cut.is_some_and(|c| token.x0 > c) {
                Some(Reason::SayTotalTail)
            } else {
                None
            };

            if let Some(reason) = reason {
                selections.push(Selection { token, reason });
            }
        }

        if selections.len() > before {
            log::debug!(
                "[Classify] 行 {} 选中 {} 个词: {}",
                index,
                selections.len() - before,
                preview(&line.text(), full_text)
            );
        }
    }

    selections
}

fn preview(text: &str, full: bool) -> String {
    if full {
        text.to_string()
    } else {
        text.chars().take(200).collect()
    }
}

fn should_log_full_text() -> bool {
    match std::env::var("PRICEMASK_LOG_FULL_TEXT") {
        Ok(val) => {
            let val = val.to_ascii_lowercase();
            val == "1" || val == "true" || val == "yes"
        }
        Err(_) => false,
    }
}
