//! 结构锚点定位
//!
//! 每种锚点是一条独立的行谓词。每页只扫描一次，结果存入不可变的
//! `PageAnchors`，下游只读。找不到必需锚点时返回 `None`，绝不猜测默认值。

use serde::{Deserialize, Serialize};

use crate::lines::Line;
use crate::rules::RuleSet;

/// 锚点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    TableHeader,
    TableFooter,
    PriceColumn,
    TotalsLabel,
    DisclaimerLabel,
}

/// 已定位的锚点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub kind: AnchorKind,
    /// 横向位置：价格列为列起点，SAY TOTAL 为标签右边界
    pub x: Option<f64>,
    /// 所在行的 `top`（提取器坐标系）
    pub y: f64,
    /// 行索引
    pub line: usize,
}

/// 一页的锚点记录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageAnchors {
    pub header: Option<Anchor>,
    /// 表头只匹配到 ITEM（缺少 DESCRIPTION）
    pub header_degraded: bool,
    pub footer: Option<Anchor>,
    pub price_column: Option<Anchor>,
    pub totals: Vec<Anchor>,
    pub disclaimers: Vec<Anchor>,
}

impl PageAnchors {
    /// 缺失的必需锚点
    pub fn missing_required(&self) -> Vec<AnchorKind> {
        let mut missing = Vec::new();
        if self.header.is_none() {
            missing.push(AnchorKind::TableHeader);
        }
        if self.footer.is_none() {
            missing.push(AnchorKind::TableFooter);
        }
        if self.price_column.is_none() {
            missing.push(AnchorKind::PriceColumn);
        }
        missing
    }

    pub fn is_totals_line(&self, line: usize) -> bool {
        self.totals.iter().any(|a| a.line == line)
    }

    /// SAY TOTAL 行的截断位置
    pub fn disclaimer_cut(&self, line: usize) -> Option<f64> {
        self.disclaimers
            .iter()
            .find(|a| a.line == line)
            .and_then(|a| a.x)
    }
}

pub fn is_table_header(line: &Line<'_>) -> bool {
    line.has_all(&["ITEM", "DESCRIPTION"])
}

pub fn is_item_only_header(line: &Line<'_>) -> bool {
    line.has("ITEM")
}

pub fn is_table_footer(line: &Line<'_>) -> bool {
    line.has_all(&["TOTAL", "QUANTITY"])
}

/// UNIT + PRICE 行：返回两者中最小的 `x0`
pub fn price_column_x(line: &Line<'_>) -> Option<f64> {
    if !line.has_all(&["UNIT", "PRICE"]) {
        return None;
    }
    line.tokens_matching("UNIT")
        .chain(line.tokens_matching("PRICE"))
        .map(|t| t.x0)
        .min_by(f64::total_cmp)
}

pub fn is_totals_label(line: &Line<'_>, rules: &RuleSet) -> bool {
    rules.is_totals(&line.keys)
}

/// SAY + TOTAL 行：返回最右侧 TOTAL 词的右边界
pub fn say_total_cut(line: &Line<'_>) -> Option<f64> {
    if !line.has_all(&["SAY", "TOTAL"]) {
        return None;
    }
    line.tokens_matching("TOTAL")
        .map(|t| t.x1)
        .max_by(f64::total_cmp)
}

fn anchor(kind: AnchorKind, x: Option<f64>, line: &Line<'_>, index: usize) -> Anchor {
    Anchor {
        kind,
        x,
        y: line.top,
        line: index,
    }
}

/// 自上而下扫描一页的行，定位所有锚点
///
/// 结构锚点（表头、表尾、价格列）取第一条命中的行；合计行与 SAY TOTAL
/// 行是逐行规则，记录所有命中的行。
pub fn locate_anchors(lines: &[Line<'_>], rules: &RuleSet, allow_item_only_header: bool) -> PageAnchors {
    let mut anchors = PageAnchors::default();

    for (index, line) in lines.iter().enumerate() {
        if anchors.header.is_none() && is_table_header(line) {
            anchors.header = Some(anchor(AnchorKind::TableHeader, None, line, index));
        }
        if anchors.footer.is_none() && is_table_footer(line) {
            anchors.footer = Some(anchor(AnchorKind::TableFooter, None, line, index));
        }
        if anchors.price_column.is_none() {
            if let Some(x) = price_column_x(line) {
                anchors.price_column = Some(anchor(AnchorKind::PriceColumn, Some(x), line, index));
            }
        }
        if is_totals_label(line, rules) {
            anchors
                .totals
                .push(anchor(AnchorKind::TotalsLabel, None, line, index));
        }
        if let Some(cut) = say_total_cut(line) {
            anchors
                .disclaimers
                .push(anchor(AnchorKind::DisclaimerLabel, Some(cut), line, index));
        }
    }

    if anchors.header.is_none() && allow_item_only_header {
        if let Some((index, line)) = lines
            .iter()
            .enumerate()
            .find(|(_, line)| is_item_only_header(line))
        {
            log::warn!("[Anchors] 未找到 ITEM + DESCRIPTION 表头，退化为仅 ITEM: {:?}", line.text());
            anchors.header = Some(anchor(AnchorKind::TableHeader, None, line, index));
            anchors.header_degraded = true;
        }
    }

    log::debug!(
        "[Anchors] header={:?} footer={:?} price_column={:?} totals={} disclaimers={}",
        anchors.header.map(|a| a.y),
        anchors.footer.map(|a| a.y),
        anchors.price_column.and_then(|a| a.x),
        anchors.totals.len(),
        anchors.disclaimers.len()
    );

    anchors
}
