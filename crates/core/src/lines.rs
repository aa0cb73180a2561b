//! 行分组
//!
//! 按 `top` 坐标把词聚成逻辑行。单遍在线聚类：每个词归入第一条
//! 代表高度在容差内的行，否则新开一行。结果只取决于输入顺序。

use std::collections::BTreeSet;

use crate::geometry::Token;

/// 一条逻辑行
///
/// 借用页面的词，行内按 `x0` 从左到右排序。
#[derive(Debug, Clone)]
pub struct Line<'a> {
    /// 代表高度：开行的第一个词的 `top`
    pub top: f64,
    pub tokens: Vec<&'a Token>,
    /// 规范化后的关键词集合，分组结束时计算一次
    pub keys: BTreeSet<String>,
}

impl<'a> Line<'a> {
    fn open(token: &'a Token) -> Self {
        Self {
            top: token.top,
            tokens: vec![token],
            keys: BTreeSet::new(),
        }
    }

    pub fn has(&self, keyword: &str) -> bool {
        self.keys.contains(keyword)
    }

    pub fn has_all(&self, keywords: &[&str]) -> bool {
        keywords.iter().all(|k| self.has(k))
    }

    /// 关键词命中的词
    pub fn tokens_matching<'l>(&'l self, keyword: &'l str) -> impl Iterator<Item = &'a Token> + 'l {
        self.tokens
            .iter()
            .copied()
            .filter(move |t| normalize_keyword(&t.text) == keyword)
    }

    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 关键词规范化：转大写，去掉首尾标点（保留 `/`，如 `O/A`）
pub fn normalize_keyword(text: &str) -> String {
    text.trim_matches(|c: char| !c.is_alphanumeric() && c != '/')
        .to_uppercase()
}

/// 将一页的词分组为行，行按从上到下排序
pub fn group_lines(tokens: &[Token], y_tolerance: f64) -> Vec<Line<'_>> {
    let mut ordered: Vec<&Token> = tokens.iter().collect();
    ordered.sort_by(|a, b| {
        a.top
            .round()
            .total_cmp(&b.top.round())
            .then(a.x0.total_cmp(&b.x0))
    });

    let mut lines: Vec<Line<'_>> = Vec::new();
    for token in ordered {
        match lines
            .iter_mut()
            .find(|line| (line.top - token.top).abs() <= y_tolerance)
        {
            Some(line) => line.tokens.push(token),
            None => lines.push(Line::open(token)),
        }
    }

    for line in &mut lines {
        line.tokens.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        line.keys = line
            .tokens
            .iter()
            .map(|t| normalize_keyword(&t.text))
            .filter(|k| !k.is_empty())
            .collect();
    }
    lines.sort_by(|a, b| a.top.total_cmp(&b.top));

    log::debug!("[Lines] {} 个词 -> {} 行", tokens.len(), lines.len());
    lines
}
