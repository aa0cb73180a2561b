//! 关键词规则
//!
//! 禁止行关键词、合计标签词表和币种代码。全部可以通过配置覆盖。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

mod shapes;

pub use shapes::{is_amount, is_currency_code, is_placeholder, price_shape, PriceShape};

/// 关键词规则集合
///
/// 所有关键词都以规范化形式（大写、去首尾标点）比较。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    /// 付款条件、天数、贸易条款等标记，命中的行永不脱敏
    pub forbidden_keywords: Vec<String>,
    /// 合计行标签词表
    pub totals_labels: Vec<String>,
    /// 合计行必须包含的词
    pub totals_required: String,
    /// 视为价格的币种代码（整词、区分大小写）
    pub currency_codes: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            forbidden_keywords: ["PAYMENT", "TERM", "O/A", "DAYS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            totals_labels: ["SUB", "TOTAL", "AMOUNT", "TAX", "WEEE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            totals_required: "AMOUNT".to_string(),
            currency_codes: vec!["USD".to_string()],
        }
    }
}

impl RuleSet {
    /// 行是否带有禁止关键词
    pub fn is_forbidden(&self, keys: &BTreeSet<String>) -> bool {
        self.forbidden_keywords.iter().any(|k| keys.contains(k))
    }

    /// 行是否为合计行：命中标签词表，并且包含必需词
    pub fn is_totals(&self, keys: &BTreeSet<String>) -> bool {
        let labelled = self.totals_labels.iter().any(|k| keys.contains(k));
        labelled && keys.contains(&self.totals_required)
    }

    pub fn price_shape(&self, text: &str) -> Option<PriceShape> {
        price_shape(text, &self.currency_codes)
    }
}
