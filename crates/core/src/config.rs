use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::rules::RuleSet;
use crate::{CoreError, Result};

/// 引擎配置
///
/// 所有容差与边距都是可调常量，单位为页面布局单位（pt）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedactConfig {
    // ============ 行分组 ============
    /// 同一行的 `top` 容差
    pub line_tolerance: f64,
    /// 字形拼词时允许的最大水平间隙
    pub word_gap_tolerance: f64,

    // ============ 区域 ============
    /// 表头向上放宽
    pub header_margin: f64,
    /// 表尾向下放宽
    pub footer_margin: f64,
    /// 价格列左侧容差
    pub column_tolerance: f64,
    /// SAY TOTAL 标签右侧容差
    pub tail_tolerance: f64,
    /// 覆盖矩形的内边距
    pub rect_padding: f64,
    /// 找不到 ITEM + DESCRIPTION 时是否接受仅 ITEM 的表头
    pub allow_item_only_header: bool,

    // ============ 关键词 ============
    pub rules: RuleSet,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            word_gap_tolerance: 3.0,
            header_margin: 6.0,
            footer_margin: 10.0,
            column_tolerance: 1.0,
            tail_tolerance: 2.0,
            rect_padding: 1.0,
            allow_item_only_header: true,
            rules: RuleSet::default(),
        }
    }
}

impl RedactConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("lineTolerance", self.line_tolerance),
            ("wordGapTolerance", self.word_gap_tolerance),
            ("headerMargin", self.header_margin),
            ("footerMargin", self.footer_margin),
            ("columnTolerance", self.column_tolerance),
            ("tailTolerance", self.tail_tolerance),
            ("rectPadding", self.rect_padding),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidConfig(format!("{name} 必须是非负数: {value}")));
            }
        }
        if self.rules.totals_required.trim().is_empty() {
            return Err(CoreError::InvalidConfig("totalsRequired 不能为空".to_string()));
        }
        Ok(())
    }
}

/// 读取配置文件，文件不存在时返回默认配置
pub fn load_config(path: &Path) -> Result<RedactConfig> {
    if !path.exists() {
        log::info!("[Config] 配置文件不存在，使用默认配置: {}", path.display());
        return Ok(RedactConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let config: RedactConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &RedactConfig) -> Result<()> {
    config.validate()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}
