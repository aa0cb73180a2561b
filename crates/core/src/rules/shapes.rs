//! 价格词形匹配
//!
//! 三种整词形状，各自独立判断：币种代码、金额、占位横线。
//! 不做子串匹配，整个词必须完全符合某一种形状。

/// 价格词形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceShape {
    /// 币种代码，如 `USD`
    CurrencyCode,
    /// 金额：`digits[,digits]*[.digits]`
    Amount,
    /// 占位符：由 `_`、`-`、`—` 组成的串
    Placeholder,
}

/// 依次尝试三种形状
pub fn price_shape(text: &str, currency_codes: &[String]) -> Option<PriceShape> {
    if is_currency_code(text, currency_codes) {
        Some(PriceShape::CurrencyCode)
    } else if is_amount(text) {
        Some(PriceShape::Amount)
    } else if is_placeholder(text) {
        Some(PriceShape::Placeholder)
    } else {
        None
    }
}

pub fn is_currency_code(text: &str, currency_codes: &[String]) -> bool {
    currency_codes.iter().any(|code| code == text)
}

#[derive(Clone, Copy)]
enum AmountState {
    Start,
    Integer,
    AfterComma,
    AfterPoint,
    Fraction,
}

/// 金额状态机
///
/// 逗号后必须紧跟数字，小数点最多一个且后面至少一位数字。
pub fn is_amount(text: &str) -> bool {
    use AmountState::*;

    let mut state = Start;
    for c in text.chars() {
        state = match (state, c) {
            (Start | Integer | AfterComma, '0'..='9') => Integer,
            (Integer, ',') => AfterComma,
            (Integer, '.') => AfterPoint,
            (AfterPoint | Fraction, '0'..='9') => Fraction,
            _ => return false,
        };
    }
    matches!(state, Integer | Fraction)
}

pub fn is_placeholder(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| matches!(c, '_' | '-' | '—'))
}
