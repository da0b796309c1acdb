//! 应答解析
//!
//! 控制器的应答有三种形状：
//! - 数值应答：`<echoed-key>=<value>`，`value` 为十进制、可带符号、可带小数
//! - 确认应答：`%`（已执行）或 `*`（已缓冲）
//! - 拒绝应答：`?<code>`
//!
//! 数值解析不使用魔法 NaN，而是返回显式的 [`Reading::NotANumber`]。

/// 一次数值读取的结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reading {
    /// 从未读取过
    #[default]
    Unknown,
    /// 有效数值
    Value(f64),
    /// 最近一次读取的应答不是合法的 `<key>=<number>`
    NotANumber,
}

impl Reading {
    /// 数值（仅当为 `Value` 时）
    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    /// 按整数读取（四舍五入），超出 `i64` 范围时为 `None`
    #[inline]
    pub fn as_i64(self) -> Option<i64> {
        self.value()
            .map(f64::round)
            .filter(|v| (i64::MIN as f64..i64::MAX as f64).contains(v))
            .map(|v| v as i64)
    }

    /// 是否为有效数值
    #[inline]
    pub fn is_value(self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

/// 应答分类
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind<'a> {
    /// `%`：命令已执行
    Ack,
    /// `*`：命令已进入缓冲区
    Buffered,
    /// `?<code>`：命令被拒绝
    Nack { code: &'a str },
    /// `<key>=<value>`
    KeyValue { key: &'a str, value: &'a str },
    /// 其他（包括空应答）
    Other(&'a str),
}

impl<'a> ReplyKind<'a> {
    /// 对解码后的应答文本分类
    pub fn classify(reply: &'a str) -> Self {
        let reply = reply.trim();
        if let Some(code) = reply.strip_prefix('?') {
            return ReplyKind::Nack { code: code.trim() };
        }
        if reply.starts_with('%') {
            return ReplyKind::Ack;
        }
        if reply.starts_with('*') {
            return ReplyKind::Buffered;
        }
        match reply.split_once('=') {
            Some((key, value)) => ReplyKind::KeyValue {
                key: key.trim(),
                value: value.trim(),
            },
            None => ReplyKind::Other(reply),
        }
    }

    /// 是否为拒绝应答
    pub fn is_nack(&self) -> bool {
        matches!(self, ReplyKind::Nack { .. })
    }
}

/// 将应答解析为数值读取
///
/// 只有 `<key>=<number>` 形状的应答产生 `Value`，其余一律为 `NotANumber`。
///
/// ```rust
/// use wheel_protocol::{Reading, parse_reading};
///
/// assert_eq!(parse_reading("e=-1234"), Reading::Value(-1234.0));
/// assert_eq!(parse_reading("JS=10.5"), Reading::Value(10.5));
/// assert_eq!(parse_reading("?4"), Reading::NotANumber);
/// ```
pub fn parse_reading(reply: &str) -> Reading {
    match ReplyKind::classify(reply) {
        ReplyKind::KeyValue { value, .. } if is_reply_number(value) => value
            .parse::<f64>()
            .map(Reading::Value)
            .unwrap_or(Reading::NotANumber),
        _ => Reading::NotANumber,
    }
}

/// 应答中的数字：可选符号（`+`/`-`），数字与一个可选小数点，至少一位数字
fn is_reply_number(text: &str) -> bool {
    let body = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let mut digits = 0;
    let mut dots = 0;
    for b in body.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_reading("e=12345"), Reading::Value(12345.0));
        assert_eq!(parse_reading("AC=0.167"), Reading::Value(0.167));
        assert_eq!(parse_reading("DI=+100"), Reading::Value(100.0));
        assert_eq!(parse_reading(" t = 36.5 "), Reading::Value(36.5));
        assert_eq!(parse_reading("v=.5"), Reading::Value(0.5));
    }

    #[test]
    fn test_parse_not_a_number() {
        for reply in ["", "%", "*", "?1", "e=", "e=abc", "e=1.2.3", "e=nan", "e=inf", "e=1e3", "12"] {
            assert_eq!(parse_reading(reply), Reading::NotANumber, "{reply:?}");
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ReplyKind::classify("%"), ReplyKind::Ack);
        assert_eq!(ReplyKind::classify("*"), ReplyKind::Buffered);
        assert_eq!(ReplyKind::classify("?3"), ReplyKind::Nack { code: "3" });
        assert!(ReplyKind::classify("?").is_nack());
        assert_eq!(
            ReplyKind::classify("JS=10"),
            ReplyKind::KeyValue {
                key: "JS",
                value: "10"
            }
        );
        assert_eq!(ReplyKind::classify("hello"), ReplyKind::Other("hello"));
    }

    #[test]
    fn test_reading_accessors() {
        assert_eq!(Reading::Value(2.6).as_i64(), Some(3));
        assert_eq!(Reading::Value(-1e30).as_i64(), None);
        assert_eq!(Reading::Value(9.3e18).as_i64(), None);
        assert_eq!(Reading::Value(f64::INFINITY).as_i64(), None);
        assert_eq!(Reading::NotANumber.value(), None);
        assert_eq!(Reading::default(), Reading::Unknown);
        assert!(!Reading::Unknown.is_value());
    }
}
