//! 命令白名单校验
//!
//! 一条命令合法，当且仅当：
//! - 与某个裸令牌（动作或读查询）完全相等；或
//! - 以某个写前缀开头，紧跟一个合法数字字面量，且没有多余字符。
//!
//! 数字字面量语法：可选的前导 `-`，一个或多个 ASCII 数字，可选的一个 `.`
//! 后跟一个或多个数字。
//!
//! 这是阻止畸形写命令到达运动硬件的唯一安全边界。

use crate::ProtocolError;
use crate::command::Action;
use crate::register::Register;

/// 校验命令
///
/// # 示例
///
/// ```rust
/// use wheel_protocol::validate;
///
/// assert!(validate("AC12.5").is_ok());
/// assert!(validate("AC-3").is_ok());
/// assert!(validate("AC12x").is_err());
/// assert!(validate("ZZ").is_err());
/// ```
pub fn validate(command: &str) -> Result<(), ProtocolError> {
    if is_bare_token(command) || is_prefixed_write(command) {
        Ok(())
    } else {
        Err(ProtocolError::Rejected {
            command: command.to_string(),
        })
    }
}

/// 是否为合法命令
#[inline]
pub fn is_valid(command: &str) -> bool {
    validate(command).is_ok()
}

fn is_bare_token(command: &str) -> bool {
    Action::ALL.iter().any(|a| a.token() == command)
        || Register::ALL.iter().any(|r| r.query() == command)
}

fn is_prefixed_write(command: &str) -> bool {
    Register::ALL
        .iter()
        .filter_map(|r| r.write_prefix())
        .any(|prefix| {
            command
                .strip_prefix(prefix)
                .is_some_and(is_number_literal)
        })
}

/// 是否为合法的写入数字字面量
///
/// 接受 `12`、`-3`、`12.5`；拒绝空串、`+1`、`1.`、`.5`、`1.2.3`、`1e3`。
pub fn is_number_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.is_none_or(all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_examples() {
        assert!(validate("AC12.5").is_ok());
        assert!(validate("AC-3").is_ok());
        assert!(validate("AC12x").is_err());
        assert!(validate("ZZ").is_err());
    }

    #[test]
    fn test_bare_tokens() {
        for token in [
            "RUe1", "CJ", "SJ", "SHX0H", "RE", "QX1", "SK", "FL", "QX2", "SKD", "CM", "VE", "AC",
            "DE", "AM", "DI", "JS", "JA", "RLA", "RLJ", "RUt1", "RUv1", "RUw1", "RUx1",
        ] {
            assert!(validate(token).is_ok(), "{token} should be accepted");
        }
    }

    #[test]
    fn test_writes() {
        for cmd in ["DI-100", "DI100", "EP0", "JS10.0", "JA0.500", "RLA255", "RLG250", "VE0.0042"] {
            assert!(validate(cmd).is_ok(), "{cmd} should be accepted");
        }
    }

    #[test]
    fn test_rejections() {
        for cmd in [
            "", "ac12", "AC 12", "AC12 ", " AC12", "AC+12", "AC1.", "AC.5", "AC1.2.3", "AC1e3",
            "AC--1", "AC-", "RLJ5", "RUt15", "CJ1", "EP", "SHX0H1", "RUe1\r", "VE12;RE",
        ] {
            assert!(validate(cmd).is_err(), "{cmd:?} should be rejected");
        }
    }

    #[test]
    fn test_rejection_keeps_command() {
        match validate("ZZ") {
            Err(ProtocolError::Rejected { command }) => assert_eq!(command, "ZZ"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_number_literal() {
        assert!(is_number_literal("0"));
        assert!(is_number_literal("-0.5"));
        assert!(is_number_literal("8192"));
        assert!(!is_number_literal("-"));
        assert!(!is_number_literal("1.2.3"));
        assert!(!is_number_literal("١٢")); // 非 ASCII 数字
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("FL"));
        assert!(!is_valid("FLX"));
    }
}
