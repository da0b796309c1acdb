//! 帧编解码
//!
//! 请求帧与应答帧使用相同的封装：
//!
//! ```text
//! +------+------+----------------------+------+
//! | 0x00 | 0x07 |  ASCII command text  | 0x0D |
//! +------+------+----------------------+------+
//! ```
//!
//! 解码是"尽力而为"的：去掉前两个字节和最后一个字节，剩余部分按 UTF-8 解码，
//! 无法解码的字节被静默丢弃，而不是报错。

use crate::constants::{FRAME_HEADER, FRAME_TERMINATOR};
use bytes::{BufMut, Bytes, BytesMut};

/// 帧封装开销（帧头 + 结束符）
pub const FRAME_OVERHEAD: usize = FRAME_HEADER.len() + 1;

/// 将 ASCII 命令封装为线路帧
///
/// # 示例
///
/// ```rust
/// use wheel_protocol::frame::encode;
///
/// let frame = encode("RUe1");
/// assert_eq!(&frame[..], b"\x00\x07RUe1\r");
/// ```
pub fn encode(command: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(command.len() + FRAME_OVERHEAD);
    buf.put_slice(&FRAME_HEADER);
    buf.put_slice(command.as_bytes());
    buf.put_u8(FRAME_TERMINATOR);
    buf.freeze()
}

/// 解封线路帧为文本
///
/// 不校验帧头和结束符的具体取值：前 2 个字节和最后 1 个字节总是被丢弃。
/// 长度不足 3 字节的帧解码为空字符串。
pub fn decode(frame: &[u8]) -> String {
    if frame.len() < FRAME_OVERHEAD {
        return String::new();
    }

    let payload = &frame[FRAME_HEADER.len()..frame.len() - 1];
    let mut text = String::with_capacity(payload.len());
    for chunk in payload.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// 判断缓冲区是否已包含完整帧（以结束符收尾）
#[inline]
pub fn is_complete(buf: &[u8]) -> bool {
    buf.len() >= FRAME_OVERHEAD && buf.last() == Some(&FRAME_TERMINATOR)
}
