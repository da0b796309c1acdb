//! 协议常量定义

/// 帧头（eSCL over TCP）
pub const FRAME_HEADER: [u8; 2] = [0x00, 0x07];

/// 帧结束符（回车）
pub const FRAME_TERMINATOR: u8 = 0x0D;

/// 单个应答帧的最大字节数
pub const MAX_FRAME_LEN: usize = 1024;

/// 每转步数（编码器分辨率）
pub const STEPS_PER_REVOLUTION: i64 = 8192;

/// 控制器默认 TCP 端口
pub const DEFAULT_PORT: u16 = 7776;

/// 寻零/点动方向设置所使用的移动距离（步）
pub const DIRECTION_HINT_STEPS: i64 = 100;
