//! # 靶位表
//!
//! 每转 16 个靶位，保存为 JSON 数组：
//!
//! ```json
//! [
//!   { "index": 0, "name": "Target 0", "position": 0 },
//!   { "index": 1, "name": "Target 1", "position": 512 }
//! ]
//! ```
//!
//! 加载时以默认表为底，文件中的条目按 `index` 覆盖；越界的条目被忽略。

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use wheel_protocol::STEPS_PER_REVOLUTION;

/// 靶位数量（扫描掩码每一位对应一个靶位）
pub const DEFAULT_TARGET_COUNT: usize = 16;

/// 单个靶位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub index: usize,
    pub name: String,
    /// 圈内位置（步）
    pub position: i64,
}

/// 靶位表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetTable {
    targets: Vec<Target>,
}

impl Default for TargetTable {
    fn default() -> Self {
        let spacing = STEPS_PER_REVOLUTION / DEFAULT_TARGET_COUNT as i64;
        let targets = (0..DEFAULT_TARGET_COUNT)
            .map(|i| Target {
                index: i,
                name: format!("Target {i}"),
                position: i as i64 * spacing,
            })
            .collect();
        Self { targets }
    }
}

impl TargetTable {
    /// 默认表：`Target i` 位于 `i·N/16`
    pub fn defaults() -> Self {
        Self::default()
    }

    /// 从文件加载，文件不存在时返回默认表
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut table = Self::default();
        if !path.exists() {
            return Ok(table);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取靶位文件失败: {}", path.display()))?;
        let entries: Vec<Target> = serde_json::from_str(&content)
            .with_context(|| format!("解析靶位文件失败: {}", path.display()))?;
        for entry in entries {
            if let Some(slot) = table.targets.get_mut(entry.index) {
                *slot = entry;
            }
        }
        Ok(table)
    }

    /// 保存到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建靶位目录失败")?;
        }
        let content = serde_json::to_string_pretty(self).context("序列化靶位表失败")?;
        fs::write(path, content).with_context(|| format!("写入靶位文件失败: {}", path.display()))
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    /// 按序号或名称查找（名称不区分大小写）
    pub fn find(&self, key: &str) -> Option<&Target> {
        let key = key.trim();
        if let Ok(index) = key.parse::<usize>() {
            return self.get(index);
        }
        self.targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(key))
    }

    /// 修改靶位
    pub fn set(&mut self, index: usize, name: Option<String>, position: Option<i64>) -> Result<()> {
        let Some(target) = self.targets.get_mut(index) else {
            bail!("靶位序号 {index} 超出范围 (0..{DEFAULT_TARGET_COUNT})");
        };
        if let Some(position) = position {
            if !(0..STEPS_PER_REVOLUTION).contains(&position) {
                bail!("靶位位置 {position} 超出范围 [0, {STEPS_PER_REVOLUTION})");
            }
            target.position = position;
        }
        if let Some(name) = name {
            target.name = name;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 由选中的靶位序号生成扫描掩码（第 i 位对应靶位 i）
    pub fn sweep_mask(indices: &[usize]) -> Result<u16> {
        indices.iter().try_fold(0u16, |mask, &index| {
            if index >= DEFAULT_TARGET_COUNT {
                bail!("靶位序号 {index} 超出范围 (0..{DEFAULT_TARGET_COUNT})");
            }
            Ok(mask | (1 << index))
        })
    }
}
