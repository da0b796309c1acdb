//! 靶位表命令

use anyhow::{Result, bail};
use clap::Subcommand;
use wheel_tools::TargetTable;

use crate::modes::oneshot::OneShotMode;

/// 靶位表命令
#[derive(Subcommand, Debug)]
pub enum TargetsCommand {
    /// 列出靶位
    List,

    /// 写入默认靶位表
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },

    /// 修改靶位
    Set {
        /// 靶位序号
        index: usize,

        /// 名称
        #[arg(long)]
        name: Option<String>,

        /// 圈内位置（步）
        #[arg(long)]
        position: Option<i64>,
    },
}

impl TargetsCommand {
    pub fn execute(self, mode: &OneShotMode) -> Result<()> {
        let path = mode.settings().target_file()?;
        match self {
            TargetsCommand::List => {
                let table = TargetTable::load_from_file(&path)?;
                println!("靶位表: {}", path.display());
                for target in table.iter() {
                    println!("  {:>2}  {:<20} {:>5}", target.index, target.name, target.position);
                }
                Ok(())
            },

            TargetsCommand::Init { force } => {
                if path.exists() && !force {
                    bail!("{} 已存在（使用 --force 覆盖）", path.display());
                }
                TargetTable::defaults().save_to_file(&path)?;
                println!("✅ 已写入默认靶位表: {}", path.display());
                Ok(())
            },

            TargetsCommand::Set { index, name, position } => {
                if name.is_none() && position.is_none() {
                    bail!("需要 --name 或 --position");
                }
                let mut table = TargetTable::load_from_file(&path)?;
                table.set(index, name, position)?;
                table.save_to_file(&path)?;
                if let Some(target) = table.get(index) {
                    println!("✅ {} = {} ({})", target.index, target.name, target.position);
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheel_tools::Settings;

    fn mode_in(dir: &std::path::Path) -> (OneShotMode, std::path::PathBuf) {
        let path = dir.join("targets.json");
        let mut settings = Settings::default();
        settings.set("target_file", &path.display().to_string()).unwrap();
        (OneShotMode::from_settings(settings), path)
    }

    #[test]
    fn test_init_then_set() {
        let dir = tempfile::tempdir().unwrap();
        let (mode, path) = mode_in(dir.path());

        TargetsCommand::Init { force: false }.execute(&mode).unwrap();
        assert!(path.exists());
        assert!(TargetsCommand::Init { force: false }.execute(&mode).is_err());
        TargetsCommand::Init { force: true }.execute(&mode).unwrap();

        TargetsCommand::Set { index: 7, name: Some("Tin".to_string()), position: Some(3700) }
            .execute(&mode)
            .unwrap();
        let table = TargetTable::load_from_file(&path).unwrap();
        assert_eq!(table.find("tin").unwrap().position, 3700);
    }

    #[test]
    fn test_set_requires_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let (mode, path) = mode_in(dir.path());
        assert!(TargetsCommand::Set { index: 1, name: None, position: None }.execute(&mode).is_err());
        assert!(!path.exists());
    }
}
