//! 语言任务锁
//!
//! `{dir}/{language}.lock` 以 `create_new` 方式创建，文件存在即表示该语言
//! 的任务或重置正在进行，跨进程有效。锁在 drop 时删除文件。

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 某个语言的独占锁
#[derive(Debug)]
pub struct LanguageLock {
    path: PathBuf,
}

impl LanguageLock {
    /// 获取锁；已被持有时返回并发错误
    pub fn acquire(dir: &Path, language: &str) -> TranslationResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}{}", language, constants::LOCK_FILE_SUFFIX));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TranslationError::ConcurrencyError(format!(
                    "{} 已被另一个任务占用 (锁文件 {})；若确认没有任务在运行，删除该文件后重试",
                    language,
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;

        tracing::debug!("已获取语言锁: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LanguageLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("无法释放语言锁 {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LanguageLock::acquire(dir.path(), "urdu").unwrap();
        assert!(lock.path().ends_with("urdu.lock"));

        let err = LanguageLock::acquire(dir.path(), "urdu").unwrap_err();
        assert!(matches!(err, TranslationError::ConcurrencyError(_)));

        // 其他语言不受影响
        let _other = LanguageLock::acquire(dir.path(), "french").unwrap();
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let lock = LanguageLock::acquire(dir.path(), "german").unwrap();
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
        let _again = LanguageLock::acquire(dir.path(), "german").unwrap();
    }
}
