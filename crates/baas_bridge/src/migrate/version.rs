//! 迁移版本号分配
//!
//! 版本号为 14 位 UTC 时间戳 `YYYYMMDDHHMMSS`，字典序即创建顺序。
//! 同一秒内的多次分配会顺延到下一秒，保证版本号严格递增且永不复用。

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{14}$").unwrap());

/// 判断字符串是否符合 `\d{14}` 版本格式
pub fn is_valid_version(version: &str) -> bool {
    VERSION_PATTERN.is_match(version)
}

pub fn format_version(at: DateTime<Utc>) -> String {
    at.format(VERSION_FORMAT).to_string()
}

/// 时间来源，测试中可替换为手动时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct VersionAllocator {
    clock: Arc<dyn Clock>,
    // 本进程内最后一次发出的版本号
    last_issued: Mutex<Option<String>>,
}

impl VersionAllocator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_issued: Mutex::new(None),
        }
    }

    /// 按当前时间生成版本号，不考虑已有版本
    pub fn allocate(&self) -> String {
        format_version(self.clock.now())
    }

    /// 生成一个严格大于 `floor` 及本进程已发出版本的版本号
    ///
    /// `floor` 通常是历史表与回滚账本中最大的版本号。
    pub fn allocate_after(&self, floor: Option<&str>) -> String {
        let mut last_issued = self.last_issued.lock();
        let candidate = self.allocate();

        let floor = match (floor, last_issued.as_deref()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let version = match floor {
            Some(floor) if candidate.as_str() <= floor => {
                let bumped = next_version(floor);
                debug!("版本号 {} 不大于已有版本 {}，顺延为 {}", candidate, floor, bumped);
                bumped
            }
            _ => candidate,
        };

        *last_issued = Some(version.clone());
        version
    }
}

/// 计算紧随 `version` 之后的版本号（下一秒）
fn next_version(version: &str) -> String {
    match NaiveDateTime::parse_from_str(version, VERSION_FORMAT) {
        Ok(at) => (at + Duration::seconds(1)).format(VERSION_FORMAT).to_string(),
        // 非法时间（例如外部写入的版本号）退化为数值加一
        Err(_) => version
            .parse::<u64>()
            .map(|v| format!("{:014}", v.saturating_add(1)))
            .unwrap_or_else(|_| version.to_string()),
    }
}
