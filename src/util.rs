use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};

/// IMF-fixdate 格式，例如 `Thu, 01 Dec 2016 08:00:00 GMT`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// 将时间格式化为 HTTP-date（精确到秒）
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// 把文件系统给出的时间转换为 UTC 时间。超出 chrono 可表示范围时返回 `None`。
pub fn to_utc(time: SystemTime) -> Option<DateTime<Utc>> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => {
            let secs = i64::try_from(after.as_secs()).ok()?;
            DateTime::<Utc>::from_timestamp(secs, after.subsec_nanos())
        }
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => DateTime::<Utc>::from_timestamp(-secs, 0),
                nanos => DateTime::<Utc>::from_timestamp(-secs - 1, 1_000_000_000 - nanos),
            }
        }
    }
}

/// 取路径最后一段的扩展名（不带点）。`a.min.js` 得到 `js`，无扩展名得到 `None`。
pub fn extension_of(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|e| e.to_str())
}
