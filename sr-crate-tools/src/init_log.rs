use std::io::Write;

/// 默认 Info 级别，可以通过 `RUST_LOG` 覆盖
pub fn init_log() {
    init_log_with_level(log::LevelFilter::Info);
}

/// 以指定的级别初始化日志
///
/// 输出格式：`[时间] 级别 [文件:行号] 内容`
pub fn init_log_with_level(level: log::LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let level_style = match record.level() {
                log::Level::Error => {
                    buf.default_level_style(log::Level::Error).fg_color(Some(anstyle::AnsiColor::Red.into()))
                }
                log::Level::Warn => {
                    buf.default_level_style(log::Level::Warn).fg_color(Some(anstyle::AnsiColor::Yellow.into()))
                }
                log::Level::Info => {
                    buf.default_level_style(log::Level::Info).fg_color(Some(anstyle::AnsiColor::Green.into()))
                }
                other => buf.default_level_style(other),
            };
            let location_style = anstyle::Style::new().fg_color(Some(anstyle::RgbColor(110, 110, 110).into()));

            // windows 下的路径分隔符也需要处理
            let file = record.file().unwrap_or("").rsplit(['/', '\\']).next().unwrap_or("");
            let line = record.line().unwrap_or(0);
            let time = chrono::Local::now().format("%H:%M:%S%.3f");

            writeln!(
                buf,
                "{level_style}[{time}] {:<5}{level_style:#} {location_style}[{file}:{line}]{location_style:#} {}",
                record.level(),
                record.args()
            )
        })
        .filter(None, level);

    // 允许 RUST_LOG 覆盖默认级别
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // 测试中可能多次初始化
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_log_twice() {
        init_log_with_level(log::LevelFilter::Debug);
        init_log();
        log::info!("logger initialized");
        assert!(log::log_enabled!(log::Level::Warn));
    }
}
