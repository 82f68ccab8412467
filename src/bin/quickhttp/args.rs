use std::io::Write as _;

pub(crate) fn init_logging(level: Option<log::Level>, colored: bool) {
    let Some(level) = level else {
        return;
    };

    let palette = if colored {
        Palette::colored()
    } else {
        Palette::plain()
    };

    let mut builder = env_logger::Builder::new();
    builder.write_style(if colored {
        env_logger::WriteStyle::Always
    } else {
        env_logger::WriteStyle::Never
    });
    builder.filter(None, level.to_level_filter());

    if level == log::Level::Trace || level == log::Level::Debug {
        builder.format_timestamp_secs();
    } else {
        builder.format(move |f, record| match record.level() {
            log::Level::Error => writeln!(
                f,
                "{}ERROR:{} {}",
                palette.error.render(),
                palette.error.render_reset(),
                record.args()
            ),
            log::Level::Warn => writeln!(
                f,
                "{}WARN:{} {}",
                palette.warn.render(),
                palette.warn.render_reset(),
                record.args()
            ),
            log::Level::Info => writeln!(f, "{}", record.args()),
            log::Level::Debug => writeln!(
                f,
                "{}DEBUG:{} {}",
                palette.debug.render(),
                palette.debug.render_reset(),
                record.args()
            ),
            log::Level::Trace => writeln!(
                f,
                "{}TRACE:{} {}",
                palette.trace.render(),
                palette.trace.render_reset(),
                record.args()
            ),
        });
    }

    builder.init();
}

#[derive(Copy, Clone, Debug, Default)]
struct Palette {
    error: anstyle::Style,
    warn: anstyle::Style,
    debug: anstyle::Style,
    trace: anstyle::Style,
}

impl Palette {
    fn colored() -> Self {
        Self {
            error: anstyle::AnsiColor::Red.on_default() | anstyle::Effects::BOLD,
            warn: anstyle::AnsiColor::Yellow.on_default(),
            debug: anstyle::AnsiColor::Blue.on_default(),
            trace: anstyle::AnsiColor::Cyan.on_default(),
        }
    }

    fn plain() -> Self {
        Self::default()
    }
}
