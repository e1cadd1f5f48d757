use chrono::Timelike;
use strum_macros::{Display, EnumString, VariantNames};

/// Event severity.
#[derive(Debug, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq)]
pub enum LogSev {
    Debug,
    DebugVerbose,
    Diagnostics,
    Error,
    Info,
    Warn,
}

/// Event context, renamed from the teacher's game-subsystem tags to this
/// pipeline's own stages.
#[derive(Debug, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq)]
pub enum LogAbout {
    Cli,
    Coordinator,
    Geometry,
    Camera,
    Wedge,
    Atlas,
    Tiling,
    ObjectStore,
}

#[track_caller]
pub fn one(show_caller_location_override: Option<bool>, severity: LogSev, about: LogAbout, msg: &str) {
    use std::fmt::Write;
    let show_location = show_caller_location_override.unwrap_or(true);

    let now = chrono::Local::now();
    let (h, m, s) = (now.hour(), now.minute(), now.second());

    let mut full_msg = String::with_capacity(256);
    write!(full_msg, "<d>{h:02}:{m:02}:{s:02} {{ ").unwrap();

    if show_location {
        let caller = std::panic::Location::caller();
        let loc_str = format!("{}:{}", caller.file(), caller.line());

        const PAD_WIDTH: usize = 46;
        let loc_trimmed = if loc_str.len() > PAD_WIDTH {
            let slice = &loc_str[loc_str.len() - (PAD_WIDTH - 2)..];
            format!("..{slice}")
        } else {
            loc_str
        };
        write!(full_msg, "{:width$}", loc_trimmed, width = PAD_WIDTH).unwrap();
    }

    full_msg.push_str(" }}</d> ");

    let about_str = format!("[{about}]");
    write!(full_msg, "<b>{about_str: <18}</b> ").unwrap();

    let sev_symbol: &'static str = match severity {
        LogSev::Debug | LogSev::DebugVerbose => "<bright-magenta><bold><info></bold></>",
        LogSev::Diagnostics => "<dark-green><bold><info></bold></>",
        LogSev::Error => "<red><bold><cross></bold></>",
        LogSev::Info => "<cyan><bold><info></bold></>",
        LogSev::Warn => "<bright-yellow><bold><warn></bold></>",
    };
    full_msg.push_str(sev_symbol);
    full_msg.push(' ');

    match severity {
        LogSev::Diagnostics => write!(full_msg, "<dark-green>{msg}</>").unwrap(),
        LogSev::Error => write!(full_msg, "<red><bold>{msg}</></bold>").unwrap(),
        LogSev::Info => write!(full_msg, "<cyan>{msg}</>").unwrap(),
        LogSev::Warn => write!(full_msg, "<bright-yellow>{msg}</>").unwrap(),
        _ => full_msg.push_str(msg),
    }

    paris::log!("{full_msg}");
}

pub fn system(msg: &str) {
    paris::log!("<dark-green>{msg}</>");
}

/// Installs the `tracing` subscriber used by library code (`landform-core`
/// logs via `tracing`, the CLI's own progress output goes through
/// `paris` via [`one`]).
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::fmt;
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(true)
        .init();
}
