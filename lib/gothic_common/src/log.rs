//!
//! @file log.rs
//! @author Gothic Free Aim Developers
//! @brief Installs the log backend that writes the plugin log file in the game's system folder.
//! @bug No known bugs.
//!
//! Everything in the workspace logs through the `log` facade. This module installs the sink, a
//! simplelog file logger truncated when the plugin attaches, and shows a message box for fatal
//! errors so that the user learns why the game is about to misbehave.
//!

use std::fmt::Arguments;
use std::fs::File;
use std::path::Path;

use ::log::LevelFilter;
use simplelog::{Config, WriteLogger};

/// The caption used for message boxes shown by the plugin.
pub const CAPTION: &str = "Gothic Free Aim";

/// Enumeration to determine how a fatal error will be presented to the user.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LogType {
    File,
    Window,
    Both
}

///
/// Opens the plugin log file at the given path, truncating it, and installs it as the global
/// logger.
///
/// Only the first call installs a logger; later calls still truncate the file they are given.
///
pub fn open(
    path: &Path
) -> std::io::Result<()> {
    let file = File::create(path)?;
    if WriteLogger::init(LevelFilter::Debug, Config::default(), file).is_err() {
        ::log::warn!("A logger is already installed, not logging to {}", path.display());
    }
    Ok(())
}

///
/// Logs a fatal error, opening a message box as well.
///
/// Never panics, as it may be called while the game is being torn down.
///
#[doc(hidden)]
pub fn fatal(
    log_type: LogType,
    args: Arguments<'_>
) {
    if log_type != LogType::Window {
        ::log::error!("{}", args);
        ::log::logger().flush();
    }

    if log_type != LogType::File {
        show_window(&args.to_string());
    }
}

/// Shows a blocking error message box.
#[cfg(windows)]
fn show_window(
    msg: &str
) {
    use windows_sys::Win32::UI::WindowsAndMessaging::{MessageBoxA, MB_ICONERROR};

    let mut text: Vec<u8> = msg.bytes().filter(|b| *b != 0).collect();
    text.push(0);
    let mut caption: Vec<u8> = CAPTION.bytes().collect();
    caption.push(0);

    unsafe {
        // SAFETY: Both strings are nul terminated and outlive the call.
        MessageBoxA(0, text.as_ptr(), caption.as_ptr(), MB_ICONERROR);
    }
}

/// No windows to show outside the game; the log line has to do.
#[cfg(not(windows))]
fn show_window(
    msg: &str
) {
    eprintln!("{}: {}", CAPTION, msg);
}

#[macro_export]
macro_rules! gfa_fatal {
    ( $($fmt:expr),* => window ) => {
        $crate::log::fatal($crate::log::LogType::Window, ::std::format_args!($($fmt),*))
    };
    ( $($fmt:expr),* => log ) => {
        $crate::log::fatal($crate::log::LogType::File, ::std::format_args!($($fmt),*))
    };
    ( $($fmt:expr),* ) => {
        $crate::log::fatal($crate::log::LogType::Both, ::std::format_args!($($fmt),*))
    };
}

pub use gfa_fatal;
