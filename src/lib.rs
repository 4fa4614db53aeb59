//! prefixlog - date-prefixed rotating log files
//!
//! Writes each log stream to `{YYYY-MM-DD}.{logType}.{ext}`, rolls over when the
//! local date changes, keeps a bounded number of files per stream, and mirrors
//! colourised lines to the console.

pub mod config;
pub mod logging;
