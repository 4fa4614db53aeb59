use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use prefixlog::config::{self, Config};
use prefixlog::logging::{self, LogRecord, Severity};

const USAGE: &str = "usage: prefixlog [pipe] | prefixlog show <logType> <YYYY-MM-DD>";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("pipe") => pipe(&config).await,
        Some("show") => match (args.get(1), args.get(2)) {
            (Some(log_type), Some(date)) => show(&config, log_type, date).await,
            _ => bail!(USAGE),
        },
        Some(_) => bail!(USAGE),
    }
}

/// Log every stdin line until EOF
async fn pipe(config: &Config) -> Result<()> {
    config::ensure_directories(config)?;

    // Initialize logging BEFORE any tracing calls
    let (info, guard) = logging::init_file_logging("prefixlog", config, None)?;
    logging::install_panic_hook();

    for path in &info.streams {
        tracing::debug!("Logging to: {}", path.display());
    }

    let logger = guard.logger();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u32;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        let (severity, message) = split_severity(&line);
        let record = LogRecord::new(severity, logger.name(), message)
            .with_location("stdin", "stdin", line_no);

        if let Err(errors) = logger.log(&record) {
            for e in errors {
                eprintln!("prefixlog: {}", e);
            }
        }
    }

    Ok(())
}

/// Print the file of one log type for one date
async fn show(config: &Config, log_type: &str, date: &str) -> Result<()> {
    let dir = config.logs_dir();
    let Some(path) = logging::find_log_file(&dir, log_type, &config.extension, date)? else {
        bail!("No '{}' log for {} in {}", log_type, date, dir.display());
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    print!("{}", content);
    Ok(())
}

/// Split a leading severity such as `ERROR:` or `warn ` off a line
fn split_severity(line: &str) -> (Severity, &str) {
    let head_len = line
        .find(|c: char| c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    match line[..head_len].parse::<Severity>() {
        Ok(severity) if head_len > 0 => {
            let rest = line[head_len..].trim_start_matches(':').trim_start();
            (severity, rest)
        }
        _ => (Severity::Info, line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_severity() {
        assert_eq!(split_severity("ERROR: disk full"), (Severity::Error, "disk full"));
        assert_eq!(split_severity("warn low memory"), (Severity::Warning, "low memory"));
        assert_eq!(split_severity("hello world"), (Severity::Info, "hello world"));
        assert_eq!(split_severity(""), (Severity::Info, ""));
    }
}
