//! `herald check-config`.

use super::error::AppResult;
use herald_config::Config;

/// Validate the configuration and print a redacted summary.
pub fn check_config(config: &Config) -> AppResult<()> {
    config.validate()?;

    for line in summary_lines(config) {
        println!("{}", line);
    }
    Ok(())
}

fn summary_lines(config: &Config) -> Vec<String> {
    let mut lines = vec![
        "Configuration is valid".to_string(),
        format!("  Token:           {}", config.redacted_token()),
        format!("  Command prefix:  {}", config.command_prefix),
        format!("  Log level:       {}", config.log_level),
        format!(
            "  Message content: {}",
            if config.message_content_intent { "enabled" } else { "disabled" }
        ),
        format!(
            "  Retries:         {} (retention {}s, eviction every {}s)",
            config.retry.max_retries,
            config.retry.retention_window_secs,
            config.retry.eviction_interval_secs
        ),
    ];

    match &config.stream_watcher {
        Some(watcher) => lines.push(format!(
            "  Stream watcher:  {} streamer(s), every {}s",
            watcher.streamers.len(),
            watcher.check_interval_secs
        )),
        None => lines.push("  Stream watcher:  disabled".to_string()),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> Config {
        Config {
            discord_token: token.map(str::to_string),
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(check_config(&config(Some("MTIz.NDU2.Nzg5"))).is_ok());
    }

    #[test]
    fn missing_token_is_a_credential_error() {
        let err = check_config(&config(None)).unwrap_err();
        assert!(err.is_credential_error());
    }

    #[test]
    fn summary_never_prints_the_token() {
        let lines = summary_lines(&config(Some("MTIz.NDU2.Nzg5")));
        assert!(lines.iter().all(|l| !l.contains("NDU2")));
        assert!(lines.iter().any(|l| l.contains("MTIz…")));
        assert!(lines.iter().any(|l| l.contains("disabled")));
    }
}
