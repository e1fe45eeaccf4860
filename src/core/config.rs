use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: hrbot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "hrbot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: hrbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "hrbot.log".to_string()));

/// Port for the REST API server
/// Read from API_PORT environment variable
/// Default: 8000
pub static API_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("API_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000)
});

/// Webhook URL for Telegram updates
/// Read from WEBHOOK_URL environment variable; long polling is used when unset
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Port the webhook listener binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8443)
});

/// Telegram IDs of HR recipients for completion alerts
/// Read from HR_TELEGRAM_IDS environment variable (comma-separated)
pub static HR_TELEGRAM_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
    env::var("HR_TELEGRAM_IDS")
        .map(|raw| parse_id_list(&raw))
        .unwrap_or_default()
});

/// Parses a comma-separated list of Telegram IDs, skipping blanks and junk.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for outbound HTTP requests (Telegram API) in seconds
    pub const TIMEOUT_SECS: u64 = 30;

    /// Outbound request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Retry configuration for the conversation state store
pub mod storage_retry {
    use super::Duration;

    /// Maximum attempts before a contention error becomes a hard failure
    pub const MAX_ATTEMPTS: u32 = 5;

    /// Initial delay before the first retry (milliseconds)
    pub const INITIAL_DELAY_MS: u64 = 50;

    /// Upper bound on the backoff delay (milliseconds)
    pub const MAX_DELAY_MS: u64 = 1000;

    /// Multiplier for exponential backoff
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Calculates the capped exponential delay for a given attempt number.
    pub fn delay_for_attempt(attempt: u32) -> Duration {
        let base = INITIAL_DELAY_MS as f64 * BACKOFF_MULTIPLIER.powi(attempt as i32);
        Duration::from_millis(base.min(MAX_DELAY_MS as f64) as u64)
    }
}

/// Dispatcher restart policy
pub mod dispatcher {
    use super::Duration;

    /// How many times the dispatcher is restarted after a panic
    pub const MAX_RETRIES: u32 = 5;

    /// Delay between dispatcher restarts, grows with the attempt number
    pub fn restart_delay(attempt: u32) -> Duration {
        Duration::from_secs(5 * u64::from(attempt.max(1)))
    }
}

/// Survey defaults
pub mod survey {
    /// Default eligibility window: days after the employee's start date
    /// before a survey may be initiated
    pub const DEFAULT_DAYS_AFTER_START: i64 = 90;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hr_id_list() {
        assert_eq!(parse_id_list("1, 2,3"), vec![1, 2, 3]);
        assert_eq!(parse_id_list(""), Vec::<i64>::new());
        assert_eq!(parse_id_list("42,abc, 7 ,"), vec![42, 7]);
    }

    #[test]
    fn backoff_is_capped() {
        let first = storage_retry::delay_for_attempt(0);
        let later = storage_retry::delay_for_attempt(10);
        assert_eq!(first.as_millis(), storage_retry::INITIAL_DELAY_MS as u128);
        assert_eq!(later.as_millis(), storage_retry::MAX_DELAY_MS as u128);
    }
}
