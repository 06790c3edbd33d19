//! Subscription file parsing (spec.md C9): one exchange/instrument record
//! per line, `exchange_name,instmt_name,instmt_code`.

use std::path::Path;
use thiserror::Error;

/// A single `{ instrument_id, exchange, channel }` subscription, created
/// at startup and immutable for the process lifetime (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Which exchange adapter should own this instrument (`gdax`,
    /// `bitfinex`, `bittrex`).
    pub exchange: String,
    /// Human-readable instrument name, for logging.
    pub instrument_name: String,
    /// The exchange's own wire product code (e.g. `BTC-USD`).
    pub instrument_code: String,
}

/// Failures reading or parsing the subscription file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be opened.
    #[error("could not read subscription file {path}: {source}")]
    Io {
        /// The path that was attempted.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file contained no usable subscription records.
    #[error("subscription file {path} has no subscriptions")]
    Empty {
        /// The path that was parsed.
        path: String,
    },

    /// One line did not match `exchange,instrument,code`.
    #[error("malformed subscription on line {line}: {text:?}")]
    MalformedLine {
        /// 1-indexed line number.
        line: usize,
        /// The offending line's text.
        text: String,
    },
}

/// Parse a subscription file: one `exchange_name,instmt_name,instmt_code`
/// record per line. Lines that are blank or start with `#` are ignored.
pub fn load_subscriptions(path: impl AsRef<Path>) -> Result<Vec<Subscription>, ConfigError> {
    let path_ref = path.as_ref();
    let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
        path: path_ref.display().to_string(),
        source,
    })?;

    let subscriptions = parse_subscriptions(&text)?;
    if subscriptions.is_empty() {
        return Err(ConfigError::Empty {
            path: path_ref.display().to_string(),
        });
    }
    Ok(subscriptions)
}

fn parse_subscriptions(text: &str) -> Result<Vec<Subscription>, ConfigError> {
    let mut subscriptions = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [exchange, instrument_name, instrument_code] = fields.as_slice() else {
            return Err(ConfigError::MalformedLine {
                line: idx + 1,
                text: raw_line.to_string(),
            });
        };
        subscriptions.push(Subscription {
            exchange: exchange.to_lowercase(),
            instrument_name: instrument_name.to_string(),
            instrument_code: instrument_code.to_string(),
        });
    }
    Ok(subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_blank_lines() {
        let text = "\
            # subscriptions\n\
            \n\
            gdax, Bitcoin, BTC-USD\n\
            bitfinex,Ethereum,ETH-USD\n\
        ";
        let subs = parse_subscriptions(text).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].exchange, "gdax");
        assert_eq!(subs[0].instrument_code, "BTC-USD");
        assert_eq!(subs[1].exchange, "bitfinex");
    }

    #[test]
    fn rejects_malformed_line() {
        let text = "gdax,Bitcoin\n";
        assert!(matches!(
            parse_subscriptions(text),
            Err(ConfigError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("l3book-empty-{}", std::process::id()));
        std::fs::write(&dir, "# nothing but comments\n").unwrap();
        let result = load_subscriptions(&dir);
        let _ = std::fs::remove_file(&dir);
        assert!(matches!(result, Err(ConfigError::Empty { .. })));
    }
}
