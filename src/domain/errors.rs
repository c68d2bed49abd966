use thiserror::Error;

/// Errors related to exchange market data
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Exchange API error {code} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("No candles returned for {symbol}")]
    EmptyCandles { symbol: String },

    #[error("Invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("No ticker found for {symbol}")]
    UnknownSymbol { symbol: String },
}

/// Errors raised while turning candles into model inputs
#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Insufficient history: need at least {required} candles, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Feature width mismatch: model expects {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("Feature columns differ: model was trained on {expected:?}, pipeline produces {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Invalid indicator parameter: {0}")]
    InvalidParameter(String),
}

/// Errors related to loading and evaluating the classifier
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {0}")]
    Parse(String),

    #[error("Unsupported model objective: {0}")]
    UnsupportedObjective(String),

    #[error("Feature width mismatch: model expects {expected} features, got {actual}")]
    FeatureWidthMismatch { expected: usize, actual: usize },
}

/// Errors returned by the chat delivery channel
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Chat API rejected {method}: {description}")]
    Rejected { method: String, description: String },

    #[error("Chat API request failed: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_error_formatting() {
        let err = MarketDataError::Api {
            endpoint: "/v5/market/kline".to_string(),
            code: 10001,
            message: "params error".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("10001"));
        assert!(msg.contains("/v5/market/kline"));
        assert!(msg.contains("params error"));
    }

    #[test]
    fn test_width_mismatch_formatting() {
        let err = ModelError::FeatureWidthMismatch {
            expected: 10,
            actual: 6,
        };

        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("6"));
    }
}
