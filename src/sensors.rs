use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no temperature value in {path}")]
    MissingValue { path: String },

    #[error("malformed temperature value {raw:?} in {path}")]
    Malformed { path: String, raw: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Current reading in degrees Celsius.
    async fn read_temperature(&self) -> Result<f64, SensorError>;

    fn sensor_name(&self) -> Option<String> {
        None
    }
}
