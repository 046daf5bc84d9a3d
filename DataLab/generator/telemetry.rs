use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};

/// Telemetry builder for the generator.
pub struct GeneratorTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl GeneratorTelemetryBuilder {
    /// Creates a new builder scoped to a module label.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            sinks: Vec::new(),
        }
    }

    /// Appends JSON lines to `path`.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Adds another sink (for example an in-memory logger owned by the host).
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Builds telemetry, opening the log file if one was requested.
    pub fn build(self) -> Result<GeneratorTelemetry> {
        let mut sinks = self.sinks;
        if let Some(path) = self.log_path {
            sinks.push(Arc::new(JsonLogger::new(path)?));
        }
        Ok(GeneratorTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                sinks,
            }),
        })
    }
}

/// Cloneable logging handle shared by generation runs.
#[derive(Clone)]
pub struct GeneratorTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl fmt::Debug for GeneratorTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorTelemetry")
            .field("module", &self.inner.module)
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}

impl GeneratorTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> GeneratorTelemetryBuilder {
        GeneratorTelemetryBuilder::new(module)
    }

    /// Module label attached to every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Writes one record to every sink; the first failure is returned after
    /// all sinks have been tried.
    pub fn log(&self, level: LogLevel, message: &str, fields: Value) -> Result<()> {
        let record = LogRecord::new(&self.inner.module, level, message).with_fields(fields);
        let mut outcome = Ok(());
        for sink in &self.inner.sinks {
            if let Err(err) = sink.log(&record) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }
}
