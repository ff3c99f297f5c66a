use thiserror::Error;

/// Failures while pulling rows out of the database.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The statement could not be prepared or executed.
    #[error("query error: {0}")]
    Query(#[source] rusqlite::Error),

    /// A returned value could not be decoded into text.
    #[error("scan error in column '{column}': {source}")]
    Scan {
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The pool could not hand out a connection.
    #[error("connection pool error: {0}")]
    Pool(String),
}

/// Error raised by a user supplied row hook (filter or text replacer).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("filter failed on row {row}: {source}")]
    Filter {
        row: usize,
        #[source]
        source: HookError,
    },

    #[error("text replacer failed on row {row}: {source}")]
    Transform {
        row: usize,
        #[source]
        source: HookError,
    },
}

/// Failures while pushing a message to the notification API.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no delivery token configured")]
    MissingToken,

    #[error("chunk {chunk} could not be sent: {source}")]
    Transport {
        chunk: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("chunk {chunk} rejected (HTTP {status}): {body}")]
    Status {
        chunk: usize,
        status: u16,
        body: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobConfigError {
    #[error("job name is required")]
    MissingName,

    #[error("job '{0}' has no cron expression")]
    MissingCron(String),

    #[error("job '{0}' has no query")]
    MissingQuery(String),

    #[error("job '{job}' has {labels} labels but {columns} columns")]
    LabelColumnMismatch {
        job: String,
        labels: usize,
        columns: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a job named '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{cron}' for job '{job}': {reason}")]
    InvalidCron {
        job: String,
        cron: String,
        reason: String,
    },

    #[error("scheduler error: {0}")]
    Engine(#[from] tokio_cron_scheduler::JobSchedulerError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config is missing '{0}'")]
    Missing(&'static str),

    #[error("unknown built-in job '{0}'")]
    UnknownBuiltin(String),

    #[error(transparent)]
    Job(#[from] JobConfigError),
}
