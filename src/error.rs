use thiserror::Error;

pub type DepgResult<T> = Result<T, DepgError>;

#[derive(Error, Debug)]
pub enum DepgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Workbook archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dropdown cache error: {0}")]
    Cache(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Invalid cell address: {0}")]
    Address(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Result '{field}' ({address}) evaluated to {marker}")]
    Evaluation {
        field: String,
        address: String,
        marker: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),
}

impl DepgError {
    /// Errors caused by the request rather than by the deployment
    pub fn is_client_error(&self) -> bool {
        matches!(self, DepgError::Evaluation { .. } | DepgError::Address(_))
    }
}
