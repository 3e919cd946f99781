//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori di ottimizzazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare ogni fallimento per-asset
//! - Fornisce messaggi brevi, adatti sia al log che alla risposta JSON
//! - Mantiene gli errori `Clone + PartialEq` così possono vivere dentro
//!   `OptimizationResult` senza perdere informazioni
//!
//! ## Categorie di errori:
//! - `UnsupportedExtension`: estensione fuori da png/jpg/jpeg/gif
//! - `NoEngineSelected`: nessun engine configurato per la modalità
//! - `AssetTooLarge`: file oltre il limite del servizio remoto
//! - `TransportFailure`: timeout o errore di connessione HTTP
//! - `EmptyResponse`: risposta remota vuota o non parsabile
//! - `RemoteApiError`: errore riportato dal servizio (codice + messaggio)
//! - `DownloadFailed`: download del risultato fallito, file originale intatto
//! - `NoOptimizerAvailable`: nessun tool locale trovato per l'estensione
//! - `OptimizerExecutionFailed`: tool locale uscito con errore o in timeout
//! - `AssetNotFound` / `ZeroSize` / `Io`: errori di lookup lato host
//!
//! ## Esempio:
//! ```rust
//! use asset_smusher::OptimizeError;
//!
//! let err = OptimizeError::remote_api(403);
//! assert_eq!(err.api_code(), Some(403));
//! ```

/// Known error codes of the remote compression API.
const API_ERROR_CODES: &[(i64, &str)] = &[
    (400, "no url of image provided"),
    (401, "impossible to fetch the image from URL (usually a local URL)"),
    (402, "impossible to fetch the image from $_FILES (usually a local URL)"),
    (403, "forbidden file format provided. Works strictly with jpg, png, gif, tif and bmp files."),
    (404, "request timeout from remote service"),
    (501, "internal error, cannot create a local copy"),
    (502, "image provided too large (must be below 5MB)"),
    (503, "internal error, could not reach remote servers for image optimization"),
    (504, "internal error, could not fetch image from remote servers"),
];

/// Per-asset optimization failures
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    #[error("unsupported extension: {0}")]
    UnsupportedExtension(String),

    #[error("no engine selected ({0})")]
    NoEngineSelected(String),

    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    AssetTooLarge { size: u64, limit: u64 },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("returned data is empty")]
    EmptyResponse,

    #[error("{message}")]
    RemoteApiError { code: i64, message: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("no optimizer available for .{0}")]
    NoOptimizerAvailable(String),

    #[error("{tool} failed: {detail}")]
    OptimizerExecutionFailed { tool: String, detail: String },

    #[error("image not found: {0}")]
    AssetNotFound(String),

    #[error("zero file size: {0}")]
    ZeroSize(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl OptimizeError {
    /// Builds a `RemoteApiError` from the raw code, resolving the message from the known table
    pub fn remote_api(code: i64) -> Self {
        let message = API_ERROR_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, message)| message.to_string())
            .unwrap_or_else(|| code.to_string());

        Self::RemoteApiError { code, message }
    }

    /// API error code, only set for errors reported by the remote service
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::RemoteApiError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OptimizeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
