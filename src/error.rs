use thiserror::Error;

/// The five error kinds from the fault taxonomy: configuration mistakes and an endpoint that
/// isn't a JSON-validating protobuf API are fatal at startup; transport failures and unsupported
/// response content types are fatal mid-run; parse failures are logged and skipped.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error while probing {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unsupported response content type {content_type:?}; try appending ?alt=json to the URL")]
    UnsupportedContentType { content_type: String },

    #[error("could not parse violation description: {description:?}")]
    Parse { description: String },

    #[error("endpoint at {url} is not a JSON-validating protobuf API (neither probe returned HTTP 400)")]
    InferenceImpossible { url: String },
}

pub type ProbeResult<T> = Result<T, ProbeError>;
