pub mod config;
pub mod design;
pub mod error;
pub mod parser;
pub mod ports;
pub mod request;

pub use config::LeewayConfig;
pub use design::{
    DesignRequest, DesignResponse, DesignStyle, DesignSuggestion, ImageHandle, Priority,
    RoomType, SuggestionCategory,
};
pub use error::{DesignError, ErrorKind, Result};
pub use parser::{ParseOutcome, ResponseParser};
pub use ports::{AnalysisBackend, CaptureGateway, CapturePermissions, ImageSource};
pub use request::{AnalysisInput, RequestBuilder};
