//! Request, response and credential types

pub mod auth;
pub mod request;
pub mod response;

pub use auth::{PersistedSession, RefreshedTokens, TokenPair};
pub use request::{
    HttpMethod, RequestBody, RequestDescriptor, RequestFingerprint, RequestOptions, UploadPart,
};
pub use response::{ApiResult, Envelope, EnvelopeStatus};
