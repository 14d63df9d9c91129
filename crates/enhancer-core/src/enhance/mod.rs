//! Enhancement requests: scale factors, image sources, and the API payloads.

mod scale;
mod source;
mod types;

pub use scale::Scale;
pub use source::{ImageSource, ImageUrl};
pub use types::{
    BatchFailure, BatchResponse, BatchSuccess, EnhanceFileResponse, EnhanceUrlRequest,
    EnhanceUrlResponse, PredictionStatusResponse, SUCCESS_STATUS,
};
