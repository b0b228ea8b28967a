//! Client for the external inference service
//!
//! The view layer asks a separate model backend for predictions, per-layer
//! feature maps, adversarial examples, Grad-CAM heatmaps and training steps.
//! This module provides:
//! - Typed request/response shapes, tolerant of missing fields
//! - An HTTP client with timeout and exponential-backoff retries
//! - Surfacing of `{"error": ...}` payloads as typed errors

mod client;
mod error;
mod types;

#[cfg(test)]
mod tests;

pub use client::{decode_response, InferenceClient, InferenceClientConfig};
pub use error::{InferenceError, InferenceResult};
pub use types::{
    AdversarialRequest, AdversarialResponse, ClassProbability, FeatureMapSet, FeatureMaps,
    FeaturesResponse, GradCamRequest, GradCamResponse, ModelAction, PredictRequest,
    PredictResponse, TrainRequest, TrainResponse, UNKEYED_LAYER,
};
