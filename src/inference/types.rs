//! Request and response shapes of the external inference service
//!
//! Responses are decoded leniently: placeholder models answer with only a
//! `message`, so every response field falls back to a default when absent.
//! Feature maps arrive in several shapes depending on the model backend and are
//! normalized to [`FeatureMaps`].

use std::collections::HashMap;
use std::fmt;

use serde::de::{Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize};

/// Layer key used when a backend sends feature maps without a layer id
pub const UNKEYED_LAYER: &str = "0";

/// Action segment of `/api/models/<model>/<action>/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelAction {
    Predict,
    Features,
    Adversarial,
    Gradcam,
    Train,
}

impl ModelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAction::Predict => "predict",
            ModelAction::Features => "features",
            ModelAction::Adversarial => "adversarial",
            ModelAction::Gradcam => "gradcam",
            ModelAction::Train => "train",
        }
    }
}

impl fmt::Display for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a predict call. Either an image data URL or raw pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<Vec<f32>>,
}

impl PredictRequest {
    pub fn from_image(data_url: impl Into<String>) -> Self {
        Self {
            image: Some(data_url.into()),
            pixels: None,
        }
    }

    pub fn from_pixels(pixels: Vec<f32>) -> Self {
        Self {
            image: None,
            pixels: Some(pixels),
        }
    }
}

/// One class score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

/// Feature-map images for one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMapSet {
    /// Image data URLs, possibly truncated
    #[serde(default)]
    pub maps: Vec<String>,
    /// Channel count of the layer
    #[serde(default)]
    pub total: usize,
}

impl From<Vec<String>> for FeatureMapSet {
    fn from(maps: Vec<String>) -> Self {
        Self {
            total: maps.len(),
            maps,
        }
    }
}

/// Feature maps keyed by layer id
pub type FeatureMaps = HashMap<String, FeatureMapSet>;

/// `feature_maps` as sent on the wire
///
/// Seen shapes: `{layer: {maps, total}}`, `{layer: [url, ...]}`, a bare
/// `{maps, total}` and a bare `[url, ...]`. Anything else decodes to nothing.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureMapsWire {
    Single(UnkeyedMapSet),
    Layers(HashMap<String, LayerMapsWire>),
    Images(Vec<String>),
    Unrecognized(IgnoredAny),
}

#[derive(Deserialize)]
struct UnkeyedMapSet {
    maps: Vec<String>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LayerMapsWire {
    Images(Vec<String>),
    Set(FeatureMapSet),
    Unrecognized(IgnoredAny),
}

impl FeatureMapsWire {
    fn into_layers(self, layer_id: Option<&str>) -> Option<FeatureMaps> {
        let key = layer_id.unwrap_or(UNKEYED_LAYER).to_string();
        match self {
            FeatureMapsWire::Single(set) => {
                let total = set.total.unwrap_or(set.maps.len());
                let set = FeatureMapSet {
                    maps: set.maps,
                    total,
                };
                Some(HashMap::from([(key, set)]))
            }
            FeatureMapsWire::Images(maps) => Some(HashMap::from([(key, maps.into())])),
            FeatureMapsWire::Layers(layers) => Some(
                layers
                    .into_iter()
                    .filter_map(|(id, layer)| match layer {
                        LayerMapsWire::Images(maps) => Some((id, maps.into())),
                        LayerMapsWire::Set(set) => Some((id, set)),
                        LayerMapsWire::Unrecognized(_) => None,
                    })
                    .collect(),
            ),
            FeatureMapsWire::Unrecognized(_) => None,
        }
    }
}

fn deserialize_feature_maps<'de, D>(deserializer: D) -> Result<Option<FeatureMaps>, D::Error>
where
    D: Deserializer<'de>,
{
    let wire = Option::<FeatureMapsWire>::deserialize(deserializer)?;
    Ok(wire.and_then(|w| w.into_layers(None)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub top_class: String,
    #[serde(default)]
    pub probabilities: Vec<ClassProbability>,
    /// Unkeyed maps are stored under [`UNKEYED_LAYER`]
    #[serde(default, deserialize_with = "deserialize_feature_maps")]
    pub feature_maps: Option<FeatureMaps>,
    /// Informational text from placeholder models
    #[serde(default)]
    pub message: Option<String>,
}

impl PredictResponse {
    /// Highest-scoring class, if any probabilities were returned
    pub fn best(&self) -> Option<&ClassProbability> {
        self.probabilities
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Feature maps for one layer
    pub fn layer(&self, layer_id: &str) -> Option<&FeatureMapSet> {
        self.feature_maps.as_ref().and_then(|maps| maps.get(layer_id))
    }
}

/// Unkeyed maps are stored under the echoed `layer_id`, or [`UNKEYED_LAYER`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "FeaturesResponseWire")]
pub struct FeaturesResponse {
    pub layer_id: Option<String>,
    pub feature_maps: Option<FeatureMaps>,
    pub activation_mean: Option<f64>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct FeaturesResponseWire {
    #[serde(default)]
    layer_id: Option<String>,
    #[serde(default)]
    feature_maps: Option<FeatureMapsWire>,
    #[serde(default)]
    activation_mean: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

impl From<FeaturesResponseWire> for FeaturesResponse {
    fn from(wire: FeaturesResponseWire) -> Self {
        let feature_maps = wire
            .feature_maps
            .and_then(|maps| maps.into_layers(wire.layer_id.as_deref()));
        Self {
            layer_id: wire.layer_id,
            feature_maps,
            activation_mean: wire.activation_mean,
            message: wire.message,
        }
    }
}

/// Body of an adversarial call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialRequest {
    /// Perturbation magnitude
    pub epsilon: f64,
}

impl Default for AdversarialRequest {
    fn default() -> Self {
        Self { epsilon: 0.01 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdversarialResponse {
    #[serde(default)]
    pub original_class: Option<String>,
    #[serde(default)]
    pub adversarial_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub epsilon: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AdversarialResponse {
    /// Whether the perturbation changed the predicted class
    pub fn flipped(&self) -> bool {
        match (&self.original_class, &self.adversarial_class) {
            (Some(original), Some(adversarial)) => original != adversarial,
            _ => false,
        }
    }
}

/// Body of a Grad-CAM call. `class_idx` is sent as `null` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradCamRequest {
    pub image: String,
    pub layer_index: u32,
    pub class_idx: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradCamResponse {
    /// Heatmap image data URL
    #[serde(default)]
    pub heatmap: Option<String>,
    /// Heatmap served as a file, by mock backends
    #[serde(default)]
    pub heatmap_url: Option<String>,
    /// Raw heatmap intensities, row-major
    #[serde(default)]
    pub heatmap_data: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub layer_name: String,
    #[serde(default)]
    pub class_label: String,
    #[serde(default)]
    pub class_idx: Option<u32>,
    /// Layers a Grad-CAM can be computed for
    #[serde(default)]
    pub available_layers: Vec<String>,
}

impl GradCamResponse {
    /// (rows, cols) of the raw heatmap, if present and rectangular
    pub fn heatmap_shape(&self) -> Option<(usize, usize)> {
        let data = self.heatmap_data.as_ref()?;
        let cols = data.first().map(|row| row.len()).unwrap_or(0);
        data.iter()
            .all(|row| row.len() == cols)
            .then_some((data.len(), cols))
    }
}

/// Body of a train call (always `{}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    #[serde(default)]
    pub loss: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
