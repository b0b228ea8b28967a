//! Tests for the inference client
//!
//! Response decoding is tested directly; the HTTP paths run against a local
//! axum stub standing in for the model backend.

use super::*;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(endpoint: String, max_retries: u32) -> InferenceClient {
    InferenceClient::new(InferenceClientConfig {
        endpoint,
        timeout_ms: 2000,
        max_retries,
    })
    .unwrap()
}

#[cfg(test)]
mod decode_tests {
    use super::*;

    #[test]
    fn test_full_predict_response() {
        let body = json!({
            "top_class": "7",
            "probabilities": [
                {"label": "1", "score": 0.05},
                {"label": "7", "score": 0.91}
            ],
            "feature_maps": {
                "0": {"maps": ["data:image/png;base64,AAAA"], "total": 16}
            }
        })
        .to_string();

        let response: PredictResponse = decode_response(&body).unwrap();
        assert_eq!(response.top_class, "7");
        assert_eq!(response.best().unwrap().label, "7");
        assert_eq!(response.layer("0").unwrap().total, 16);
        assert!(response.layer("3").is_none());
    }

    #[test]
    fn test_placeholder_predict_response() {
        let body = r#"{"message": "Prediction for patchflow not implemented yet."}"#;
        let response: PredictResponse = decode_response(body).unwrap();
        assert!(response.top_class.is_empty());
        assert!(response.probabilities.is_empty());
        assert!(response.feature_maps.is_none());
        assert!(response.best().is_none());
        assert!(response.message.unwrap().contains("patchflow"));
    }

    #[test]
    fn test_partial_gradcam_response() {
        let body = r#"{"heatmap_data": [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]], "layer_name": "conv2"}"#;
        let response: GradCamResponse = decode_response(body).unwrap();
        assert!(response.heatmap.is_none());
        assert_eq!(response.layer_name, "conv2");
        assert_eq!(response.class_label, "");
        assert_eq!(response.heatmap_shape(), Some((3, 2)));

        let ragged = GradCamResponse {
            heatmap_data: Some(vec![vec![0.0; 2], vec![0.0; 3]]),
            ..Default::default()
        };
        assert_eq!(ragged.heatmap_shape(), None);
    }

    #[test]
    fn test_mnist_predict_with_bare_map_lists() {
        let body = json!({
            "probabilities": [{"label": "0", "score": 0.01}, {"label": "1", "score": 0.99}],
            "top_class": "1",
            "feature_maps": {
                "0": ["data:image/png;base64,AA", "data:image/png;base64,AB"],
                "1": ["data:image/png;base64,AC"]
            }
        })
        .to_string();

        let response: PredictResponse = decode_response(&body).unwrap();
        assert_eq!(response.top_class, "1");
        assert_eq!(response.best().unwrap().label, "1");
        let layer = response.layer("0").unwrap();
        assert_eq!(layer.maps.len(), 2);
        assert_eq!(layer.total, 2);
        assert_eq!(response.layer("1").unwrap().total, 1);
    }

    #[test]
    fn test_cnn_features_with_url_list() {
        let body = json!({
            "layer_id": "conv2",
            "feature_maps": [
                "/api/images/mock_feature_0.png",
                "/api/images/mock_feature_1.png",
                "/api/images/mock_feature_2.png",
                "/api/images/mock_feature_3.png"
            ],
            "activation_mean": 0.42
        })
        .to_string();

        let response: FeaturesResponse = decode_response(&body).unwrap();
        assert_eq!(response.layer_id.as_deref(), Some("conv2"));
        assert_eq!(response.activation_mean, Some(0.42));
        let maps = response.feature_maps.unwrap();
        assert_eq!(maps["conv2"].total, 4);

        // Without an echoed layer id the list lands under the default key
        let body = r#"{"layer_id": null, "feature_maps": ["/api/images/a.png"]}"#;
        let response: FeaturesResponse = decode_response(body).unwrap();
        assert_eq!(response.feature_maps.unwrap()[UNKEYED_LAYER].maps.len(), 1);
    }

    #[test]
    fn test_unkeyed_map_set_and_unrecognized_layers() {
        let body = r#"{"layer_id": "conv_3", "feature_maps": {"maps": ["a", "b", "c"], "total": 256}}"#;
        let response: FeaturesResponse = decode_response(body).unwrap();
        let maps = response.feature_maps.unwrap();
        assert_eq!(maps["conv_3"].total, 256);
        assert_eq!(maps["conv_3"].maps.len(), 3);

        // Layers that are neither lists nor map sets are dropped, not fatal
        let body = r#"{"top_class": "cat", "feature_maps": {"conv_1": {"maps": ["a"], "total": 64}, "raw": 3.5}}"#;
        let response: PredictResponse = decode_response(body).unwrap();
        assert_eq!(response.top_class, "cat");
        let maps = response.feature_maps.unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps["conv_1"].total, 64);

        let body = r#"{"top_class": "cat", "feature_maps": "pending"}"#;
        let response: PredictResponse = decode_response(body).unwrap();
        assert!(response.feature_maps.is_none());
    }

    #[test]
    fn test_partial_probabilities() {
        let body = r#"{"probabilities": [{"label": "Giant Panda"}, {"score": 0.3}], "top_class": "Giant Panda"}"#;
        let response: PredictResponse = decode_response(body).unwrap();
        assert_eq!(response.probabilities[0].score, 0.0);
        assert_eq!(response.probabilities[1].label, "");
        assert_eq!(response.best().unwrap().score, 0.3);
    }

    #[test]
    fn test_mock_gradcam_and_adversarial_payloads() {
        let gradcam: GradCamResponse =
            decode_response(r#"{"heatmap_url": "/api/images/mock_gradcam.png"}"#).unwrap();
        assert_eq!(gradcam.heatmap_url.as_deref(), Some("/api/images/mock_gradcam.png"));
        assert!(gradcam.heatmap.is_none());

        let adversarial: AdversarialResponse = decode_response(
            r#"{"original_class": "Giant Panda", "adversarial_class": "Gibbon", "confidence": 0.98, "epsilon": 0.05}"#,
        )
        .unwrap();
        assert!(adversarial.flipped());
        assert_eq!(adversarial.epsilon, Some(0.05));

        let placeholder: AdversarialResponse =
            decode_response(r#"{"message": "Adversarial generation not yet implemented"}"#).unwrap();
        assert!(!placeholder.flipped());
        assert!(placeholder.original_class.is_none());
    }

    #[test]
    fn test_error_payload_is_service_error() {
        let result: InferenceResult<PredictResponse> =
            decode_response(r#"{"error": "No pixels provided"}"#);
        match result {
            Err(InferenceError::ServiceError { message }) => {
                assert_eq!(message, "No pixels provided")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // A null error field is not an error
        let ok: TrainResponse = decode_response(r#"{"error": null, "loss": 0.5}"#).unwrap();
        assert_eq!(ok.loss, Some(0.5));
    }

    #[test]
    fn test_malformed_body_is_serialization_error() {
        let result: InferenceResult<TrainResponse> = decode_response("not json");
        assert!(matches!(
            result,
            Err(InferenceError::SerializationError { .. })
        ));
    }

    #[test]
    fn test_request_serialization() {
        let predict = serde_json::to_value(PredictRequest::from_pixels(vec![0.0, 1.0])).unwrap();
        assert_eq!(predict, json!({"pixels": [0.0, 1.0]}));

        let predict = serde_json::to_value(PredictRequest::from_image("data:image/png;base64,")).unwrap();
        assert_eq!(predict, json!({"image": "data:image/png;base64,"}));

        let gradcam = serde_json::to_value(GradCamRequest {
            image: "img".into(),
            layer_index: 2,
            class_idx: None,
        })
        .unwrap();
        assert_eq!(gradcam, json!({"image": "img", "layer_index": 2, "class_idx": null}));

        assert_eq!(serde_json::to_value(TrainRequest::default()).unwrap(), json!({}));
        assert_eq!(
            serde_json::to_value(AdversarialRequest::default()).unwrap(),
            json!({"epsilon": 0.01})
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(InferenceError::NetworkError { reason: "x".into() }.is_retryable());
        assert!(InferenceError::Timeout { timeout_ms: 1 }.is_retryable());
        assert!(InferenceError::RateLimitExceeded { retry_after_secs: 1 }.is_retryable());
        assert!(!InferenceError::ServiceError { message: "x".into() }.is_retryable());
        assert!(!InferenceError::HttpStatus { status: 500, message: "x".into() }.is_retryable());
    }
}

#[cfg(test)]
mod url_tests {
    use super::*;

    #[test]
    fn test_action_url() {
        let client = client_for("http://localhost:8000".into(), 0);
        let url = client.action_url("mnist", ModelAction::Predict).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/models/mnist/predict/");

        let client = client_for("http://models.internal/backend/".into(), 0);
        let url = client.action_url("vgg16", ModelAction::Gradcam).unwrap();
        assert_eq!(url.as_str(), "http://models.internal/backend/api/models/vgg16/gradcam/");

        let url = client.action_url("vgg16", ModelAction::Adversarial).unwrap();
        assert_eq!(url.path(), "/backend/api/models/vgg16/adversarial/");
    }

    #[test]
    fn test_action_url_encodes_model_name() {
        let client = client_for("http://localhost:8000".into(), 0);
        let url = client.action_url("a/b", ModelAction::Train).unwrap();
        assert_eq!(url.path(), "/api/models/a%2Fb/train/");

        assert!(client.action_url("", ModelAction::Train).is_err());
        assert!(client.action_url("..", ModelAction::Train).is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = InferenceClient::new(InferenceClientConfig {
            endpoint: "not a url".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(InferenceError::InvalidEndpoint { .. })));

        let result = InferenceClient::new(InferenceClientConfig {
            endpoint: "mailto:ops@example.com".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(InferenceError::InvalidEndpoint { .. })));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;

    #[tokio::test]
    async fn test_predict_round_trip() {
        let router = Router::new().route(
            "/api/models/mnist/predict/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["pixels"].as_array().map(|p| p.len()), Some(784));
                Json(json!({
                    "top_class": "3",
                    "probabilities": [{"label": "3", "score": 0.8}],
                    "feature_maps": {"1": {"maps": [], "total": 16}}
                }))
            }),
        );
        let client = client_for(spawn_stub(router).await, 0);

        let response = client
            .predict("mnist", &PredictRequest::from_pixels(vec![0.0; 784]))
            .await
            .unwrap();
        assert_eq!(response.top_class, "3");
        assert_eq!(response.layer("1").unwrap().total, 16);
    }

    #[tokio::test]
    async fn test_gradcam_and_train() {
        let router = Router::new()
            .route(
                "/api/models/mnist/gradcam/",
                post(|Json(body): Json<Value>| async move {
                    assert!(body["class_idx"].is_null());
                    Json(json!({"heatmap": "data:image/png;base64,", "layer_name": "conv1", "class_label": "3"}))
                }),
            )
            .route(
                "/api/models/mnist/train/",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body, json!({}));
                    Json(json!({"status": "success", "loss": 0.123}))
                }),
            );
        let client = client_for(spawn_stub(router).await, 0);

        let gradcam = client
            .gradcam(
                "mnist",
                &GradCamRequest {
                    image: "data:image/png;base64,".into(),
                    layer_index: 0,
                    class_idx: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(gradcam.layer_name, "conv1");
        assert!(gradcam.heatmap_data.is_none());

        let train = client.train("mnist").await.unwrap();
        assert_eq!(train.loss, Some(0.123));
        assert_eq!(train.status.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn test_features_passes_layer_id() {
        let router = Router::new().route(
            "/api/models/voxelstack/features/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let layer = params.get("layer_id").cloned().unwrap_or_default();
                let mut maps = serde_json::Map::new();
                maps.insert(layer, json!({"maps": ["a", "b"], "total": 64}));
                Json(json!({ "feature_maps": maps }))
            }),
        );
        let client = client_for(spawn_stub(router).await, 0);

        let response = client.features("voxelstack", Some("conv3")).await.unwrap();
        let maps = response.feature_maps.unwrap();
        assert_eq!(maps["conv3"].maps.len(), 2);
    }

    #[tokio::test]
    async fn test_adversarial_sends_epsilon() {
        let router = Router::new().route(
            "/api/models/cnn/adversarial/",
            post(|Json(body): Json<Value>| async move {
                let epsilon = body["epsilon"].as_f64().unwrap_or_default();
                Json(json!({
                    "original_class": "Giant Panda",
                    "adversarial_class": "Gibbon",
                    "confidence": 0.98,
                    "epsilon": epsilon
                }))
            }),
        );
        let client = client_for(spawn_stub(router).await, 0);

        let response = client
            .adversarial("cnn", &AdversarialRequest { epsilon: 0.25 })
            .await
            .unwrap();
        assert_eq!(response.epsilon, Some(0.25));
        assert_eq!(response.adversarial_class.as_deref(), Some("Gibbon"));
        assert!(response.flipped());
    }

    #[tokio::test]
    async fn test_service_error_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/models/mnist/predict/",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"error": "No pixels provided"}))
                }
            }),
        );
        let client = client_for(spawn_stub(router).await, 3);

        let err = client
            .predict("mnist", &PredictRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::ServiceError { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_model_is_http_status() {
        let router = Router::new().route(
            "/api/models/:model/:action/",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": "Model 'nope' not found."})),
                )
            }),
        );
        let client = client_for(spawn_stub(router).await, 3);

        match client.train("nope").await {
            Err(InferenceError::HttpStatus { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Model 'nope' not found.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/models/mnist/train/",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        let mut headers = HeaderMap::new();
                        headers.insert("Retry-After", "0".parse().unwrap());
                        (StatusCode::TOO_MANY_REQUESTS, headers, Json(json!({})))
                    } else {
                        (StatusCode::OK, HeaderMap::new(), Json(json!({"loss": 0.5})))
                    }
                }
            }),
        );
        let client = client_for(spawn_stub(router).await, 2);

        let response = client.train("mnist").await.unwrap();
        assert_eq!(response.loss, Some(0.5));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_exhausts_retries() {
        // Bind and drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr), 1);
        let err = client.train("mnist").await.unwrap_err();
        assert!(matches!(err, InferenceError::NetworkError { .. }), "{:?}", err);
    }
}
