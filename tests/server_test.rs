//! Integration tests for the compute HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use synheart_sleep_metrics::server::{run, ServerConfig};
    use synheart_sleep_metrics::store::RawSampleRow;
    use synheart_sleep_metrics::{MemoryStore, PipelineConfig};

    fn store_with_session(session_id: i64, minutes: i64) -> MemoryStore {
        let start = Utc.with_ymd_and_hms(2024, 1, 22, 1, 0, 0).unwrap();
        MemoryStore::with_samples(
            (0..minutes)
                .map(|m| RawSampleRow {
                    sleep_record_id: session_id,
                    sensor_type: "accelerometer".to_string(),
                    value: json!({"movement_detected": false, "movement_delta": 0.0}),
                    captured_at: (start + ChronoDuration::minutes(m)).to_rfc3339(),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        // Create server config with random port
        let config = ServerConfig::new(0, PipelineConfig::default());

        // Start server
        let (addr, shutdown_tx) = run(config, MemoryStore::new())
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        // Shutdown server
        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_compute_endpoint() {
        let config = ServerConfig::new(0, PipelineConfig::default());
        let (addr, shutdown_tx) = run(config, store_with_session(17, 12))
            .await
            .expect("Failed to start server");

        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/compute", addr))
            .json(&json!({"session_id": 17}))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["session_id"], 17);
        assert_eq!(body["is_valid"], true);
        assert!(body["run_id"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_compute_unknown_session_is_invalid_not_error() {
        let config = ServerConfig::new(0, PipelineConfig::default());
        let (addr, shutdown_tx) = run(config, MemoryStore::new())
            .await
            .expect("Failed to start server");

        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/compute", addr))
            .json(&json!({"session_id": 404}))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["is_valid"], false);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_compute_rejects_bad_body() {
        let config = ServerConfig::new(0, PipelineConfig::default());
        let (addr, shutdown_tx) = run(config, MemoryStore::new())
            .await
            .expect("Failed to start server");

        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/compute", addr))
            .json(&json!({"session_id": "seventeen"}))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_client_error());

        let _ = shutdown_tx.send(());
    }
}
