use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;

use crate::flag_definitions::{LogEntry, PlatformData, SegmentCatalog};
use crate::store::MockStoreClient;

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// The catalog the sample platform's combos are drawn from.
pub fn sample_catalog() -> SegmentCatalog {
    serde_json::from_value(json!({
        "country": {
            "description": "Country of the caller",
            "values": ["US", "CA", "DE", "FR"]
        },
        "platform": {
            "description": "Client platform",
            "values": ["ios", "android", "desktop"]
        }
    }))
    .expect("sample catalog should deserialize")
}

/// A platform document with one group of each flag type, overrides on the
/// boolean flag, and a 50% rollout on the number flag.
pub fn sample_platform_data() -> PlatformData {
    serde_json::from_value(json!({
        "groups": [
            {
                "id": "ui",
                "description": "UI flags",
                "features": [
                    {
                        "id": "dark-mode",
                        "description": "Dark mode toggle",
                        "type": "boolean",
                        "value": false,
                        "rollout": null,
                        "segments": [
                            {
                                "combo": {"country": ["US", "CA"]},
                                "value": true,
                                "rollout": null
                            },
                            {
                                "combo": {"platform": ["!desktop"]},
                                "value": true,
                                "rollout": {"percentage": 25, "secondaryValue": false}
                            }
                        ]
                    },
                    {
                        "id": "greeting",
                        "description": "Greeting text",
                        "type": "string",
                        "value": "hello",
                        "rollout": null,
                        "segments": []
                    }
                ]
            },
            {
                "id": "checkout",
                "description": "Checkout flags",
                "features": [
                    {
                        "id": "free-shipping-threshold",
                        "description": "Free shipping threshold",
                        "type": "number",
                        "value": 100,
                        "rollout": {"percentage": 50, "secondaryValue": 80},
                        "segments": []
                    }
                ]
            }
        ]
    }))
    .expect("sample platform document should deserialize")
}

pub fn sample_logs() -> Vec<LogEntry> {
    serde_json::from_value(json!([
        {
            "user": "alice",
            "action": "change-feature-value",
            "timestamp": "2024-05-04T10:00:00Z",
            "value": true,
            "rollout": null
        },
        {
            "user": "bob",
            "action": "delete-segment-for-feature",
            "timestamp": "2024-05-04T11:30:00Z",
            "segment": {"country": ["US"]}
        }
    ]))
    .expect("sample logs should deserialize")
}

/// A mock store seeded with the sample platform under the name `web`.
pub fn setup_mock_store() -> MockStoreClient {
    MockStoreClient::new()
        .with_platform("web", sample_platform_data())
        .with_catalog(sample_catalog())
        .with_logs("web", "ui", Some("dark-mode"), sample_logs())
}
