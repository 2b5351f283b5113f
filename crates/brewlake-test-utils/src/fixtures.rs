//! Pre-built brewery fixtures for common test scenarios.

use brewlake_core::layer_paths::LayerLayout;
use brewlake_core::storage::StorageBackend;
use bytes::Bytes;
use serde_json::{Map, Value, json};

/// A raw record as returned by the brewery source API.
pub type RawBrewery = Map<String, Value>;

/// Builds a raw brewery record with the source API's field set.
///
/// Unused address lines and coordinates are null, as the API returns them.
#[must_use]
pub fn brewery(name: &str, brewery_type: &str, city: &str, state: &str) -> RawBrewery {
    let value = json!({
        "id": format!("{}-{}", name.to_lowercase().replace(' ', "-"), state.to_lowercase()),
        "name": name,
        "brewery_type": brewery_type,
        "address_1": "1 Main St",
        "address_2": null,
        "address_3": null,
        "city": city,
        "state_province": state,
        "postal_code": "00000",
        "country": "United States",
        "longitude": null,
        "latitude": null,
        "phone": null,
        "website_url": null,
        "state": state,
        "street": "1 Main St",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!("json! object literal"),
    }
}

/// A first page: four breweries across three states.
#[must_use]
pub fn first_page() -> Vec<RawBrewery> {
    vec![
        brewery("(405) Brewing Co", "micro", "Norman", "Oklahoma"),
        brewery("Bay Area Ales", "brewpub", "Oakland", "California"),
        brewery("Golden Gate Brewing", "micro", "San Francisco", "California"),
        brewery("Empire State Lager", "large", "Albany", "New York"),
    ]
}

/// A second page sharing some (type, state) pairs with [`first_page`].
#[must_use]
pub fn second_page() -> Vec<RawBrewery> {
    vec![
        brewery("Sunset Micro", "micro", "Los Angeles", "California"),
        brewery("Tulsa Taps", "brewpub", "Tulsa", "Oklahoma"),
    ]
}

/// Writes `records` as a raw-layer file and returns its key.
pub async fn seed_raw(
    storage: &dyn StorageBackend,
    layout: &LayerLayout,
    file_name: &str,
    records: &[RawBrewery],
) -> String {
    let key = layout.raw_file(file_name);
    storage
        .put(&key, json_bytes(records))
        .await
        .expect("seed raw file");
    key
}

/// Writes a cleaned-layer file verbatim and returns its key.
pub async fn seed_cleaned(
    storage: &dyn StorageBackend,
    layout: &LayerLayout,
    file_name: &str,
    records: &Value,
) -> String {
    let key = layout.cleaned_file(file_name);
    storage
        .put(&key, Bytes::from(records.to_string()))
        .await
        .expect("seed cleaned file");
    key
}

/// Serializes records as a JSON array.
#[must_use]
pub fn json_bytes(records: &[RawBrewery]) -> Bytes {
    Bytes::from(serde_json::to_vec(records).expect("serialize records"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brewery_has_api_shape() {
        let record = brewery("(405) Brewing Co", "micro", "Norman", "Oklahoma");
        assert_eq!(record["state"], json!("Oklahoma"));
        assert_eq!(record["phone"], Value::Null);
        assert_eq!(record["id"], json!("(405)-brewing-co-oklahoma"));
    }

    #[tokio::test]
    async fn seed_raw_writes_under_raw_root() {
        let storage = brewlake_core::MemoryBackend::new();
        let layout = LayerLayout::default();
        let key = seed_raw(&storage, &layout, "page_1.json", &first_page()).await;
        assert_eq!(key, "bronze_layer/raw/page_1.json");
        assert_eq!(storage.keys(), vec![key]);
    }
}
