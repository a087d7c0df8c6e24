use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::Record;

/// The six well-known record collections, one JSON file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Products,
    Categories,
    Orders,
    FirmwareRequests,
    RepairRequests,
    BlogPosts,
}

impl Collection {
    /// Every collection, in backup/restore order.
    pub const ALL: [Collection; 6] = [
        Collection::Products,
        Collection::Categories,
        Collection::Orders,
        Collection::FirmwareRequests,
        Collection::RepairRequests,
        Collection::BlogPosts,
    ];

    /// Collections whose presence means "live data exists" at startup.
    pub const PRIMARY: [Collection; 3] = [Collection::Products, Collection::Categories, Collection::Orders];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Categories => "categories",
            Collection::Orders => "orders",
            Collection::FirmwareRequests => "firmware-requests",
            Collection::RepairRequests => "repair-requests",
            Collection::BlogPosts => "blog-posts",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// Look a collection up by its file name (`orders.json`).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let name = file_name.strip_suffix(".json")?;
        name.parse().ok()
    }

    /// Initial contents written when neither live data nor a snapshot exists.
    pub fn seed_records(self) -> Vec<Record> {
        match self {
            Collection::Orders => vec![sample_order()],
            _ => Vec::new(),
        }
    }
}

fn sample_order() -> Record {
    let value = json!({
        "id": "1",
        "customerName": "Sample Customer",
        "email": "customer@example.com",
        "phone": "+10000000000",
        "items": [
            {
                "productId": "1",
                "name": "Sample Part",
                "quantity": 1,
                "price": 0
            }
        ],
        "total": 0,
        "status": "pending",
        "createdAt": "1970-01-01T00:00:00.000Z"
    });

    match value {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}
