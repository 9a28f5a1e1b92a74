use serde::{Deserialize, Serialize};

use filaforge_inventory::{Allocation, ReservationItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustGramsRequest {
    pub delta: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderPointRequest {
    pub grams: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecordHoursRequest {
    pub hours: f64,
}

#[derive(Debug, Deserialize)]
pub struct MoveJobRequest {
    pub direction: String,
}

#[derive(Debug, Deserialize)]
pub struct JobPositionRequest {
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    #[serde(default)]
    pub items: Vec<ReservationItem>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub order_id: String,
    pub allocations: Vec<Allocation>,
}
