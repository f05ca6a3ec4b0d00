//! Seeded generator for taxi-trip shaped rows
//!
//! Rows use the source column names of the public trip record files, so they
//! go through the same [`SchemaMapping`](crate::schema::SchemaMapping) a real
//! export would.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::schema::RawRow;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Deterministic row generator
pub struct TripGenerator {
    rng: StdRng,
    null_share: f64,
    base: NaiveDateTime,
    next_offset_secs: i64,
}

impl TripGenerator {
    pub fn new(seed: u64) -> Self {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();

        Self {
            rng: StdRng::seed_from_u64(seed),
            null_share: 0.0,
            base,
            next_offset_secs: 0,
        }
    }

    /// Share of optional columns written as null, clamped to `0.0..=1.0`
    pub fn with_null_share(mut self, share: f64) -> Self {
        self.null_share = if share.is_finite() { share.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    pub fn rows(&mut self, count: usize) -> Vec<RawRow> {
        (0..count).map(|_| self.row()).collect()
    }

    pub fn row(&mut self) -> RawRow {
        // Pickups are strictly increasing so primary keys never collide
        self.next_offset_secs += self.rng.gen_range(1..=30);
        let pickup = self.base + ChronoDuration::seconds(self.next_offset_secs);
        let dropoff = pickup + ChronoDuration::seconds(self.rng.gen_range(60..=3_600));

        let distance: f64 = self.rng.gen_range(0.3..25.0);
        let fare = round2(3.0 + distance * 2.5);
        let extra = [0.0, 0.5, 1.0, 2.5][self.rng.gen_range(0..4)];
        let tip = round2(fare * self.rng.gen_range(0.0..0.3));
        let tolls = if self.rng.gen_bool(0.1) { 6.94 } else { 0.0 };
        let congestion = 2.5;
        let airport = if self.rng.gen_bool(0.08) { 1.75 } else { 0.0 };
        let total = round2(fare + extra + 0.5 + tip + tolls + 1.0 + congestion + airport);

        let passengers = self.rng.gen_range(1..=6);
        let rate_code = self.rng.gen_range(1..=6);
        let flag = if self.rng.gen_bool(0.02) { "Y" } else { "N" };

        let mut row = json!({
            "VendorID": self.rng.gen_range(1..=2),
            "tpep_pickup_datetime": pickup.format(TIMESTAMP_FORMAT).to_string(),
            "tpep_dropoff_datetime": dropoff.format(TIMESTAMP_FORMAT).to_string(),
            "passenger_count": self.optional(json!(passengers)),
            "trip_distance": round2(distance),
            "RatecodeID": self.optional(json!(rate_code)),
            "store_and_fwd_flag": self.optional(json!(flag)),
            "payment_type": self.rng.gen_range(1..=4),
            "fare_amount": fare,
            "extra": extra,
            "mta_tax": 0.5,
            "tip_amount": tip,
            "tolls_amount": tolls,
            "improvement_surcharge": 1.0,
            "total_amount": total,
            "congestion_surcharge": self.optional(json!(congestion)),
            "Airport_fee": self.optional(json!(airport)),
        });

        match row.as_object_mut() {
            Some(map) => std::mem::take(map),
            None => RawRow::new(),
        }
    }

    fn optional(&mut self, value: Value) -> Value {
        if self.null_share > 0.0 && self.rng.gen_bool(self.null_share) {
            Value::Null
        } else {
            value
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
