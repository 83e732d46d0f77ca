//! # Serde module for HllSketch
//!
//! Serde support is expressed entirely through the binary codec: a sketch
//! serializes as its wire bytes and deserializes through the validating
//! decoder. Keeping serde on top of the storage format means the two can never
//! drift apart, and any serde-transported sketch remains readable by the
//! storage layer and the legacy view.

use serde::de::Error;
use serde::{Deserialize, Serialize};

use crate::sketch::HllSketch;

impl Serialize for HllSketch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for HllSketch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        HllSketch::from_bytes(&bytes).map_err(Error::custom)
    }
}
