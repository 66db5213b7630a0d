//! # VBus Bridge Library
//!
//! Read sensor data from RESOL VBus solar and heating controllers.
//!
//! This library decodes VBus data telegrams (protocol 1.0) received over a
//! serial connection into named, typed sensor readings: temperatures, raw
//! counters, and minutes-since-midnight time fields.

pub mod config;
pub mod error;
pub mod sensor;
pub mod serial;
pub mod vbus;
