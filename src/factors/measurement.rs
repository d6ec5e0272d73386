//! Per-view measurements stored by a smart factor.

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::noise_model::SharedNoiseModel;
use nalgebra::{Vector2, Vector3};

/// Opaque, ordered identifier of a view variable.
pub type Key = usize;

/// One image observation of the landmark.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub key: Key,
    pub measured: Vector2<f64>,
    pub noise: SharedNoiseModel,
}

/// A structure-from-motion track: a point estimate and its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SfmTrack {
    pub point: Vector3<f64>,
    pub observations: Vec<(Key, Vector2<f64>)>,
}

impl SfmTrack {
    pub fn new(point: Vector3<f64>) -> Self {
        Self {
            point,
            observations: Vec::new(),
        }
    }

    pub fn add_observation(&mut self, key: Key, measured: Vector2<f64>) {
        self.observations.push((key, measured));
    }
}

/// Append-only list of measurements in key order of insertion.
///
/// Block positions of every linearized output follow this order.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSet {
    measurements: Vec<Measurement>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, measured: &Vector2<f64>, key: Key, pending: &[Key]) -> SmartFactorResult<()> {
        if pending.contains(&key) || self.measurements.iter().any(|m| m.key == key) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "key {key} is already observed by this factor"
            )));
        }
        if !(measured.x.is_finite() && measured.y.is_finite()) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "measurement for key {key} is not finite"
            )));
        }
        Ok(())
    }

    /// Validate every element of a batch against the set and against each other.
    fn check_batch<'a>(
        &self,
        entries: impl IntoIterator<Item = (Key, &'a Vector2<f64>)>,
    ) -> SmartFactorResult<()> {
        let mut pending = Vec::new();
        for (key, measured) in entries {
            self.check(measured, key, &pending)?;
            pending.push(key);
        }
        Ok(())
    }

    /// Append one measurement; a key may only be observed once.
    pub fn add(
        &mut self,
        measured: Vector2<f64>,
        key: Key,
        noise: SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        self.check(&measured, key, &[])?;
        self.measurements.push(Measurement {
            key,
            measured,
            noise,
        });
        Ok(())
    }

    /// Append several measurements with per-view noise models.
    ///
    /// The whole batch is validated first; on error nothing is appended.
    pub fn add_batch(
        &mut self,
        measured: &[Vector2<f64>],
        keys: &[Key],
        noise: &[SharedNoiseModel],
    ) -> SmartFactorResult<()> {
        if measured.len() != keys.len() || keys.len() != noise.len() {
            return Err(SmartFactorError::InvalidArgument(format!(
                "batch size mismatch: {} measurements, {} keys, {} noise models",
                measured.len(),
                keys.len(),
                noise.len()
            )));
        }
        self.check_batch(keys.iter().copied().zip(measured))?;
        self.measurements.extend(measured.iter().zip(keys).zip(noise).map(
            |((z, key), model)| Measurement {
                key: *key,
                measured: *z,
                noise: model.clone(),
            },
        ));
        Ok(())
    }

    /// Append several measurements sharing one noise model.
    ///
    /// The whole batch is validated first; on error nothing is appended.
    pub fn add_batch_shared_noise(
        &mut self,
        measured: &[Vector2<f64>],
        keys: &[Key],
        noise: &SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        if measured.len() != keys.len() {
            return Err(SmartFactorError::InvalidArgument(format!(
                "batch size mismatch: {} measurements, {} keys",
                measured.len(),
                keys.len()
            )));
        }
        self.check_batch(keys.iter().copied().zip(measured))?;
        self.measurements
            .extend(measured.iter().zip(keys).map(|(z, key)| Measurement {
                key: *key,
                measured: *z,
                noise: noise.clone(),
            }));
        Ok(())
    }

    /// Append every observation of a track with a shared noise model.
    ///
    /// All-or-nothing, like the batch variants.
    pub fn add_track(
        &mut self,
        track: &SfmTrack,
        noise: &SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        self.check_batch(track.observations.iter().map(|(key, z)| (*key, z)))?;
        self.measurements
            .extend(track.observations.iter().map(|(key, z)| Measurement {
                key: *key,
                measured: *z,
                noise: noise.clone(),
            }));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Measurement> {
        self.measurements.get(index)
    }

    pub fn keys(&self) -> Vec<Key> {
        self.measurements.iter().map(|m| m.key).collect()
    }

    pub fn measured(&self) -> Vec<Vector2<f64>> {
        self.measurements.iter().map(|m| m.measured).collect()
    }

    pub fn noise_models(&self) -> Vec<SharedNoiseModel> {
        self.measurements.iter().map(|m| m.noise.clone()).collect()
    }
}
