//! Declarative parameter schema and the typed change channel.
//!
//! A renderer registers its tunables as [`ParameterDescriptor`]s. UI
//! collaborators read the [`PropertySchema`] to build controls and send
//! [`ParameterChange`] messages back through a [`ParameterSender`]. The engine
//! drains the channel between frames, validates each change against the
//! schema, and merges the resulting [`Invalidation`]s so a burst of edits
//! costs a single reset.

use std::sync::mpsc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VptError};

/// Kind of control a parameter is edited with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    /// Numeric entry with optional bounds.
    Spinner,
    /// Bounded numeric slider.
    Slider,
    /// Three-component vector.
    Vector,
    /// One string out of a fixed option list.
    Select,
    /// Sampled spectrum, one float per band.
    Spectrum,
    /// RGBA8 transfer function lookup table.
    TransferFunction,
    /// RGBA8 density x wavelength lookup table.
    SpectralTransferFunction,
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Float(f32),
    Int(i64),
    Vector(Vec3),
    Choice(String),
    Floats(Vec<f32>),
    Bytes(Vec<u8>),
}

impl ParameterValue {
    /// Numeric view of `Float` and `Int` values.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Integer view; floats are truncated toward zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Int(v) => u32::try_from(*v).ok(),
            Self::Float(v) if *v >= 0.0 && v.is_finite() => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Choice(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Self::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Self::Floats(v) => Some(v.len()),
            Self::Bytes(v) => Some(v.len()),
            _ => None,
        }
    }
}

/// Bounds and options attached to a parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Valid choices of a `Select` parameter.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
    /// Required element count of `Floats` / `Bytes` values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl Constraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }
}

/// What a parameter edit invalidates.
///
/// Ordered from cheapest to most expensive; merging keeps the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Invalidation {
    /// Nothing visible changes.
    #[default]
    None,
    /// The accumulated image restarts.
    Accumulation,
    /// The diffusion field is recreated, then the image restarts.
    DiffusionField,
    /// The light field is recomputed from scratch, then the image restarts.
    LightField,
}

impl Invalidation {
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether the accumulated image must be cleared.
    pub fn resets_accumulation(self) -> bool {
        self != Self::None
    }
}

/// One externally tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub label: String,
    pub kind: ParameterKind,
    pub value: ParameterValue,
    #[serde(default)]
    pub constraints: Constraints,
    /// Cost class of editing this parameter.
    #[serde(default)]
    pub invalidation: Invalidation,
}

impl ParameterDescriptor {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        kind: ParameterKind,
        value: ParameterValue,
        invalidation: Invalidation,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            value,
            constraints: Constraints::default(),
            invalidation,
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Checks a candidate value against the kind and constraints.
    pub fn check(&self, value: &ParameterValue) -> Result<()> {
        let mismatch = |expected: &'static str| VptError::ParameterTypeMismatch {
            name: self.name.clone(),
            expected,
        };
        match self.kind {
            ParameterKind::Spinner | ParameterKind::Slider => {
                let v = value.as_f64().ok_or_else(|| mismatch("numeric"))?;
                let min = self.constraints.min.unwrap_or(f64::NEG_INFINITY);
                let max = self.constraints.max.unwrap_or(f64::INFINITY);
                if !v.is_finite() || v < min || v > max {
                    return Err(VptError::OutOfRange {
                        name: self.name.clone(),
                        value: v,
                        min,
                        max,
                    });
                }
            }
            ParameterKind::Vector => {
                let v = value.as_vec3().ok_or_else(|| mismatch("vector"))?;
                if !v.is_finite() {
                    return Err(VptError::InvalidConfig(format!(
                        "parameter '{}' vector {v} is not finite",
                        self.name
                    )));
                }
            }
            ParameterKind::Select => {
                let choice = value.as_str().ok_or_else(|| mismatch("choice"))?;
                if !self.constraints.options.is_empty()
                    && !self.constraints.options.iter().any(|o| o == choice)
                {
                    return Err(VptError::InvalidChoice {
                        name: self.name.clone(),
                        value: choice.to_string(),
                    });
                }
            }
            ParameterKind::Spectrum => {
                if value.as_floats().is_none() {
                    return Err(mismatch("float array"));
                }
                self.check_length(value)?;
            }
            ParameterKind::TransferFunction | ParameterKind::SpectralTransferFunction => {
                if value.as_bytes().is_none() {
                    return Err(mismatch("byte array"));
                }
                self.check_length(value)?;
            }
        }
        Ok(())
    }

    fn check_length(&self, value: &ParameterValue) -> Result<()> {
        if let (Some(expected), Some(actual)) = (self.constraints.length, value.len()) {
            if expected != actual {
                return Err(VptError::SizeMismatch { expected, actual });
            }
        }
        Ok(())
    }
}

/// Ordered set of parameters a renderer exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    parameters: Vec<ParameterDescriptor>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares parameters. Names must be unique across the schema.
    pub fn register<I>(&mut self, descriptors: I) -> Result<()>
    where
        I: IntoIterator<Item = ParameterDescriptor>,
    {
        for descriptor in descriptors {
            if self.get(&descriptor.name).is_some() {
                return Err(VptError::DuplicateParameter(descriptor.name));
            }
            self.parameters.push(descriptor);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.get(name).map(|p| &p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Validates a change and stores the new value.
    ///
    /// Returns the invalidation class of the parameter.
    pub fn apply(&mut self, change: &ParameterChange) -> Result<Invalidation> {
        let descriptor = self
            .parameters
            .iter_mut()
            .find(|p| p.name == change.name)
            .ok_or_else(|| VptError::UnknownParameter(change.name.clone()))?;
        descriptor.check(&change.value)?;
        descriptor.value = change.value.clone();
        Ok(descriptor.invalidation)
    }

    /// Serializes the schema for UI collaborators.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A `{name, value}` edit sent by a UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub name: String,
    pub value: ParameterValue,
}

impl ParameterChange {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Sending half of the parameter channel, held by UI collaborators.
#[derive(Debug, Clone)]
pub struct ParameterSender {
    tx: mpsc::Sender<ParameterChange>,
}

impl ParameterSender {
    /// Queues a change. Fails once the renderer is gone.
    pub fn send(&self, name: impl Into<String>, value: ParameterValue) -> Result<()> {
        self.tx
            .send(ParameterChange::new(name, value))
            .map_err(|_| VptError::Destroyed)
    }
}

/// Receiving half of the parameter channel, drained by the engine between frames.
#[derive(Debug)]
pub struct ParameterReceiver {
    rx: mpsc::Receiver<ParameterChange>,
}

impl ParameterReceiver {
    /// Takes every queued change without blocking, in send order.
    pub fn drain(&self) -> Vec<ParameterChange> {
        self.rx.try_iter().collect()
    }
}

/// Creates a connected sender/receiver pair.
pub fn parameter_channel() -> (ParameterSender, ParameterReceiver) {
    let (tx, rx) = mpsc::channel();
    (ParameterSender { tx }, ParameterReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> PropertySchema {
        let mut schema = PropertySchema::new();
        schema
            .register([
                ParameterDescriptor::new(
                    "extinction",
                    "Extinction",
                    ParameterKind::Spinner,
                    ParameterValue::Float(1.0),
                    Invalidation::Accumulation,
                )
                .with_constraints(Constraints::none().with_min(0.0)),
                ParameterDescriptor::new(
                    "light_type",
                    "Light type",
                    ParameterKind::Select,
                    ParameterValue::Choice("point".into()),
                    Invalidation::LightField,
                )
                .with_constraints(Constraints::none().with_options(["distant", "point"])),
                ParameterDescriptor::new(
                    "spectrum",
                    "Light spectrum",
                    ParameterKind::Spectrum,
                    ParameterValue::Floats(vec![0.0; 4]),
                    Invalidation::Accumulation,
                )
                .with_constraints(Constraints::none().with_length(4)),
            ])
            .unwrap();
        schema
    }

    #[test]
    fn test_apply_updates_value() {
        let mut schema = schema();
        let change = ParameterChange::new("extinction", ParameterValue::Float(2.5));
        assert_eq!(schema.apply(&change).unwrap(), Invalidation::Accumulation);
        assert_eq!(schema.value("extinction"), Some(&ParameterValue::Float(2.5)));
    }

    #[test]
    fn test_unknown_parameter() {
        let mut schema = schema();
        let change = ParameterChange::new("gain", ParameterValue::Float(1.0));
        assert!(matches!(schema.apply(&change), Err(VptError::UnknownParameter(_))));
    }

    #[test]
    fn test_out_of_range_not_clamped() {
        let mut schema = schema();
        let change = ParameterChange::new("extinction", ParameterValue::Float(-1.0));
        assert!(matches!(schema.apply(&change), Err(VptError::OutOfRange { .. })));
        assert_eq!(schema.value("extinction"), Some(&ParameterValue::Float(1.0)));
    }

    #[test]
    fn test_type_mismatch() {
        let mut schema = schema();
        let change = ParameterChange::new("extinction", ParameterValue::Choice("dense".into()));
        assert!(matches!(
            schema.apply(&change),
            Err(VptError::ParameterTypeMismatch { expected: "numeric", .. })
        ));
    }

    #[test]
    fn test_select_rejects_unknown_option() {
        let mut schema = schema();
        let change = ParameterChange::new("light_type", ParameterValue::Choice("spot".into()));
        assert!(matches!(schema.apply(&change), Err(VptError::InvalidChoice { .. })));
    }

    #[test]
    fn test_length_constraint() {
        let mut schema = schema();
        let change = ParameterChange::new("spectrum", ParameterValue::Floats(vec![1.0; 3]));
        assert!(matches!(
            schema.apply(&change),
            Err(VptError::SizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut schema = schema();
        let dup = ParameterDescriptor::new(
            "extinction",
            "Again",
            ParameterKind::Spinner,
            ParameterValue::Float(0.0),
            Invalidation::None,
        );
        assert!(matches!(schema.register([dup]), Err(VptError::DuplicateParameter(_))));
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_invalidation_merge() {
        assert_eq!(
            Invalidation::Accumulation.merge(Invalidation::LightField),
            Invalidation::LightField
        );
        assert_eq!(
            Invalidation::DiffusionField.merge(Invalidation::Accumulation),
            Invalidation::DiffusionField
        );
        assert!(!Invalidation::None.resets_accumulation());
        assert!(Invalidation::Accumulation.resets_accumulation());
    }

    #[test]
    fn test_channel_drains_in_order() {
        let (tx, rx) = parameter_channel();
        tx.send("a", ParameterValue::Int(1)).unwrap();
        tx.clone().send("b", ParameterValue::Int(2)).unwrap();
        let changes = rx.drain();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].name, "a");
        assert_eq!(changes[1].name, "b");
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = parameter_channel();
        drop(rx);
        assert!(matches!(tx.send("a", ParameterValue::Int(1)), Err(VptError::Destroyed)));
    }

    #[test]
    fn test_schema_json_roundtrip() {
        let schema = schema();
        let json = schema.to_json().unwrap();
        assert!(json.contains("\"kind\": \"spinner\""));
        let parsed: PropertySchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_value_views() {
        assert_eq!(ParameterValue::Int(7).as_u32(), Some(7));
        assert_eq!(ParameterValue::Int(-1).as_u32(), None);
        assert_eq!(ParameterValue::Float(3.9).as_u32(), Some(3));
        assert_eq!(ParameterValue::Int(2).as_f32(), Some(2.0));
        assert_eq!(ParameterValue::Choice("x".into()).as_str(), Some("x"));
    }
}
