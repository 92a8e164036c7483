//! Property registry: the named, typed, range-bounded tuning knobs.
//!
//! Front ends (the CLI, embedding UIs) configure training through a flat
//! key/value registry rather than by constructing parameter structs
//! directly. Every knob carries a description and legal range, so a front
//! end can enumerate the registry and render or validate settings
//! generically. [`TrainSetup::from_properties`] converts a populated
//! registry into the paths and [`TrainParams`] the driver consumes; the
//! registry is read once at training start.

use std::path::PathBuf;

use thiserror::Error;

use crate::train::{TrainParams, Verbosity};

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Free-form text; `None` means unset (used by required paths).
    Text(Option<String>),
}

/// One registered knob.
#[derive(Clone, Debug)]
pub struct Property {
    pub name: &'static str,
    pub desc: &'static str,
    value: PropValue,
    int_bounds: Option<(i64, i64)>,
    float_bounds: Option<(f64, f64)>,
}

impl Property {
    pub fn value(&self) -> &PropValue {
        &self.value
    }
}

/// Registry misuse and missing-configuration errors.
#[derive(Debug, Error)]
pub enum PropsError {
    #[error("unknown property '{0}'")]
    Unknown(String),

    #[error("property '{name}' expects a {expected} value")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
    },

    #[error("property '{name}' value {value} outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("{0} not specified")]
    ConfigMissing(&'static str),
}

/// The knob registry with its defaults.
#[derive(Clone, Debug)]
pub struct Properties {
    props: Vec<Property>,
}

fn text(name: &'static str, desc: &'static str) -> Property {
    Property {
        name,
        desc,
        value: PropValue::Text(None),
        int_bounds: None,
        float_bounds: None,
    }
}

fn boolean(name: &'static str, desc: &'static str, value: bool) -> Property {
    Property {
        name,
        desc,
        value: PropValue::Bool(value),
        int_bounds: None,
        float_bounds: None,
    }
}

fn int(name: &'static str, desc: &'static str, value: i64, min: i64, max: i64) -> Property {
    Property {
        name,
        desc,
        value: PropValue::Int(value),
        int_bounds: Some((min, max)),
        float_bounds: None,
    }
}

fn float(name: &'static str, desc: &'static str, value: f64, min: f64, max: f64) -> Property {
    Property {
        name,
        desc,
        value: PropValue::Float(value),
        int_bounds: None,
        float_bounds: Some((min, max)),
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            props: vec![
                text("data_dir", "Location of training data"),
                text("index_name", "Name of frame index to load"),
                text("out_file", "Filename of tree to write"),
                boolean("reload", "Reload and continue training pre-existing tree", false),
                int("n_pixels", "Number of pixels to sample per image", 2000, 1, i64::MAX),
                int("n_thresholds", "Number of thresholds to test", 50, 2, i64::MAX),
                float("threshold_range", "Range of thresholds to test", 1.29, 0.0, 10.0),
                int("n_uv", "Number of UV combinations to test", 2000, 1, i64::MAX),
                float("uv_range", "Range of UV combinations to test", 1.29, 0.0, 10.0),
                int("max_depth", "Depth to train tree to", 20, 1, 30),
                int("seed", "Seed to use for RNG", 0, 0, i64::MAX),
                boolean("verbose", "Verbose logging output", false),
                int("n_threads", "Number of threads to spawn (0 = all cores)", 0, 0, 128),
            ],
        }
    }
}

impl Properties {
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.props.iter()
    }

    fn lookup(&self, name: &str) -> Result<&Property, PropsError> {
        self.props
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PropsError::Unknown(name.to_string()))
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Property, PropsError> {
        self.props
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PropsError::Unknown(name.to_string()))
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), PropsError> {
        let prop = self.lookup_mut(name)?;
        match prop.value {
            PropValue::Bool(_) => {
                prop.value = PropValue::Bool(value);
                Ok(())
            }
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "boolean",
            }),
        }
    }

    pub fn set_int(&mut self, name: &str, value: i64) -> Result<(), PropsError> {
        let prop = self.lookup_mut(name)?;
        match (&prop.value, prop.int_bounds) {
            (PropValue::Int(_), Some((min, max))) => {
                if value < min || value > max {
                    return Err(PropsError::OutOfRange {
                        name: prop.name,
                        value: value.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                prop.value = PropValue::Int(value);
                Ok(())
            }
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "integer",
            }),
        }
    }

    pub fn set_float(&mut self, name: &str, value: f64) -> Result<(), PropsError> {
        let prop = self.lookup_mut(name)?;
        match (&prop.value, prop.float_bounds) {
            (PropValue::Float(_), Some((min, max))) => {
                if !value.is_finite() || value < min || value > max {
                    return Err(PropsError::OutOfRange {
                        name: prop.name,
                        value: value.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                prop.value = PropValue::Float(value);
                Ok(())
            }
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "float",
            }),
        }
    }

    pub fn set_text(&mut self, name: &str, value: &str) -> Result<(), PropsError> {
        let prop = self.lookup_mut(name)?;
        match prop.value {
            PropValue::Text(_) => {
                prop.value = PropValue::Text(Some(value.to_string()));
                Ok(())
            }
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "text",
            }),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, PropsError> {
        let prop = self.lookup(name)?;
        match prop.value {
            PropValue::Bool(v) => Ok(v),
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "boolean",
            }),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, PropsError> {
        let prop = self.lookup(name)?;
        match prop.value {
            PropValue::Int(v) => Ok(v),
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "integer",
            }),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, PropsError> {
        let prop = self.lookup(name)?;
        match prop.value {
            PropValue::Float(v) => Ok(v),
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "float",
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<Option<&str>, PropsError> {
        let prop = self.lookup(name)?;
        match &prop.value {
            PropValue::Text(v) => Ok(v.as_deref()),
            _ => Err(PropsError::TypeMismatch {
                name: prop.name,
                expected: "text",
            }),
        }
    }
}

// =============================================================================
// TrainSetup
// =============================================================================

/// Everything a front end hands the training pipeline.
#[derive(Clone, Debug)]
pub struct TrainSetup {
    pub data_dir: PathBuf,
    pub index_name: String,
    pub out_file: PathBuf,
    pub reload: bool,
    pub params: TrainParams,
}

impl TrainSetup {
    /// Extract paths and parameters from a populated registry.
    pub fn from_properties(props: &Properties) -> Result<Self, PropsError> {
        let data_dir = props
            .text("data_dir")?
            .ok_or(PropsError::ConfigMissing("data directory"))?;
        let index_name = props
            .text("index_name")?
            .ok_or(PropsError::ConfigMissing("index name"))?;
        let out_file = props
            .text("out_file")?
            .ok_or(PropsError::ConfigMissing("output filename"))?;

        let params = TrainParams {
            n_pixels: props.int("n_pixels")? as usize,
            n_thresholds: props.int("n_thresholds")? as usize,
            threshold_range: props.float("threshold_range")? as f32,
            n_uv: props.int("n_uv")? as usize,
            uv_range: props.float("uv_range")? as f32,
            max_depth: props.int("max_depth")? as usize,
            seed: props.int("seed")? as u64,
            n_threads: props.int("n_threads")? as usize,
            verbosity: if props.bool("verbose")? {
                Verbosity::Debug
            } else {
                Verbosity::Info
            },
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            index_name: index_name.to_string(),
            out_file: PathBuf::from(out_file),
            reload: props.bool("reload")?,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let props = Properties::default();
        assert_eq!(props.int("n_pixels").unwrap(), 2000);
        assert_eq!(props.int("n_thresholds").unwrap(), 50);
        assert_eq!(props.float("threshold_range").unwrap(), 1.29);
        assert_eq!(props.int("n_uv").unwrap(), 2000);
        assert_eq!(props.int("max_depth").unwrap(), 20);
        assert!(!props.bool("reload").unwrap());
        assert_eq!(props.text("data_dir").unwrap(), None);
    }

    #[test]
    fn bounds_are_enforced() {
        let mut props = Properties::default();
        assert!(matches!(
            props.set_int("max_depth", 31),
            Err(PropsError::OutOfRange { .. })
        ));
        assert!(matches!(
            props.set_int("n_thresholds", 1),
            Err(PropsError::OutOfRange { .. })
        ));
        assert!(matches!(
            props.set_float("uv_range", 11.0),
            Err(PropsError::OutOfRange { .. })
        ));
        assert!(props.set_int("max_depth", 30).is_ok());
    }

    #[test]
    fn type_and_name_errors() {
        let mut props = Properties::default();
        assert!(matches!(
            props.set_bool("n_pixels", true),
            Err(PropsError::TypeMismatch { .. })
        ));
        assert!(matches!(
            props.set_int("no_such_knob", 1),
            Err(PropsError::Unknown(_))
        ));
    }

    #[test]
    fn setup_requires_paths() {
        let props = Properties::default();
        assert!(matches!(
            TrainSetup::from_properties(&props),
            Err(PropsError::ConfigMissing("data directory"))
        ));
    }

    #[test]
    fn setup_extracts_params() {
        let mut props = Properties::default();
        props.set_text("data_dir", "/data").unwrap();
        props.set_text("index_name", "poses").unwrap();
        props.set_text("out_file", "tree.rdt").unwrap();
        props.set_int("max_depth", 8).unwrap();
        props.set_bool("verbose", true).unwrap();

        let setup = TrainSetup::from_properties(&props).unwrap();
        assert_eq!(setup.data_dir, PathBuf::from("/data"));
        assert_eq!(setup.index_name, "poses");
        assert_eq!(setup.params.max_depth, 8);
        assert_eq!(setup.params.verbosity, Verbosity::Debug);
        assert!(setup.params.validate().is_ok());
    }
}
