use std::fmt;

use ndarray::Array1;
use num_traits::ToPrimitive;
use paste::paste;

/// A single coordinate value.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Label {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => value.to_f64(),
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            // Debug formatting keeps the decimal point on whole numbers ("100.0", not "100")
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// The values of a one dimensional coordinate.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Labels {
    Int(Array1<i64>),
    Float(Array1<f64>),
    Text(Vec<String>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }

    /// Get the label at `index`, or `None` if out of bounds.
    ///
    pub fn get(&self, index: usize) -> Option<Label> {
        match self {
            Self::Int(values) => values.get(index).copied().map(Label::Int),
            Self::Float(values) => values.get(index).copied().map(Label::Float),
            Self::Text(values) => values.get(index).cloned().map(Label::Text),
        }
    }

    /// Numeric labels as floats. Text labels have no numeric representation.
    ///
    pub fn to_f64(&self) -> Option<Array1<f64>> {
        match self {
            Self::Int(values) => Some(values.mapv(|value| value as f64)),
            Self::Float(values) => Some(values.clone()),
            Self::Text(_) => None,
        }
    }

    /// Find the index of the label closest to `value`.
    ///
    /// On an exact tie between two labels the lower index wins. NaN labels are never selected.
    /// Returns `None` for text labels or if there is no candidate at all.
    ///
    pub fn nearest<T: ToPrimitive>(&self, value: T) -> Option<usize> {
        let target = value.to_f64()?;
        let values = self.to_f64()?;

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in values.iter().enumerate() {
            let distance = (candidate - target).abs();
            if distance.is_nan() {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((index, distance)),
            }
        }

        best.map(|(index, _)| index)
    }
}

macro_rules! Labels {
    ($variant:ident, $type:ident) => {
        paste! {
            impl From<Array1<$type>> for Labels {
                fn from(values: Array1<$type>) -> Self {
                    Self::$variant(values)
                }
            }

            impl From<Vec<$type>> for Labels {
                fn from(values: Vec<$type>) -> Self {
                    Self::$variant(Array1::from(values))
                }
            }

            impl From<$type> for Label {
                fn from(value: $type) -> Self {
                    Self::$variant(value)
                }
            }

            impl Labels {
                pub fn [<as_ $type>](&self) -> Option<&Array1<$type>> {
                    match self {
                        Self::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        }
    };
}

Labels!(Int, i64);
Labels!(Float, f64);

impl From<Vec<String>> for Labels {
    fn from(values: Vec<String>) -> Self {
        Self::Text(values)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(values: Vec<&str>) -> Self {
        Self::Text(values.into_iter().map(String::from).collect())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
