use std::{fmt, str::FromStr};

use colorous::Gradient;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Linear or logarithmic mapping of values to colormap positions.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScale {
    #[default]
    Linear,
    Log,
}

macro_rules! Colormaps {
    ($($name:ident => $gradient:ident),* $(,)?) => {
        /// Colormaps a render surface can apply to the color array.
        ///
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Colormap {
            $($name,)*
        }

        impl Colormap {
            pub const ALL: &'static [Colormap] = &[$(Colormap::$name,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }

            pub fn gradient(&self) -> Gradient {
                match self {
                    $(Self::$name => colorous::$gradient,)*
                }
            }
        }
    };
}

Colormaps! {
    Viridis => VIRIDIS,
    Cividis => CIVIDIS,
    Plasma => PLASMA,
    Inferno => INFERNO,
    Magma => MAGMA,
    Turbo => TURBO,
    Greys => GREYS,
    Blues => BLUES,
    Greens => GREENS,
    Reds => REDS,
    Spectral => SPECTRAL,
    RdBu => RED_BLUE,
    BrBG => BROWN_GREEN,
    YlGnBu => YELLOW_GREEN_BLUE,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::Viridis
    }
}

impl Colormap {
    /// Sample the colormap at `t` in `[0, 1]`. Values outside are clamped.
    ///
    pub fn rgb(&self, t: f64) -> (u8, u8, u8) {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let color = self.gradient().eval_continuous(t);

        (color.r, color.g, color.b)
    }

    /// Map `value` to an RGB color given color limits and scale.
    ///
    /// With a log scale, non positive limits or values fall back to the bottom of the colormap.
    ///
    pub fn map(&self, value: f64, min: f64, max: f64, scale: ColorScale) -> (u8, u8, u8) {
        let (value, min, max) = match scale {
            ColorScale::Linear => (value, min, max),
            ColorScale::Log => {
                if value <= 0.0 || min <= 0.0 || max <= 0.0 {
                    return self.rgb(0.0);
                }
                (value.log10(), min.log10(), max.log10())
            }
        };
        let span = max - min;
        let t = if span == 0.0 { 0.0 } else { (value - min) / span };

        self.rgb(t)
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Colormap {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|colormap| colormap.name().eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| Error::InvalidColormap(name.to_string()))
    }
}
