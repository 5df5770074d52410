use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use parking_lot::Mutex;

use crate::{
    colormap::{ColorScale, Colormap},
    components::Camera,
};

/// Receiver of everything a 3D viewer needs to draw.
///
/// Geometry is pushed once per dataset load. Slice arrays are aligned 1:1 with the mesh vertices
/// and pushed whenever the current slice changes. Within one batch of state changes each callback
/// is called at most once, in the order the methods are declared here.
///
pub trait RenderSurface {
    fn on_geometry_ready(&mut self, vertices: ArrayView2<f64>, triangles: ArrayView2<u32>);

    /// New elevation (warp) and color arrays, one value per vertex
    fn on_slice_changed(&mut self, elevation: ArrayView1<f64>, color: ArrayView1<f64>);

    fn on_color_range(&mut self, min: f64, max: f64);

    fn on_color_var_changed(&mut self, name: &str);

    fn on_colormap(&mut self, _colormap: Colormap) {}

    fn on_color_scale(&mut self, _scale: ColorScale) {}

    fn on_warp_factor(&mut self, _factor: f64) {}

    fn on_background_color(&mut self, _color: &str) {}

    fn on_camera(&mut self, _camera: &Camera) {}
}

/// One call made on a [`RecordingSurface`].
///
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    GeometryReady {
        vertices: Array2<f64>,
        triangles: Array2<u32>,
    },
    SliceChanged {
        elevation: Array1<f64>,
        color: Array1<f64>,
    },
    ColorRange {
        min: f64,
        max: f64,
    },
    ColorVarChanged(String),
    Colormap(Colormap),
    ColorScale(ColorScale),
    WarpFactor(f64),
    BackgroundColor(String),
    Camera(Camera),
}

/// A render surface that only records what it is asked to draw.
///
/// Clones share the same record, so one clone can be handed to a viewer and another kept to
/// inspect events.
///
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    events: Arc<Mutex<Vec<RenderEvent>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().clone()
    }

    /// Return recorded events and start a new record.
    ///
    pub fn take(&self) -> Vec<RenderEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn record(&self, event: RenderEvent) {
        self.events.lock().push(event);
    }
}

impl RenderSurface for RecordingSurface {
    fn on_geometry_ready(&mut self, vertices: ArrayView2<f64>, triangles: ArrayView2<u32>) {
        self.record(RenderEvent::GeometryReady {
            vertices: vertices.to_owned(),
            triangles: triangles.to_owned(),
        });
    }

    fn on_slice_changed(&mut self, elevation: ArrayView1<f64>, color: ArrayView1<f64>) {
        self.record(RenderEvent::SliceChanged {
            elevation: elevation.to_owned(),
            color: color.to_owned(),
        });
    }

    fn on_color_range(&mut self, min: f64, max: f64) {
        self.record(RenderEvent::ColorRange { min, max });
    }

    fn on_color_var_changed(&mut self, name: &str) {
        self.record(RenderEvent::ColorVarChanged(name.to_string()));
    }

    fn on_colormap(&mut self, colormap: Colormap) {
        self.record(RenderEvent::Colormap(colormap));
    }

    fn on_color_scale(&mut self, scale: ColorScale) {
        self.record(RenderEvent::ColorScale(scale));
    }

    fn on_warp_factor(&mut self, factor: f64) {
        self.record(RenderEvent::WarpFactor(factor));
    }

    fn on_background_color(&mut self, color: &str) {
        self.record(RenderEvent::BackgroundColor(color.to_string()));
    }

    fn on_camera(&mut self, camera: &Camera) {
        self.record(RenderEvent::Camera(camera.clone()));
    }
}
