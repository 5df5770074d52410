mod cached;
mod colormap;
mod components;
mod config;
mod dataset;
mod errors;
mod helpers;
mod labels;
mod linker;
mod mesh;
mod surface;
mod view;
mod viewer;

#[cfg(test)]
mod testing;

pub use colormap::ColorScale;
pub use colormap::Colormap;

pub use components::BackgroundColor;
pub use components::Camera;
pub use components::Canvas;
pub use components::Coloring;
pub use components::Component;
pub use components::ComponentKind;
pub use components::Components;
pub use components::Control;
pub use components::ControlValue;
pub use components::DimensionExplorer;
pub use components::TimeStepper;
pub use components::VerticalExaggeration;
pub use components::{MAX_PLAY_SPEED, MAX_VERTICAL_EXAGGERATION};

pub use config::ViewConfig;
pub use config::ViewerConfig;

pub use dataset::Coordinate;
pub use dataset::Dataset;
pub use dataset::Level;
pub use dataset::Variable;

pub use errors::Error;
pub use errors::ErrorKind;
pub use errors::Result;

pub use helpers::play_interval;

pub use labels::Label;
pub use labels::Labels;

pub use linker::LinkId;
pub use linker::Session;
pub use linker::ViewerId;

pub use mesh::to_unstructured_mesh;
pub use mesh::Mesh;

pub use surface::RecordingSurface;
pub use surface::RenderEvent;
pub use surface::RenderSurface;

pub use view::DatasetView;

pub use viewer::Rescale;
pub use viewer::Viewer;
pub use viewer::ViewerKind;
