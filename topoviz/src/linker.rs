use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{debug, trace, warn};

use crate::{
    components::{ComponentKind, Control, ControlValue},
    errors::{Error, Result},
    viewer::Viewer,
};

/// Handle to a viewer owned by a [`Session`].
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewerId(usize);

/// Handle to a set of propagation edges created by one call to `link`.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(usize);

/// A control of a given viewer.
///
type Endpoint = (ViewerId, Control);

#[derive(Clone, Debug, PartialEq, Eq)]
struct Edge {
    link: LinkId,
    target: Endpoint,
}

/// What a link was asked to connect. Its edges are derived from this and the viewers' current
/// controls.
///
#[derive(Clone, Debug)]
struct LinkSpec {
    ids: Vec<ViewerId>,
    kinds: Vec<ComponentKind>,
}

/// Active propagation edges, keyed by source endpoint.
///
#[derive(Debug, Default)]
struct LinkRegistry {
    edges: BTreeMap<Endpoint, Vec<Edge>>,
}

impl LinkRegistry {
    fn add(&mut self, link: LinkId, source: Endpoint, target: Endpoint) {
        self.edges
            .entry(source)
            .or_default()
            .push(Edge { link, target });
    }

    fn targets(&self, source: &Endpoint) -> Vec<Endpoint> {
        self.edges
            .get(source)
            .map(|edges| edges.iter().map(|edge| edge.target.clone()).collect())
            .unwrap_or_default()
    }

    /// Controls of `viewer` with at least one outgoing edge.
    ///
    fn sources(&self, viewer: ViewerId) -> Vec<Control> {
        self.edges
            .keys()
            .filter(|(id, _)| *id == viewer)
            .map(|(_, control)| control.clone())
            .collect()
    }

    fn remove_where<F>(&mut self, mut remove: F)
    where
        F: FnMut(&Endpoint, &Edge) -> bool,
    {
        for (source, edges) in self.edges.iter_mut() {
            edges.retain(|edge| !remove(source, edge));
        }
        self.edges.retain(|_, edges| !edges.is_empty());
    }
}

/// Owns viewers and mirrors linked controls between them.
///
/// Viewers are mutated through [`Session::update`]: once the update is done, every linked control
/// whose value changed is set on its targets. Targets apply the value with their own validation and
/// pass it on along their own links, so overlapping links chain. Each endpoint is set at most once
/// per change, which also stops cycles.
///
/// Edges follow the viewers: when an update changes the controls a viewer exposes (eg a reload
/// with other dimension roles), every link of that viewer is wired again.
///
#[derive(Default)]
pub struct Session {
    viewers: BTreeMap<ViewerId, Viewer>,
    registry: LinkRegistry,
    links: BTreeMap<LinkId, LinkSpec>,
    next_viewer: usize,
    next_link: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, viewer: Viewer) -> ViewerId {
        let id = ViewerId(self.next_viewer);
        self.next_viewer += 1;
        self.viewers.insert(id, viewer);

        id
    }

    pub fn viewer(&self, id: ViewerId) -> Result<&Viewer> {
        self.viewers.get(&id).ok_or(Error::UnknownViewer(id.0))
    }

    pub fn viewer_ids(&self) -> impl Iterator<Item = ViewerId> + '_ {
        self.viewers.keys().copied()
    }

    /// Take a viewer out of the session, dropping every link edge from or to it.
    ///
    /// A link left with a single viewer is dropped too.
    ///
    pub fn remove(&mut self, id: ViewerId) -> Result<Viewer> {
        let viewer = self.viewers.remove(&id).ok_or(Error::UnknownViewer(id.0))?;
        self.registry
            .remove_where(|(source, _), edge| *source == id || edge.target.0 == id);
        for spec in self.links.values_mut() {
            spec.ids.retain(|linked| *linked != id);
        }
        self.links.retain(|_, spec| spec.ids.len() >= 2);
        debug!("removed viewer {id:?}");

        Ok(viewer)
    }

    /// Mutate a viewer, then propagate changed linked controls.
    ///
    /// Changes are propagated even if `f` fails, since it may have applied some of them before
    /// failing. A target rejecting a value is logged and skipped, and does not pass it on.
    ///
    pub fn update<T, F>(&mut self, id: ViewerId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Viewer) -> Result<T>,
    {
        let sources = self.registry.sources(id);
        let viewer = self.viewers.get_mut(&id).ok_or(Error::UnknownViewer(id.0))?;

        let controls = viewer.linkable_controls();
        let before: Vec<Option<ControlValue>> = sources
            .iter()
            .map(|control| viewer.control_value(control).ok())
            .collect();
        let result = f(viewer);

        let rewire = viewer.linkable_controls() != controls;
        let mut changed = vec![];
        for (control, before) in sources.into_iter().zip(before) {
            if let Ok(value) = viewer.control_value(&control) {
                if before.as_ref() != Some(&value) {
                    changed.push((control, value));
                }
            }
        }

        if rewire {
            self.rewire(id);
        }
        for (control, value) in changed {
            self.propagate((id, control), value);
        }

        result
    }

    /// Link all controls of the given viewers.
    ///
    pub fn link(&mut self, ids: &[ViewerId]) -> Result<LinkId> {
        self.link_components(ids, &ComponentKind::ALL)
    }

    /// Link the controls of the given component kinds.
    ///
    /// For each kind and each pair of viewers, controls are matched by position. A pair whose
    /// control lists differ in length, or where a viewer has no such component, is skipped. Once
    /// linked, the values of the first viewer are pushed to the others.
    ///
    /// Fails with `UnknownViewer` if an id is not part of this session, `TooFewViewers` if less
    /// than two ids are given and `DuplicateViewer` if an id is repeated. Nothing is linked on
    /// failure.
    ///
    pub fn link_components(
        &mut self,
        ids: &[ViewerId],
        kinds: &[ComponentKind],
    ) -> Result<LinkId> {
        for id in ids {
            self.viewer(*id)?;
        }
        if ids.len() < 2 {
            return Err(Error::TooFewViewers(ids.len()));
        }
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(Error::DuplicateViewer(id.0));
            }
        }

        let link = LinkId(self.next_link);
        self.next_link += 1;
        self.links.insert(
            link,
            LinkSpec {
                ids: ids.to_vec(),
                kinds: kinds.to_vec(),
            },
        );
        let pairs = self.wire(link);
        debug!("link {link:?} between {ids:?} on {kinds:?}");

        let first = ids[0];
        let pushed: BTreeSet<Control> = pairs
            .into_iter()
            .filter(|((source, _), _)| *source == first)
            .map(|((_, control), _)| control)
            .collect();
        for control in pushed {
            if let Ok(value) = self.viewers[&first].control_value(&control) {
                self.propagate((first, control), value);
            }
        }

        Ok(link)
    }

    /// Remove every edge of a link. Returns false if the link was already gone.
    ///
    pub fn unlink(&mut self, link: LinkId) -> bool {
        let found = self.links.remove(&link).is_some();
        self.registry.remove_where(|_, edge| edge.link == link);
        debug!("unlink {link:?}");

        found
    }

    /// Endpoints a control of a viewer currently propagates to.
    ///
    pub fn linked_to(&self, id: ViewerId, control: &Control) -> Vec<(ViewerId, Control)> {
        self.registry.targets(&(id, control.clone()))
    }

    /// Add the edges of `link` for the current controls of its viewers. Returns the matched
    /// control pairs.
    ///
    fn wire(&mut self, link: LinkId) -> Vec<(Endpoint, Endpoint)> {
        let Some(spec) = self.links.get(&link) else {
            return vec![];
        };

        let pairs = matched_controls(&self.viewers, spec);
        for (a, b) in &pairs {
            self.registry.add(link, a.clone(), b.clone());
            self.registry.add(link, b.clone(), a.clone());
        }

        pairs
    }

    /// Wire again every link of a viewer whose controls changed.
    ///
    fn rewire(&mut self, id: ViewerId) {
        let links: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, spec)| spec.ids.contains(&id))
            .map(|(link, _)| *link)
            .collect();

        for link in links {
            debug!("controls of viewer {id:?} changed, rewiring {link:?}");
            self.registry.remove_where(|_, edge| edge.link == link);
            self.wire(link);
        }
    }

    /// Set `value` on every endpoint reachable from `source`, breadth first.
    ///
    fn propagate(&mut self, source: Endpoint, value: ControlValue) {
        let mut visited = BTreeSet::from([source.clone()]);
        let mut queue = VecDeque::from([source]);

        while let Some(from) = queue.pop_front() {
            for target in self.registry.targets(&from) {
                if !visited.insert(target.clone()) {
                    continue;
                }
                if self.apply(&from, &target, value.clone()) {
                    queue.push_back(target);
                }
            }
        }
    }

    fn apply(&mut self, source: &Endpoint, target: &Endpoint, value: ControlValue) -> bool {
        let (target_id, control) = target;
        let Some(viewer) = self.viewers.get_mut(target_id) else {
            return false;
        };
        trace!("propagate {source:?} -> ({target_id:?}, {control:?}): {value:?}");
        match viewer.set_control(control, value) {
            Ok(()) => true,
            Err(err) => {
                warn!("viewer {target_id:?} rejected linked {control:?}: {err}");
                false
            }
        }
    }
}

/// Control pairs of every two viewers of a link, matched by position within each component kind.
///
fn matched_controls(
    viewers: &BTreeMap<ViewerId, Viewer>,
    spec: &LinkSpec,
) -> Vec<(Endpoint, Endpoint)> {
    let mut pairs = vec![];
    for kind in &spec.kinds {
        for (i, a) in spec.ids.iter().enumerate() {
            for b in &spec.ids[i + 1..] {
                let (Some(viewer_a), Some(viewer_b)) = (viewers.get(a), viewers.get(b)) else {
                    continue;
                };
                let controls_a = viewer_a.components().linkable_controls(*kind);
                let controls_b = viewer_b.components().linkable_controls(*kind);
                if controls_a.is_empty() || controls_a.len() != controls_b.len() {
                    debug!("{kind:?} of viewers {a:?} and {b:?} are not linkable, skipping");
                    continue;
                }
                for (ca, cb) in controls_a.into_iter().zip(controls_b) {
                    pairs.push(((*a, ca), (*b, cb)));
                }
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::{
        components::Camera,
        config::{ViewConfig, ViewerConfig},
        dataset::{Coordinate, Dataset, Variable},
        errors::ErrorKind,
        surface::{RecordingSurface, RenderEvent},
        testing,
    };

    fn config() -> ViewerConfig {
        ViewerConfig::new(ViewConfig::new().with_time_dim("time"))
    }

    fn explorer(config: ViewerConfig) -> Viewer {
        let mut viewer = Viewer::explorer(config);
        viewer.load_dataset(Arc::new(testing::dataset())).unwrap();
        viewer
    }

    fn session() -> (Session, ViewerId, ViewerId) {
        let mut session = Session::new();
        let a = session.add(explorer(config()));
        let b = session.add(explorer(config()));
        (session, a, b)
    }

    fn timestep(session: &Session, id: ViewerId) -> usize {
        session.viewer(id).unwrap().timestep().unwrap()
    }

    fn batch(session: &Session, id: ViewerId) -> usize {
        session.viewer(id).unwrap().extra_dims_positions().unwrap()["batch"]
    }

    #[test]
    fn test_link_unlink() {
        let (mut session, a, b) = session();
        let link = session.link(&[a, b]).unwrap();

        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, b), 2);

        session
            .update(a, |viewer| viewer.set_extra_dim_positions([("batch", 1)]))
            .unwrap();
        assert_eq!(batch(&session, b), 1);

        // Both ways
        session.update(b, |viewer| viewer.set_play_speed(5)).unwrap();
        assert_eq!(
            session.viewer(a).unwrap().control_value(&Control::PlaySpeed).unwrap(),
            ControlValue::Speed(5)
        );

        assert!(session.unlink(link));
        assert!(!session.unlink(link));

        session.update(a, |viewer| viewer.go_to_step(0)).unwrap();
        assert_ne!(timestep(&session, b), 0);

        session
            .update(a, |viewer| viewer.set_extra_dim_positions([("batch", 0)]))
            .unwrap();
        assert_ne!(batch(&session, b), 0);
        assert!(session.linked_to(a, &Control::Timestep).is_empty());
    }

    #[test]
    fn test_relink() {
        let (mut session, a, b) = session();

        for step in [1, 2, 0] {
            let link = session.link(&[a, b]).unwrap();
            session.update(a, |viewer| viewer.go_to_step(step)).unwrap();
            assert_eq!(timestep(&session, b), step);
            session.unlink(link);
        }

        session.update(b, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, a), 0);
    }

    #[test]
    fn test_link_pushes_first_viewer_values() {
        let (mut session, a, b) = session();
        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        session
            .update(b, |viewer| viewer.set_extra_dim_positions([("batch", 2)]))
            .unwrap();

        session.link(&[a, b]).unwrap();
        assert_eq!(timestep(&session, b), 2);
        assert_eq!(batch(&session, b), 0);
    }

    #[test]
    fn test_link_errors() {
        let (mut session, a, b) = session();
        let gone = session.add(explorer(config()));
        session.remove(gone).unwrap();

        let err = session.link(&[a, gone]).unwrap_err();
        assert!(matches!(err, Error::UnknownViewer(2)));
        assert_eq!(err.kind(), ErrorKind::LinkType);

        let err = session.link(&[a]).unwrap_err();
        assert!(matches!(err, Error::TooFewViewers(1)));
        assert_eq!(err.kind(), ErrorKind::LinkValue);
        assert!(err.to_string().contains("at least two"));

        let err = session.link(&[a, a]).unwrap_err();
        assert!(matches!(err, Error::DuplicateViewer(0)));
        assert_eq!(err.kind(), ErrorKind::LinkValue);
        assert!(err.to_string().contains("distinct"));

        // Nothing was wired by the failed calls
        assert!(session.link(&[a, b, gone]).is_err());
        assert!(session.linked_to(a, &Control::Timestep).is_empty());
        session.update(a, |viewer| viewer.go_to_step(1)).unwrap();
        assert_eq!(timestep(&session, b), 0);
    }

    #[test]
    fn test_link_some_components() {
        let (mut session, a, b) = session();
        session
            .link_components(&[a, b], &[ComponentKind::TimeStepper])
            .unwrap();

        session
            .update(a, |viewer| {
                viewer.batch(|viewer| {
                    viewer.go_to_step(1)?;
                    viewer.set_extra_dim_positions([("batch", 2)])
                })
            })
            .unwrap();

        assert_eq!(timestep(&session, b), 1);
        assert_eq!(batch(&session, b), 0);
    }

    #[test]
    fn test_unlinkable_pairs_are_skipped() {
        let mut session = Session::new();
        let a = session.add(explorer(config()));
        let b = session.add(explorer(ViewerConfig::default()));

        // b has no time stepper and two extra dimensions
        session.link(&[a, b]).unwrap();
        assert!(session.linked_to(a, &Control::Timestep).is_empty());
        assert!(session
            .linked_to(a, &Control::ExtraDim("batch".to_string()))
            .is_empty());

        session
            .update(a, |viewer| viewer.set_extra_dim_positions([("batch", 2)]))
            .unwrap();
        assert_eq!(batch(&session, b), 0);
    }

    #[test]
    fn test_three_viewers() {
        let mut session = Session::new();
        let ids: Vec<ViewerId> = (0..3).map(|_| session.add(explorer(config()))).collect();
        session.link(&ids).unwrap();

        session.update(ids[2], |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, ids[0]), 2);
        assert_eq!(timestep(&session, ids[1]), 2);
    }

    #[test]
    fn test_link_3d_viewers() {
        let mut session = Session::new();
        let surface = RecordingSurface::new();
        let mut viewer = Viewer::topoviz3d(config(), RecordingSurface::new());
        viewer.load_dataset(Arc::new(testing::dataset())).unwrap();
        let a = session.add(viewer);
        let mut viewer = Viewer::topoviz3d(config(), surface.clone());
        viewer.load_dataset(Arc::new(testing::dataset())).unwrap();
        let b = session.add(viewer);
        let c = session.add(explorer(config()));

        session.link(&[a, b, c]).unwrap();
        surface.take();

        let camera = Camera {
            position: [0.0, 5.0, 5.0],
            ..Camera::default()
        };
        session
            .update(a, |viewer| {
                viewer.set_camera(camera.clone())?;
                viewer.set_vertical_exaggeration(3.0)?;
                viewer.set_color_limits(0.0, 10.0)
            })
            .unwrap();

        assert_eq!(
            surface.take(),
            vec![RenderEvent::WarpFactor(3.0), RenderEvent::Camera(camera)]
        );
        assert_eq!(session.viewer(b).unwrap().color_limits().unwrap(), (0.0, 2400.0));

        // The explorer follows time but has nothing to do with the camera
        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, c), 2);
        assert!(session.linked_to(c, &Control::Camera).is_empty());
    }

    #[test]
    fn test_rejected_value_is_skipped() {
        let small = Dataset::new()
            .with_coord("time", Coordinate::index("time", vec![0_i64, 10]))
            .unwrap()
            .with_coord("y", Coordinate::index("y", vec![0_i64, 1]))
            .unwrap()
            .with_coord("x", Coordinate::index("x", vec![0_i64, 1]))
            .unwrap()
            .with_var(
                "topography__elevation",
                Variable::from_shape_vec(vec!["time", "y", "x"], &[2, 2, 2], vec![0.0; 8])
                    .unwrap(),
            )
            .unwrap();

        let mut session = Session::new();
        let a = session.add(explorer(config()));
        let mut viewer = Viewer::explorer(config());
        viewer.load_dataset(Arc::new(small)).unwrap();
        let b = session.add(viewer);
        session.link(&[a, b]).unwrap();

        session.update(a, |viewer| viewer.go_to_step(1)).unwrap();
        assert_eq!(timestep(&session, b), 1);

        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, a), 2);
        assert_eq!(timestep(&session, b), 1);
    }

    #[test]
    fn test_failed_update_still_propagates() {
        let (mut session, a, b) = session();
        session.link(&[a, b]).unwrap();

        let err = session
            .update(a, |viewer| {
                viewer.batch(|viewer| {
                    viewer.go_to_step(2)?;
                    viewer.go_to_step(9)
                })
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(timestep(&session, b), 2);
    }

    #[test]
    fn test_remove_viewer() {
        let (mut session, a, b) = session();
        session.link(&[a, b]).unwrap();

        let removed = session.remove(b).unwrap();
        assert_eq!(removed.timestep().unwrap(), 0);
        assert!(session.linked_to(a, &Control::Timestep).is_empty());
        assert_eq!(session.viewer_ids().collect::<Vec<_>>(), vec![a]);

        session.update(a, |viewer| viewer.go_to_step(1)).unwrap();
        assert_eq!(session.viewer(b).unwrap_err().kind(), ErrorKind::LinkType);
        assert!(session.remove(b).is_err());
    }

    #[test]
    fn test_remove_viewer_drops_single_viewer_links() {
        let mut session = Session::new();
        let ids: Vec<ViewerId> = (0..3).map(|_| session.add(explorer(config()))).collect();
        let pair = session.link(&ids[..2]).unwrap();
        let all = session.link(&ids).unwrap();

        session.remove(ids[1]).unwrap();
        assert!(!session.unlink(pair));

        session.update(ids[0], |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, ids[2]), 2);
        assert!(session.unlink(all));
    }

    #[test]
    fn test_overlapping_links_chain() {
        let mut session = Session::new();
        let ids: Vec<ViewerId> = (0..3).map(|_| session.add(explorer(config()))).collect();
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        session.link(&[a, b]).unwrap();
        session.link(&[b, c]).unwrap();

        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, b), 2);
        assert_eq!(timestep(&session, c), 2);

        session
            .update(c, |viewer| viewer.set_extra_dim_positions([("batch", 1)]))
            .unwrap();
        assert_eq!(batch(&session, a), 1);

        // Closing the loop: propagation stops once every endpoint has been set
        session.link(&[c, a]).unwrap();
        session.update(b, |viewer| viewer.go_to_step(1)).unwrap();
        for id in ids {
            assert_eq!(timestep(&session, id), 1);
        }
    }

    #[test]
    fn test_chain_stops_at_rejecting_viewer() {
        let short = Dataset::new()
            .with_coord("time", Coordinate::index("time", vec![0_i64, 10]))
            .unwrap()
            .with_coord("y", Coordinate::index("y", vec![0_i64, 1]))
            .unwrap()
            .with_coord("x", Coordinate::index("x", vec![0_i64, 1]))
            .unwrap()
            .with_var(
                "topography__elevation",
                Variable::from_shape_vec(vec!["time", "y", "x"], &[2, 2, 2], vec![0.0; 8])
                    .unwrap(),
            )
            .unwrap();

        let mut session = Session::new();
        let a = session.add(explorer(config()));
        let mut viewer = Viewer::explorer(config());
        viewer.load_dataset(Arc::new(short)).unwrap();
        let b = session.add(viewer);
        let c = session.add(explorer(config()));
        session.link_components(&[a, b], &[ComponentKind::TimeStepper]).unwrap();
        session.link_components(&[b, c], &[ComponentKind::TimeStepper]).unwrap();

        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(timestep(&session, b), 0);
        assert_eq!(timestep(&session, c), 0);
    }

    #[test]
    fn test_reload_rewires_links() {
        let (mut session, a, b) = session();
        session.link(&[a, b]).unwrap();
        assert_eq!(session.linked_to(a, &Control::Timestep), vec![(b, Control::Timestep)]);

        // Without a time dimension, b has no time stepper and two extra dimensions
        session
            .update(b, |viewer| {
                viewer.load_dataset_with(Arc::new(testing::dataset()), ViewConfig::new())
            })
            .unwrap();
        assert!(session.linked_to(a, &Control::Timestep).is_empty());
        assert!(session
            .linked_to(a, &Control::ExtraDim("batch".to_string()))
            .is_empty());
        assert!(session
            .linked_to(b, &Control::ExtraDim("time".to_string()))
            .is_empty());

        session.update(a, |viewer| viewer.go_to_step(2)).unwrap();
        assert_eq!(
            session.viewer(b).unwrap().extra_dims_positions().unwrap()["time"],
            0
        );

        // Back to the same roles as a: linked again
        session
            .update(b, |viewer| {
                viewer.load_dataset_with(
                    Arc::new(testing::dataset()),
                    ViewConfig::new().with_time_dim("time"),
                )
            })
            .unwrap();
        assert_eq!(session.linked_to(a, &Control::Timestep), vec![(b, Control::Timestep)]);
        session.update(a, |viewer| viewer.go_to_step(1)).unwrap();
        assert_eq!(timestep(&session, b), 1);
    }
}
