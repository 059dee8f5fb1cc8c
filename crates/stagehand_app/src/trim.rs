//! Additive-scene trimming
//!
//! An additively loaded scene usually carries its own audio listener and
//! input event system. Only one of each may be active, so both are stripped
//! from the additive scene and the base scene keeps its own.

use stagehand_host::{Component, SceneObject};

/// What [`trim_additive_scene`] removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimReport {
    /// Audio listener components removed, anywhere in the hierarchy
    pub listeners_removed: usize,
    /// Objects removed (with their subtrees) for carrying an event system
    pub objects_removed: usize,
}

/// Strip audio listeners and event-system objects from an additive scene
pub fn trim_additive_scene(roots: &mut Vec<SceneObject>) -> TrimReport {
    let mut report = TrimReport::default();
    for root in roots.iter_mut() {
        strip_listeners(root, &mut report);
    }
    remove_event_systems(roots, &mut report);
    report
}

/// Disable the audio listener on the first root camera that carries one
///
/// Run on the base scene before an additive load so the two scenes never
/// have live listeners at the same time.
pub fn mute_main_camera(roots: &mut [SceneObject]) -> bool {
    let camera = roots
        .iter_mut()
        .find(|o| o.has(&Component::Camera) && o.has(&Component::AudioListener));
    match camera {
        Some(camera) => {
            camera
                .components
                .retain(|component| *component != Component::AudioListener);
            true
        }
        None => false,
    }
}

fn strip_listeners(object: &mut SceneObject, report: &mut TrimReport) {
    let before = object.components.len();
    object
        .components
        .retain(|component| *component != Component::AudioListener);
    report.listeners_removed += before - object.components.len();

    for child in object.children.iter_mut() {
        strip_listeners(child, report);
    }
}

fn remove_event_systems(objects: &mut Vec<SceneObject>, report: &mut TrimReport) {
    objects.retain(|object| {
        let keep = !object.has(&Component::EventSystem);
        if !keep {
            log::debug!("Trimming '{}' (event system)", object.name);
            report.objects_removed += 1;
        }
        keep
    });

    for object in objects.iter_mut() {
        remove_event_systems(&mut object.children, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn additive_roots() -> Vec<SceneObject> {
        vec![
            SceneObject::new("Main Camera")
                .with_component(Component::Camera)
                .with_component(Component::AudioListener),
            SceneObject::new("EventSystem").with_component(Component::EventSystem),
            SceneObject::new("Level").with_child(
                SceneObject::new("Nested UI")
                    .with_component(Component::EventSystem)
                    .with_child(SceneObject::new("Speaker").with_component(Component::AudioListener)),
            ),
        ]
    }

    #[test]
    fn test_trim_removes_listeners_and_event_systems() {
        let mut roots = additive_roots();
        let report = trim_additive_scene(&mut roots);

        assert_eq!(report.listeners_removed, 2);
        assert_eq!(report.objects_removed, 2);

        let names: Vec<_> = roots.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Main Camera", "Level"]);
        assert!(roots[0].has(&Component::Camera));
        assert!(!roots[0].has(&Component::AudioListener));
        assert!(roots[1].children.is_empty());
    }

    #[test]
    fn test_mute_main_camera_only_touches_camera() {
        let mut roots = additive_roots();
        assert!(mute_main_camera(&mut roots));

        assert!(roots[0].has(&Component::Camera));
        assert!(!roots[0].has(&Component::AudioListener));
        assert_eq!(roots[2].count_in_tree(&Component::AudioListener), 1);
        assert!(!mute_main_camera(&mut roots));
    }

    #[test]
    fn test_trim_is_idempotent() {
        let mut roots = additive_roots();
        trim_additive_scene(&mut roots);
        assert_eq!(trim_additive_scene(&mut roots), TrimReport::default());
    }

    #[test]
    fn test_trim_leaves_plain_scene_alone() {
        let mut roots = vec![SceneObject::new("Terrain")
            .with_component(Component::Custom("Collider".into()))];
        let expected = roots.clone();

        assert_eq!(trim_additive_scene(&mut roots), TrimReport::default());
        assert_eq!(roots, expected);
    }
}
