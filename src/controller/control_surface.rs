//! The on-screen controller of one session.
//!
//! Owns the held-button set, the d-pad sampler and the synthesizer, and runs
//! every input event to completion synchronously: nothing in here awaits.

use crate::controller::button_registry::{LogicalButton, Profile};
use crate::controller::dpad_sampler::{DirectionState, DpadSampler, PadGeometry, PointerEvent};
use crate::controller::edge_detector::{ButtonEdge, EdgeDetector};
use crate::controller::event_synthesizer::{DispatchError, EventSynthesizer};
use crate::engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Vibration motor, when the platform has one.
pub trait Haptics: Send + Sync {
    fn vibrate(&self, duration: Duration) -> Result<(), DispatchError>;
}

#[derive(Clone, Debug)]
pub struct InputSettings {
    pub dead_zone: f32,
    /// Pulse length on press; zero disables haptics
    pub haptic_pulse: Duration,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            dead_zone: crate::controller::dpad_sampler::DEFAULT_DEAD_ZONE,
            haptic_pulse: Duration::from_millis(8),
        }
    }
}

pub struct ControlSurface {
    profile: &'static Profile,
    detector: EdgeDetector,
    dpad: DpadSampler,
    synthesizer: EventSynthesizer,
    haptics: Option<Box<dyn Haptics>>,
    settings: InputSettings,
}

impl ControlSurface {
    pub fn new(
        profile: &'static Profile,
        pad: PadGeometry,
        settings: InputSettings,
        synthesizer: EventSynthesizer,
    ) -> Self {
        info!(
            "Control surface mounted with profile {} (dead zone {})",
            profile.name, settings.dead_zone
        );
        Self {
            profile,
            detector: EdgeDetector::new(),
            dpad: DpadSampler::new(pad, settings.dead_zone),
            synthesizer,
            haptics: None,
            settings,
        }
    }

    pub fn with_haptics(mut self, haptics: Box<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn profile(&self) -> &'static Profile {
        self.profile
    }

    pub fn is_pressed(&self, button: LogicalButton) -> bool {
        self.detector.is_pressed(button)
    }

    pub fn held(&self) -> Vec<LogicalButton> {
        self.detector.active().collect()
    }

    pub fn directions(&self) -> DirectionState {
        self.dpad.state()
    }

    pub fn synthesizer(&self) -> &EventSynthesizer {
        &self.synthesizer
    }

    pub(crate) fn attach_engine(&mut self, engine: Arc<dyn Engine>) {
        self.synthesizer.attach_engine(engine);
    }

    pub(crate) fn detach_engine(&mut self) {
        self.synthesizer.detach_engine();
    }

    pub fn set_pad_geometry(&mut self, pad: PadGeometry) {
        self.dpad.set_geometry(pad);
    }

    /// Applies the desired state of one button and emits the edge, if any.
    pub fn set_pressed(&mut self, button: LogicalButton, pressed: bool) -> Option<ButtonEdge> {
        let edge = self.detector.set_pressed(button, pressed)?;
        self.synthesizer.emit(self.profile, edge);
        if edge.transition.is_press() {
            self.pulse();
        }
        Some(edge)
    }

    pub fn button_down(&mut self, button: LogicalButton) -> Option<ButtonEdge> {
        self.set_pressed(button, true)
    }

    /// Also used for touch-end and mouse-leave on a button region.
    pub fn button_up(&mut self, button: LogicalButton) -> Option<ButtonEdge> {
        self.set_pressed(button, false)
    }

    /// Feeds a pointer event from the d-pad region.
    pub fn handle_pad(&mut self, event: PointerEvent) -> Vec<ButtonEdge> {
        let Some(state) = self.dpad.handle(event) else {
            return Vec::new();
        };
        state
            .buttons()
            .into_iter()
            .filter_map(|(button, pressed)| self.set_pressed(button, pressed))
            .collect()
    }

    /// Switches the profile. Held buttons are released under the outgoing
    /// profile first so the engine never keeps a key the new map can't lift.
    pub fn set_profile(&mut self, profile: &'static Profile) -> Vec<ButtonEdge> {
        if std::ptr::eq(self.profile, profile) {
            return Vec::new();
        }
        let released = self.release_all();
        info!("Switching profile {} -> {}", self.profile.name, profile.name);
        self.profile = profile;
        released
    }

    /// Force-releases every held button and re-centers the pad.
    pub fn release_all(&mut self) -> Vec<ButtonEdge> {
        self.dpad.release();
        let edges = self.detector.release_all();
        for edge in &edges {
            self.synthesizer.emit(self.profile, *edge);
        }
        if !edges.is_empty() {
            debug!("Force-released {} buttons", edges.len());
        }
        edges
    }

    fn pulse(&self) {
        if self.settings.haptic_pulse.is_zero() {
            return;
        }
        if let Some(haptics) = &self.haptics {
            if let Err(e) = haptics.vibrate(self.settings.haptic_pulse) {
                warn!("Haptic pulse failed: {}", e);
            }
        }
    }
}

impl Drop for ControlSurface {
    fn drop(&mut self) {
        // unmount must not leave keys stuck in the engine
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::button_registry::{RETROARCH_PROFILE, WASD_PROFILE};
    use crate::controller::dpad_sampler::PointerContact;
    use crate::controller::edge_detector::Transition;
    use crate::controller::event_synthesizer::tests::RecordingTarget;
    use crate::controller::event_synthesizer::KeyEventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct CountingHaptics(Arc<AtomicUsize>);

    impl Haptics for CountingHaptics {
        fn vibrate(&self, _duration: Duration) -> Result<(), DispatchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::Unsupported("vibrate"))
        }
    }

    fn surface() -> (ControlSurface, RecordingTarget, CountingHaptics) {
        let target = RecordingTarget::default();
        let haptics = CountingHaptics::default();
        let synthesizer = EventSynthesizer::new().with_surface(Box::new(target.clone()));
        let surface = ControlSurface::new(
            &RETROARCH_PROFILE,
            PadGeometry::from_rect(0.0, 0.0, 200.0, 200.0),
            InputSettings::default(),
            synthesizer,
        )
        .with_haptics(Box::new(haptics.clone()));
        (surface, target, haptics)
    }

    #[test]
    fn dragging_across_the_pad_emits_only_changes() {
        let (mut surface, target, _) = surface();

        surface.handle_pad(PointerEvent::Down(PointerContact::touch(1, 100.0, 10.0)));
        for step in 0..30 {
            // jitter along the top edge keeps UP held
            let x = 95.0 + (step % 3) as f32;
            surface.handle_pad(PointerEvent::Move(PointerContact::touch(1, x, 12.0)));
        }
        let edges = surface.handle_pad(PointerEvent::Move(PointerContact::touch(1, 190.0, 12.0)));
        assert_eq!(edges, vec![ButtonEdge::press(LogicalButton::Right)]);

        let edges = surface.handle_pad(PointerEvent::Up { id: 1 });
        assert_eq!(edges.len(), 2);

        let kinds: Vec<_> = target.taken().iter().map(|e| (e.code, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("ArrowUp", KeyEventKind::KeyDown),
                ("ArrowRight", KeyEventKind::KeyDown),
                ("ArrowUp", KeyEventKind::KeyUp),
                ("ArrowRight", KeyEventKind::KeyUp),
            ]
        );
    }

    #[test]
    fn haptics_fire_once_per_press_and_failures_are_ignored() {
        let (mut surface, _, haptics) = surface();
        surface.button_down(LogicalButton::A);
        surface.button_down(LogicalButton::A);
        surface.button_up(LogicalButton::A);
        surface.button_down(LogicalButton::A);
        assert_eq!(haptics.0.load(Ordering::SeqCst), 2);
        assert!(surface.is_pressed(LogicalButton::A));
    }

    #[test]
    fn profile_switch_releases_under_old_profile() {
        let (mut surface, target, _) = surface();
        surface.button_down(LogicalButton::Up);

        let released = surface.set_profile(&WASD_PROFILE);
        assert_eq!(released, vec![ButtonEdge::release(LogicalButton::Up)]);
        assert!(surface.held().is_empty());

        surface.button_down(LogicalButton::Up);
        let codes: Vec<_> = target.taken().iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["ArrowUp", "ArrowUp", "KeyW"]);
    }

    #[test]
    fn dropping_the_surface_releases_held_keys() {
        let (mut surface, target, _) = surface();
        surface.button_down(LogicalButton::L);
        surface.button_down(LogicalButton::R);
        drop(surface);

        let ups = target
            .taken()
            .iter()
            .filter(|e| e.kind == KeyEventKind::KeyUp)
            .count();
        assert_eq!(ups, 2);
    }

    #[test]
    fn pad_keeps_working_after_a_second_finger_lifts() {
        let (mut surface, _, _) = surface();
        surface.handle_pad(PointerEvent::Down(PointerContact::touch(1, 100.0, 10.0)));
        surface.handle_pad(PointerEvent::Down(PointerContact::touch(2, 150.0, 150.0)));
        surface.handle_pad(PointerEvent::Up { id: 2 });
        assert!(surface.held().is_empty());

        let edges = surface.handle_pad(PointerEvent::Move(PointerContact::touch(1, 100.0, 10.0)));
        assert_eq!(edges, vec![ButtonEdge::press(LogicalButton::Up)]);
        surface.handle_pad(PointerEvent::Move(PointerContact::touch(1, 0.0, 100.0)));
        assert!(surface.is_pressed(LogicalButton::Left));
        assert!(!surface.is_pressed(LogicalButton::Up));
    }

    #[test]
    fn mouse_leave_on_a_button_releases_it() {
        let (mut surface, _, _) = surface();
        surface.button_down(LogicalButton::Select);
        let edge = surface.button_up(LogicalButton::Select);
        assert_eq!(edge.map(|e| e.transition), Some(Transition::Release));
    }
}
