use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use scheduler::{FrameCallback, FrameScheduler};
use wgl::{Gl, GlContext};

use crate::target::RenderTarget;

pub struct ImageScene<G: Gl> {
    ctx: GlContext<G>,
    targets: Vec<(String, RenderTarget)>,
    frames: u64,
}

impl<G: Gl> ImageScene<G> {
    pub fn new(gl: G) -> Self {
        Self {
            ctx: GlContext::new(gl),
            targets: Vec::new(),
            frames: 0,
        }
    }

    pub fn context(&self) -> &GlContext<G> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GlContext<G> {
        &mut self.ctx
    }

    pub fn add_target(&mut self, name: impl Into<String>) -> &mut RenderTarget {
        let name = name.into();
        let target = RenderTarget::new(&mut self.ctx);
        let index = match self.targets.iter().position(|(existing, _)| *existing == name) {
            Some(index) => {
                self.targets[index].1 = target;
                index
            }
            None => {
                self.targets.push((name, target));
                self.targets.len() - 1
            }
        };
        &mut self.targets[index].1
    }

    pub fn target(&self, name: &str) -> Option<&RenderTarget> {
        self.targets
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, target)| target)
    }

    pub fn target_mut(&mut self, name: &str) -> Option<&mut RenderTarget> {
        self.targets
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, target)| target)
    }

    pub fn target_with_context(
        &mut self,
        name: &str,
    ) -> Option<(&mut RenderTarget, &mut GlContext<G>)> {
        let target = self
            .targets
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, target)| target)?;
        Some((target, &mut self.ctx))
    }

    pub fn targets(&self) -> impl Iterator<Item = (&str, &RenderTarget)> {
        self.targets
            .iter()
            .map(|(name, target)| (name.as_str(), target))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Applies a visibility change pushed in by the host. Returns `false`
    /// for unknown names.
    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.target_mut(name) {
            Some(target) => {
                target.set_active(visible);
                true
            }
            None => false,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Renders every target once. Skips the whole frame while the context is
    /// lost. Returns how many targets drew.
    pub fn render(&mut self, now: Instant) -> usize {
        if self.ctx.is_lost() {
            tracing::debug!("context lost; frame skipped");
            return 0;
        }
        let ctx = &mut self.ctx;
        let drawn = self
            .targets
            .iter_mut()
            .filter(|(_, target)| target.state() != crate::TargetState::Uninitialized)
            .map(|(_, target)| target.render_target(ctx, now))
            .filter(|drew| *drew)
            .count();
        self.frames += 1;
        drawn
    }
}

impl<G: Gl + 'static> ImageScene<G> {
    /// A callback that renders the scene and re-registers itself every tick.
    /// The loop ends when the context is lost or the scene is dropped.
    pub fn frame_callback(scene: &Rc<RefCell<Self>>) -> FrameCallback {
        let scene = Rc::downgrade(scene);
        FrameCallback::new(move |frame| {
            let Some(scene) = scene.upgrade() else {
                return;
            };
            let mut scene = scene.borrow_mut();
            if scene.ctx.is_lost() {
                tracing::warn!("graphics context lost; render loop stopped");
                return;
            }
            scene.render(frame.now());
            frame.request_again();
        })
    }

    /// Starts the render loop on `scheduler`. Keep the returned callback to
    /// compare against later requests.
    pub fn schedule(scene: &Rc<RefCell<Self>>, scheduler: &mut FrameScheduler) -> FrameCallback {
        let callback = Self::frame_callback(scene);
        scheduler.request_frame(&callback);
        callback
    }
}
