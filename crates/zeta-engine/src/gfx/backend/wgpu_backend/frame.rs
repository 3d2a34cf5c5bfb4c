use crate::gfx::backend::{
    BlendMode, PassConfig, ShaderProgramHandle, TextureHandle, VertexBufferHandle,
};

use super::pipeline::{DrawUniforms, UNIFORM_SLOTS};

/// One draw captured at `submit`.
#[derive(Debug, Copy, Clone)]
pub(super) struct DrawRecord {
    pub(super) pass: u16,
    pub(super) program: ShaderProgramHandle,
    pub(super) texture: TextureHandle,
    pub(super) buffer: VertexBufferHandle,
    pub(super) first_vertex: u32,
    pub(super) vertex_count: u32,
    pub(super) blend: BlendMode,
    pub(super) uniforms: DrawUniforms,
}

/// Bound state plus everything recorded since the last `end_frame`.
///
/// Passes are executed in index order; draws within a pass in submission order.
#[derive(Debug, Default)]
pub(super) struct FrameRecorder {
    passes: Vec<Option<PassConfig>>,
    draws: Vec<DrawRecord>,

    texture: Option<TextureHandle>,
    range: Option<(VertexBufferHandle, u32, u32)>,
    blend: BlendMode,
    slots: [[f32; 4]; UNIFORM_SLOTS],
}

impl FrameRecorder {
    pub(super) fn configure_pass(&mut self, index: u16, config: PassConfig) {
        let i = index as usize;
        if self.passes.len() <= i {
            self.passes.resize(i + 1, None);
        }
        self.passes[i] = Some(config);
    }

    pub(super) fn bind_texture(&mut self, texture: TextureHandle) {
        self.texture = Some(texture);
    }

    pub(super) fn bind_vertex_range(&mut self, buffer: VertexBufferHandle, first: u32, count: u32) {
        self.range = Some((buffer, first, count));
    }

    pub(super) fn set_blend(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    pub(super) fn set_slot(&mut self, slot: usize, value: [f32; 4]) {
        self.slots[slot] = value;
    }

    /// Captures the bound state as a draw and clears the per-draw bindings.
    pub(super) fn submit(&mut self, pass: u16, program: ShaderProgramHandle) {
        let Some(config) = self.passes.get(pass as usize).copied().flatten() else {
            log::warn!("submit to unconfigured pass {pass}; dropped");
            return;
        };
        let (Some(texture), Some((buffer, first_vertex, vertex_count))) =
            (self.texture.take(), self.range.take())
        else {
            log::warn!("submit without bound texture and vertex range; dropped");
            return;
        };

        let view_proj = config.proj * config.view;
        self.draws.push(DrawRecord {
            pass,
            program,
            texture,
            buffer,
            first_vertex,
            vertex_count,
            blend: self.blend,
            uniforms: DrawUniforms { view_proj: view_proj.to_cols_array_2d(), slots: self.slots },
        });
    }

    pub(super) fn passes(&self) -> impl Iterator<Item = (u16, &PassConfig)> {
        self.passes
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i as u16, p)))
    }

    pub(super) fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Indices into [`draws`](Self::draws) for `pass`, in submission order.
    pub(super) fn draws_in(&self, pass: u16) -> impl Iterator<Item = (usize, &DrawRecord)> {
        self.draws.iter().enumerate().filter(move |(_, d)| d.pass == pass)
    }

    /// Drops recorded passes and draws. Uniform values persist across frames.
    pub(super) fn finish_frame(&mut self) {
        self.passes.clear();
        self.draws.clear();
        self.texture = None;
        self.range = None;
        self.blend = BlendMode::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::gfx::backend::PassTarget;
    use glam::Mat4;

    fn pass() -> PassConfig {
        PassConfig {
            target: PassTarget::Screen,
            viewport: Rect::new(0.0, 0.0, 10.0, 10.0),
            view: Mat4::IDENTITY,
            proj: Mat4::from_scale(glam::Vec3::splat(2.0)),
            clear: None,
        }
    }

    #[test]
    fn submit_captures_bound_state_and_uniform_values() {
        let mut rec = FrameRecorder::default();
        rec.configure_pass(1, pass());
        rec.set_slot(0, [1.0, 2.0, 3.0, 4.0]);
        rec.bind_texture(TextureHandle(7));
        rec.bind_vertex_range(VertexBufferHandle(1), 6, 3);
        rec.set_blend(BlendMode::Additive);
        rec.submit(1, ShaderProgramHandle(2));

        let d = rec.draws()[0];
        assert_eq!((d.first_vertex, d.vertex_count), (6, 3));
        assert_eq!(d.texture, TextureHandle(7));
        assert_eq!(d.blend, BlendMode::Additive);
        assert_eq!(d.uniforms.slots[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(d.uniforms.view_proj[0][0], 2.0);
        assert_eq!(rec.passes().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn submit_to_unconfigured_pass_is_dropped() {
        let mut rec = FrameRecorder::default();
        rec.bind_texture(TextureHandle(1));
        rec.bind_vertex_range(VertexBufferHandle(1), 0, 3);
        rec.submit(0, ShaderProgramHandle(1));
        assert!(rec.draws().is_empty());
    }

    #[test]
    fn draws_grouped_by_pass_keep_submission_order() {
        let mut rec = FrameRecorder::default();
        rec.configure_pass(0, pass());
        rec.configure_pass(1, pass());
        for (pass, first) in [(1, 0), (0, 3), (1, 6)] {
            rec.bind_texture(TextureHandle(1));
            rec.bind_vertex_range(VertexBufferHandle(1), first, 3);
            rec.submit(pass, ShaderProgramHandle(1));
        }

        let firsts: Vec<u32> = rec.draws_in(1).map(|(_, d)| d.first_vertex).collect();
        assert_eq!(firsts, vec![0, 6]);

        rec.finish_frame();
        assert!(rec.draws().is_empty());
        assert_eq!(rec.passes().count(), 0);
    }
}
