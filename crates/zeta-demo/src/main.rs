//! Small game exercising the zeta renderer end to end.
//!
//! Arrow keys / WASD move the marker, space pauses the spinner, escape quits.
//! Set `ZETA_DEMO_FONT` to a TTF/OTF path to get text.

use anyhow::Context;
use glam::Mat4;

use zeta_engine::coords::{Color, Extent, Rect, Vec2};
use zeta_engine::core::{FrameCtx, Game, GameControl, TickCtx};
use zeta_engine::gfx::backend::{BlendMode, GfxBackend, TextureDesc, TextureFilter};
use zeta_engine::gfx::{Font, FontArrangement, ImageRgba8, Renderer, ResourceGroup, Texture, TextureDraw};
use zeta_engine::input::Key;
use zeta_engine::logging::{init_logging, LoggingConfig};
use zeta_engine::window::{Runtime, RuntimeConfig};

const FONT_ENV: &str = "ZETA_DEMO_FONT";
const FONT_PX: f32 = 22.0;

const CANVAS_SIZE: Extent = Extent::new(256, 256);
const MARKER_SPEED: f32 = 240.0;
const SPIN_SPEED: f32 = 1.5;

struct Assets {
    checker: Texture,
    canvas: Texture,
    font: Option<Font>,
}

#[derive(Default)]
struct Demo {
    group: Option<ResourceGroup>,
    assets: Option<Assets>,

    angle: f32,
    prev_angle: f32,
    marker: Vec2,
    prev_marker: Vec2,
    paused: bool,
}

impl Game for Demo {
    fn init<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>) -> anyhow::Result<()> {
        // Stored first so shutdown can release a partially built group.
        let group = self.group.insert(ResourceGroup::new("demo"));

        let checker = checker_image(Extent::new(64, 64), 8);
        let checker = renderer
            .upload_image(group, &checker, TextureFilter::Nearest)
            .context("checker texture")?;
        let canvas = renderer
            .create_render_target(group, TextureDesc::new(CANVAS_SIZE))
            .context("canvas render target")?;
        let font = load_demo_font(renderer, group)?;

        self.assets = Some(Assets { checker, canvas, font });
        self.marker = Vec2::new(160.0, 160.0);
        self.prev_marker = self.marker;
        Ok(())
    }

    fn tick(&mut self, ctx: &TickCtx<'_>) -> GameControl {
        let input = ctx.input;
        if input.key_pressed(Key::Escape) {
            return GameControl::Exit;
        }
        if input.key_pressed(Key::Space) {
            self.paused = !self.paused;
        }

        self.prev_angle = self.angle;
        self.prev_marker = self.marker;

        if !self.paused {
            self.angle += SPIN_SPEED * ctx.dt;
        }

        let dir = Vec2::new(
            input.axis(Key::ArrowLeft, Key::ArrowRight) + input.axis(Key::A, Key::D),
            input.axis(Key::ArrowUp, Key::ArrowDown) + input.axis(Key::W, Key::S),
        );
        self.marker += dir.normalized_or_zero() * (MARKER_SPEED * ctx.dt);

        GameControl::Continue
    }

    fn render<B: GfxBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) {
        let Some(assets) = self.assets.as_ref() else {
            return;
        };

        let alpha = ctx.alpha();
        let angle = lerp(self.prev_angle, self.angle, alpha);
        let marker = self.prev_marker + (self.marker - self.prev_marker) * alpha;
        let screen = ctx.screen_size();
        let cursor = ctx.input.cursor();
        let paused = self.paused;

        draw_canvas(&mut *ctx.renderer, assets, angle);

        ctx.screen_pass(Some(Color::rgb(0.06, 0.06, 0.09)), |r| {
            // Composited offscreen canvas, centred.
            r.draw_texture(
                &assets.canvas,
                &TextureDraw::at(screen * 0.5).with_origin(Vec2::HALF),
            );

            // Spinning checkers in the corners.
            for (i, corner) in [Vec2::new(80.0, 80.0), Vec2::new(screen.x - 80.0, screen.y - 80.0)]
                .into_iter()
                .enumerate()
            {
                let spin = if i == 0 { angle } else { -angle };
                r.draw_texture(
                    &assets.checker,
                    &TextureDraw::at(corner)
                        .with_origin(Vec2::HALF)
                        .with_rotation(spin)
                        .with_tint(Color::rgb(0.7, 0.9, 1.0)),
                );
            }

            // Frame around the screen and a crosshair at the cursor.
            r.draw_rect_outline(Rect::from_size(screen).inset(8.0), 2.0, Color::GRAY);
            if let Some(c) = cursor {
                r.draw_line(c - Vec2::new(10.0, 0.0), c + Vec2::new(10.0, 0.0), 1.5, Color::YELLOW);
                r.draw_line(c - Vec2::new(0.0, 10.0), c + Vec2::new(0.0, 10.0), 1.5, Color::YELLOW);
            }

            // Additive glow under the marker.
            r.set_blend_mode(BlendMode::Additive);
            r.draw_rect(Rect::new(marker.x - 20.0, marker.y - 20.0, 40.0, 40.0), Color::rgb(0.2, 0.1, 0.0));
            r.set_blend_mode(BlendMode::Alpha);
            r.draw_rect(Rect::new(marker.x - 8.0, marker.y - 8.0, 16.0, 16.0), Color::MAGENTA);

            if let Some(font) = assets.font.as_ref() {
                r.draw_string(font, "zeta", Vec2::new(screen.x * 0.5, 24.0), Vec2::new(0.5, 0.0), Color::WHITE);

                // Paused label flashes towards red through the blend shader.
                if paused {
                    r.set_blend_tint(Some(Color::RED.with_alpha(0.6)));
                    r.draw_string(font, "paused", screen - Vec2::splat(24.0), Vec2::ONE, Color::WHITE);
                    r.set_blend_tint(None);
                }
            }
        });
    }

    fn shutdown<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>) {
        self.assets = None;
        if let Some(mut group) = self.group.take() {
            renderer.destroy_group(&mut group);
        }
    }
}

/// Offscreen pass: a rotating checker and a diagonal inside a border.
fn draw_canvas<B: GfxBackend>(r: &mut Renderer<B>, assets: &Assets, angle: f32) {
    let size = CANVAS_SIZE.to_vec2();

    r.pass_begin_offscreen(&assets.canvas, Mat4::IDENTITY, Some(Color::rgb(0.12, 0.14, 0.2)));
    r.draw_texture(
        &assets.checker,
        &TextureDraw::at(size * 0.5)
            .with_origin(Vec2::HALF)
            .with_scale(Vec2::splat(2.0))
            .with_rotation(angle * 0.5),
    );
    r.draw_line(Vec2::ZERO, size, 3.0, Color::CYAN.with_alpha(0.8));
    r.draw_rect_outline(Rect::from_size(size), 4.0, Color::GREEN);
    r.pass_end();
}

fn checker_image(size: Extent, cell: u32) -> ImageRgba8 {
    ImageRgba8::from_fn(size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            [235, 235, 235, 255]
        } else {
            [40, 44, 64, 255]
        }
    })
}

fn load_demo_font<B: GfxBackend>(
    renderer: &mut Renderer<B>,
    group: &mut ResourceGroup,
) -> anyhow::Result<Option<Font>> {
    let Ok(path) = std::env::var(FONT_ENV) else {
        log::info!("{FONT_ENV} not set; running without text");
        return Ok(None);
    };

    let bytes = std::fs::read(&path).with_context(|| format!("failed to read font '{path}'"))?;
    let (arrangement, atlases) =
        FontArrangement::rasterize_ascii(&bytes, FONT_PX).with_context(|| format!("failed to rasterize '{path}'"))?;
    log::info!("font '{path}': {} glyphs in {} atlas(es)", arrangement.glyphs.len(), atlases.len());

    let font = renderer.load_font(group, arrangement, &atlases)?;
    Ok(Some(font))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "zeta demo".to_string(),
        initial_size: Extent::new(960, 600),
        ..RuntimeConfig::default()
    };

    Runtime::run(config, Demo::default())
}
