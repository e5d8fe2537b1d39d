//! Render-to-texture: draw two textured cubes on a floor into an offscreen
//! target, then draw that target's colour texture onto a full-screen quad.
//!
//! Runs on the headless backend so no window is needed. `RUST_LOG=debug`
//! shows every object the wrappers create and delete.

use std::rc::Rc;

use anyhow::{bail, Context as _, Result};
use glam::{Mat4, Vec3};
use glkit::{
    frame, Buffer, Layout, Mesh, MeshTexture, RenderTarget, RenderTargetConfig, ShaderProgram,
    Texture, TextureKind, TextureParams, Vertex, VertexArray,
};
use glkit_core::logging::{init_logging, LoggingConfig};
use glkit_core::state::{clear_errors, reset_bindings, SavedBindings};
use glkit_core::{ClearMask, Context, HeadlessGl};
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{info, warn};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const FRAMES: u32 = 3;

const SCENE_VERTEX: &str = r#"
#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec3 aNormal;
layout (location = 2) in vec2 aTexCoords;

out vec2 TexCoords;

uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;

void main()
{
    TexCoords = aTexCoords;
    gl_Position = projection * view * model * vec4(aPos, 1.0);
}
"#;

const SCENE_FRAGMENT: &str = r#"
#version 330 core
struct Material {
    sampler2D texture_diffuse1;
};

in vec2 TexCoords;
out vec4 FragColor;

uniform Material material;

void main()
{
    FragColor = texture(material.texture_diffuse1, TexCoords);
}
"#;

const SCREEN_VERTEX: &str = r#"
#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoords;

out vec2 TexCoords;

void main()
{
    TexCoords = aTexCoords;
    gl_Position = vec4(aPos.x, aPos.y, 0.0, 1.0);
}
"#;

const SCREEN_FRAGMENT: &str = r#"
#version 330 core
out vec4 FragColor;

in vec2 TexCoords;

uniform sampler2D screenTexture;

void main()
{
    vec3 col = texture(screenTexture, TexCoords).rgb;
    FragColor = vec4(col, 1.0);
}
"#;

// pos3, normal3, tex2; texcoords above 1 repeat the floor texture.
#[rustfmt::skip]
const PLANE: [f32; 48] = [
     5.0, -0.5,  5.0,  0.0, 1.0, 0.0,  2.0, 0.0,
    -5.0, -0.5,  5.0,  0.0, 1.0, 0.0,  0.0, 0.0,
    -5.0, -0.5, -5.0,  0.0, 1.0, 0.0,  0.0, 2.0,

     5.0, -0.5,  5.0,  0.0, 1.0, 0.0,  2.0, 0.0,
    -5.0, -0.5, -5.0,  0.0, 1.0, 0.0,  0.0, 2.0,
     5.0, -0.5, -5.0,  0.0, 1.0, 0.0,  2.0, 2.0,
];

// Full-screen quad in NDC: pos3, tex2.
#[rustfmt::skip]
const QUAD: [f32; 30] = [
    -1.0,  1.0, 0.0,  0.0, 1.0,
    -1.0, -1.0, 0.0,  0.0, 0.0,
     1.0, -1.0, 0.0,  1.0, 0.0,

    -1.0,  1.0, 0.0,  0.0, 1.0,
     1.0, -1.0, 0.0,  1.0, 0.0,
     1.0,  1.0, 0.0,  1.0, 1.0,
];

/// Unit cube centred on the origin, four vertices per face.
fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];
    let corners: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(faces.len() * corners.len());
    let mut indices = Vec::with_capacity(faces.len() * 6);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (s, t) in corners {
            let position = (normal + u * s + v * t) * 0.5;
            vertices.push(Vertex::new(
                position.to_array(),
                normal.to_array(),
                [(s + 1.0) * 0.5, (t + 1.0) * 0.5],
            ));
        }
        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn checkerboard(size: u32, cell: u32, a: [u8; 3], b: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgb(a)
        } else {
            Rgb(b)
        }
    }))
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let headless = Rc::new(HeadlessGl::new());
    let ctx: Context = headless.clone();
    frame::set_viewport(&ctx, WIDTH, HEIGHT);

    let scene_shader = ShaderProgram::from_sources(&ctx, SCENE_VERTEX, SCENE_FRAGMENT)
        .context("building scene shader")?;
    let screen_shader = ShaderProgram::from_sources(&ctx, SCREEN_VERTEX, SCREEN_FRAGMENT)
        .context("building screen shader")?;

    let container = Texture::from_image(
        &ctx,
        checkerboard(64, 8, [181, 137, 88], [92, 64, 40]),
        TextureParams::default(),
    )
    .context("uploading cube texture")?;
    let metal = Texture::from_image(
        &ctx,
        checkerboard(64, 16, [150, 150, 160], [90, 90, 100]),
        TextureParams::default(),
    )
    .context("uploading floor texture")?;

    let (cube_vertices, cube_indices) = cube();
    let cube = Mesh::new(
        &ctx,
        &cube_vertices,
        &cube_indices,
        vec![MeshTexture {
            texture: Rc::new(container),
            kind: TextureKind::Diffuse,
        }],
    )?;
    let plane = VertexArray::with_buffers(
        &ctx,
        Buffer::vertex(&ctx, &PLANE),
        None,
        Layout::PosNormalTex,
    )?;
    let quad = VertexArray::with_buffers(&ctx, Buffer::vertex(&ctx, &QUAD), None, Layout::PosTex)?;

    let mut target = RenderTarget::new(&ctx, RenderTargetConfig::with_size(WIDTH, HEIGHT))
        .context("creating offscreen target")?;
    let offscreen = target.framebuffer().handle();

    let projection = Mat4::perspective_rh_gl(
        45f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        100.0,
    );
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);

    for index in 0..FRAMES {
        let time = index as f32 / 60.0;

        // First pass: the scene into the offscreen target.
        {
            let _target = target.bind();
            frame::clear(&ctx, [0.1, 0.1, 0.1, 1.0], ClearMask::COLOR | ClearMask::DEPTH);

            let scene = scene_shader.use_program();
            scene.set_mat4("view", &view);
            scene.set_mat4("projection", &projection);
            for offset in [Vec3::new(-1.0, 0.0, -1.0), Vec3::new(2.0, 0.0, 0.0)] {
                let model = Mat4::from_translation(offset) * Mat4::from_rotation_y(time);
                scene.set_mat4("model", &model);
                cube.draw(&scene);
            }
            metal.activate_sampler(&scene, "material.texture_diffuse1", 0);
            scene.set_mat4("model", &Mat4::IDENTITY);
            plane.draw()?;
        }

        // Second pass: the target's colour texture over the whole screen.
        frame::clear(&ctx, [1.0, 1.0, 1.0, 1.0], ClearMask::COLOR);
        {
            let screen = screen_shader.use_program();
            target.color().activate_sampler(&screen, "screenTexture", 0);
            quad.draw()?;
        }

        let draws = headless.draw_calls();
        let offscreen_draws = draws.iter().filter(|d| d.framebuffer == offscreen).count();
        let errors = clear_errors(ctx.as_ref());
        info!(
            frame = index,
            draws = draws.len(),
            offscreen_draws,
            clears = headless.clears().len(),
            errors = errors.len(),
            "frame rendered"
        );
        if !errors.is_empty() {
            bail!("frame {index} raised GL errors: {errors:?}");
        }

        reset_bindings(ctx.as_ref());
        if !SavedBindings::save(ctx.as_ref()).is_default() {
            warn!(frame = index, "bindings left behind after reset");
        }
        headless.reset_frame_log();
    }

    drop((cube, plane, quad, target, metal, scene_shader, screen_shader));
    info!(
        live_objects = headless.live_objects(),
        "released every GL object"
    );
    Ok(())
}
