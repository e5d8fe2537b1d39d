//! The GL entry points the wrapper layer is built on.
//!
//! [`GlApi`] is the seam between the resource wrappers and a concrete GL:
//! [`crate::DriverGl`] forwards to the loaded driver, [`crate::HeadlessGl`]
//! emulates the state machine in software. Every method maps onto a single
//! GL call and inherits its preconditions, most importantly that the object
//! being edited is currently bound.

use std::rc::Rc;

use crate::types::*;

/// Shared handle to the GL the wrappers talk to.
///
/// `Rc` keeps every wrapper on the thread that owns the context.
pub type Context = Rc<dyn GlApi>;

pub trait GlApi {
    // ---------------------------------------------------------------------
    // Buffers
    // ---------------------------------------------------------------------

    fn gen_buffer(&self) -> Handle;
    fn delete_buffer(&self, buffer: Handle);
    fn bind_buffer(&self, target: BufferTarget, buffer: Handle);
    /// Allocate and fill immutable-content (`STATIC_DRAW`) storage for the
    /// buffer bound at `target`.
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);
    /// `GL_BUFFER_SIZE` of the buffer bound at `target`.
    fn buffer_size(&self, target: BufferTarget) -> usize;
    fn get_buffer_sub_data(&self, target: BufferTarget, offset: usize, out: &mut [u8]);

    // ---------------------------------------------------------------------
    // Vertex arrays
    // ---------------------------------------------------------------------

    fn gen_vertex_array(&self) -> Handle;
    fn delete_vertex_array(&self, vertex_array: Handle);
    fn bind_vertex_array(&self, vertex_array: Handle);
    /// Float attribute sourced from the bound array buffer. `stride` and
    /// `offset` are in bytes.
    fn vertex_attrib_pointer(&self, slot: u32, components: i32, stride: i32, offset: usize);
    fn enable_vertex_attrib_array(&self, slot: u32);

    // ---------------------------------------------------------------------
    // Textures
    // ---------------------------------------------------------------------

    fn gen_texture(&self) -> Handle;
    fn delete_texture(&self, texture: Handle);
    /// Select `GL_TEXTURE0 + unit`.
    fn active_texture(&self, unit: u32);
    fn active_texture_unit(&self) -> u32;
    fn max_texture_units(&self) -> u32;
    fn bind_texture_2d(&self, texture: Handle);
    fn tex_parameter(&self, parameter: TexParameter);
    /// Define level 0 of the bound texture. `pixels` of `None` allocates
    /// storage without content.
    fn tex_image_2d(&self, format: PixelFormat, width: u32, height: u32, pixels: Option<&[u8]>);
    fn generate_mipmap(&self);
    /// Width and height of `level` of the bound texture.
    fn texture_size(&self, level: i32) -> (u32, u32);
    /// Read level 0 of the bound texture back as tightly packed `format`.
    fn get_tex_image(&self, format: PixelFormat, out: &mut [u8]);

    // ---------------------------------------------------------------------
    // Framebuffers and renderbuffers
    // ---------------------------------------------------------------------

    fn gen_framebuffer(&self) -> Handle;
    fn delete_framebuffer(&self, framebuffer: Handle);
    fn bind_framebuffer(&self, framebuffer: Handle);
    fn framebuffer_texture_2d(&self, attachment: Attachment, texture: Handle);
    fn framebuffer_renderbuffer(&self, attachment: Attachment, renderbuffer: Handle);
    fn check_framebuffer_status(&self) -> FramebufferStatus;

    fn gen_renderbuffer(&self) -> Handle;
    fn delete_renderbuffer(&self, renderbuffer: Handle);
    fn bind_renderbuffer(&self, renderbuffer: Handle);
    fn renderbuffer_storage(&self, format: RenderbufferFormat, width: u32, height: u32);

    // ---------------------------------------------------------------------
    // Shaders and programs
    // ---------------------------------------------------------------------

    fn create_shader(&self, stage: ShaderStage) -> Handle;
    fn shader_source(&self, shader: Handle, source: &str);
    fn compile_shader(&self, shader: Handle);
    fn shader_compile_status(&self, shader: Handle) -> bool;
    fn shader_info_log(&self, shader: Handle) -> String;
    fn delete_shader(&self, shader: Handle);

    fn create_program(&self) -> Handle;
    fn attach_shader(&self, program: Handle, shader: Handle);
    fn link_program(&self, program: Handle);
    fn program_link_status(&self, program: Handle) -> bool;
    fn program_info_log(&self, program: Handle) -> String;
    fn delete_program(&self, program: Handle);
    fn use_program(&self, program: Handle);

    /// `-1` when `name` is not an active uniform of `program`.
    fn uniform_location(&self, program: Handle, name: &str) -> i32;
    fn uniform_1i(&self, location: i32, value: i32);
    fn uniform_1f(&self, location: i32, value: f32);
    fn uniform_3f(&self, location: i32, value: [f32; 3]);
    /// Column-major 4x4 matrix.
    fn uniform_matrix_4fv(&self, location: i32, value: &[f32; 16]);

    // ---------------------------------------------------------------------
    // Drawing
    // ---------------------------------------------------------------------

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn get_viewport(&self) -> [i32; 4];
    fn clear_color(&self, color: [f32; 4]);
    fn clear(&self, mask: ClearMask);
    fn draw_arrays(&self, mode: Primitive, first: i32, count: i32);
    /// Indexed draw of `u32` indices from the bound vertex array's element
    /// buffer.
    fn draw_elements(&self, mode: Primitive, count: i32);

    // ---------------------------------------------------------------------
    // State queries
    // ---------------------------------------------------------------------

    /// Current occupant of `point`, or [`DEFAULT_HANDLE`].
    fn get_binding(&self, point: BindingPoint) -> Handle;
    /// Pop the oldest error flag, `GL_NO_ERROR` when none are set.
    fn get_error(&self) -> u32;
}
