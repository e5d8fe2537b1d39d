//! [`GlApi`] over the driver's function pointers, via the `gl` crate.

use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::ptr;
use std::sync::Once;

use anyhow::{bail, Result};
use gl::types::{GLchar, GLenum, GLint, GLsizei, GLsizeiptr, GLuint};
use tracing::{debug, error};

use crate::api::GlApi;
use crate::types::*;

pub(crate) static GL_INIT_ONCE: Once = Once::new();

/// Forwards every call to the current OpenGL context.
///
/// Function pointers are process-global and loaded exactly once. The
/// context they were loaded from must be current on the calling thread for
/// every call; the type is `!Send` so it cannot wander to another thread.
#[derive(Debug)]
pub struct DriverGl {
    _not_send: PhantomData<*const ()>,
}

impl DriverGl {
    /// Load GL entry points through a windowing library's proc-address
    /// lookup (for instance `window.get_proc_address`).
    pub fn load_with<F>(loader: F) -> Result<Self>
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        GL_INIT_ONCE.call_once(|| gl::load_with(loader));
        Self::verify()
    }

    /// Load GL entry points for whatever context the host already made
    /// current, using the platform's native loader.
    pub fn from_current_context() -> Result<Self> {
        GL_INIT_ONCE.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        });
        Self::verify()
    }

    fn verify() -> Result<Self> {
        if !gl::GetString::is_loaded() || !gl::GenBuffers::is_loaded() {
            error!("OpenGL entry points failed to load");
            bail!("OpenGL entry points failed to load");
        }
        let version = unsafe { gl::GetString(gl::VERSION) };
        if version.is_null() {
            error!("no OpenGL context is current");
            bail!("no OpenGL context is current");
        }
        let version = unsafe { std::ffi::CStr::from_ptr(version.cast()) };
        debug!("OPENGL_VERSION {}", version.to_string_lossy());
        Ok(Self {
            _not_send: PhantomData,
        })
    }
}

fn get_integer(name: GLenum) -> GLint {
    let mut value = 0;
    unsafe { gl::GetIntegerv(name, &mut value) };
    value
}

fn gen_one(generate: unsafe fn(GLsizei, *mut GLuint)) -> Handle {
    let mut handle = 0;
    unsafe { generate(1, &mut handle) };
    handle
}

fn info_log(
    object: GLuint,
    get_iv: unsafe fn(GLuint, GLenum, *mut GLint),
    get_log: unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar),
) -> String {
    let mut len = 0;
    unsafe { get_iv(object, gl::INFO_LOG_LENGTH, &mut len) };
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    let mut written = 0;
    unsafe { get_log(object, len, &mut written, buf.as_mut_ptr().cast()) };
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

impl GlApi for DriverGl {
    fn gen_buffer(&self) -> Handle {
        gen_one(gl::GenBuffers)
    }

    fn delete_buffer(&self, buffer: Handle) {
        unsafe { gl::DeleteBuffers(1, &buffer) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Handle) {
        unsafe { gl::BindBuffer(target.gl_enum(), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe {
            gl::BufferData(
                target.gl_enum(),
                data.len() as GLsizeiptr,
                data.as_ptr().cast(),
                gl::STATIC_DRAW,
            )
        }
    }

    fn buffer_size(&self, target: BufferTarget) -> usize {
        let mut size = 0;
        unsafe { gl::GetBufferParameteriv(target.gl_enum(), gl::BUFFER_SIZE, &mut size) };
        size.max(0) as usize
    }

    fn get_buffer_sub_data(&self, target: BufferTarget, offset: usize, out: &mut [u8]) {
        unsafe {
            gl::GetBufferSubData(
                target.gl_enum(),
                offset as isize,
                out.len() as GLsizeiptr,
                out.as_mut_ptr().cast(),
            )
        }
    }

    fn gen_vertex_array(&self) -> Handle {
        gen_one(gl::GenVertexArrays)
    }

    fn delete_vertex_array(&self, vertex_array: Handle) {
        unsafe { gl::DeleteVertexArrays(1, &vertex_array) }
    }

    fn bind_vertex_array(&self, vertex_array: Handle) {
        unsafe { gl::BindVertexArray(vertex_array) }
    }

    fn vertex_attrib_pointer(&self, slot: u32, components: i32, stride: i32, offset: usize) {
        unsafe {
            gl::VertexAttribPointer(
                slot,
                components,
                gl::FLOAT,
                gl::FALSE,
                stride,
                offset as *const c_void,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        unsafe { gl::EnableVertexAttribArray(slot) }
    }

    fn gen_texture(&self) -> Handle {
        gen_one(gl::GenTextures)
    }

    fn delete_texture(&self, texture: Handle) {
        unsafe { gl::DeleteTextures(1, &texture) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { gl::ActiveTexture(gl::TEXTURE0 + unit) }
    }

    fn active_texture_unit(&self) -> u32 {
        (get_integer(gl::ACTIVE_TEXTURE) as u32).saturating_sub(gl::TEXTURE0)
    }

    fn max_texture_units(&self) -> u32 {
        get_integer(gl::MAX_TEXTURE_IMAGE_UNITS).max(0) as u32
    }

    fn bind_texture_2d(&self, texture: Handle) {
        unsafe { gl::BindTexture(gl::TEXTURE_2D, texture) }
    }

    fn tex_parameter(&self, parameter: TexParameter) {
        let (pname, param) = parameter.gl_pair();
        unsafe { gl::TexParameteri(gl::TEXTURE_2D, pname, param) }
    }

    fn tex_image_2d(&self, format: PixelFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        let data = pixels.map_or(ptr::null(), |p| p.as_ptr().cast());
        unsafe {
            // Rows are tightly packed; RGB rows are not 4-byte aligned.
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                format.gl_internal_format(),
                width as GLsizei,
                height as GLsizei,
                0,
                format.gl_format(),
                gl::UNSIGNED_BYTE,
                data,
            );
        }
    }

    fn generate_mipmap(&self) {
        unsafe { gl::GenerateMipmap(gl::TEXTURE_2D) }
    }

    fn texture_size(&self, level: i32) -> (u32, u32) {
        let (mut width, mut height) = (0, 0);
        unsafe {
            gl::GetTexLevelParameteriv(gl::TEXTURE_2D, level, gl::TEXTURE_WIDTH, &mut width);
            gl::GetTexLevelParameteriv(gl::TEXTURE_2D, level, gl::TEXTURE_HEIGHT, &mut height);
        }
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn get_tex_image(&self, format: PixelFormat, out: &mut [u8]) {
        unsafe {
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
            gl::GetTexImage(
                gl::TEXTURE_2D,
                0,
                format.gl_format(),
                gl::UNSIGNED_BYTE,
                out.as_mut_ptr().cast(),
            );
        }
    }

    fn gen_framebuffer(&self) -> Handle {
        gen_one(gl::GenFramebuffers)
    }

    fn delete_framebuffer(&self, framebuffer: Handle) {
        unsafe { gl::DeleteFramebuffers(1, &framebuffer) }
    }

    fn bind_framebuffer(&self, framebuffer: Handle) {
        unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer) }
    }

    fn framebuffer_texture_2d(&self, attachment: Attachment, texture: Handle) {
        unsafe {
            gl::FramebufferTexture2D(
                gl::FRAMEBUFFER,
                attachment.gl_enum(),
                gl::TEXTURE_2D,
                texture,
                0,
            )
        }
    }

    fn framebuffer_renderbuffer(&self, attachment: Attachment, renderbuffer: Handle) {
        unsafe {
            gl::FramebufferRenderbuffer(
                gl::FRAMEBUFFER,
                attachment.gl_enum(),
                gl::RENDERBUFFER,
                renderbuffer,
            )
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        FramebufferStatus::from_gl(unsafe { gl::CheckFramebufferStatus(gl::FRAMEBUFFER) })
    }

    fn gen_renderbuffer(&self) -> Handle {
        gen_one(gl::GenRenderbuffers)
    }

    fn delete_renderbuffer(&self, renderbuffer: Handle) {
        unsafe { gl::DeleteRenderbuffers(1, &renderbuffer) }
    }

    fn bind_renderbuffer(&self, renderbuffer: Handle) {
        unsafe { gl::BindRenderbuffer(gl::RENDERBUFFER, renderbuffer) }
    }

    fn renderbuffer_storage(&self, format: RenderbufferFormat, width: u32, height: u32) {
        unsafe {
            gl::RenderbufferStorage(
                gl::RENDERBUFFER,
                format.gl_enum(),
                width as GLsizei,
                height as GLsizei,
            )
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Handle {
        unsafe { gl::CreateShader(stage.gl_enum()) }
    }

    fn shader_source(&self, shader: Handle, source: &str) {
        let ptr: *const GLchar = source.as_ptr().cast();
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &ptr, &len) }
    }

    fn compile_shader(&self, shader: Handle) {
        unsafe { gl::CompileShader(shader) }
    }

    fn shader_compile_status(&self, shader: Handle) -> bool {
        let mut status = 0;
        unsafe { gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status) };
        status == gl::TRUE as GLint
    }

    fn shader_info_log(&self, shader: Handle) -> String {
        info_log(shader, gl::GetShaderiv, gl::GetShaderInfoLog)
    }

    fn delete_shader(&self, shader: Handle) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn create_program(&self) -> Handle {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: Handle, shader: Handle) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn link_program(&self, program: Handle) {
        unsafe { gl::LinkProgram(program) }
    }

    fn program_link_status(&self, program: Handle) -> bool {
        let mut status = 0;
        unsafe { gl::GetProgramiv(program, gl::LINK_STATUS, &mut status) };
        status == gl::TRUE as GLint
    }

    fn program_info_log(&self, program: Handle) -> String {
        info_log(program, gl::GetProgramiv, gl::GetProgramInfoLog)
    }

    fn delete_program(&self, program: Handle) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn use_program(&self, program: Handle) {
        unsafe { gl::UseProgram(program) }
    }

    fn uniform_location(&self, program: Handle, name: &str) -> i32 {
        match CString::new(name) {
            Ok(name) => unsafe { gl::GetUniformLocation(program, name.as_ptr()) },
            Err(_) => -1,
        }
    }

    fn uniform_1i(&self, location: i32, value: i32) {
        unsafe { gl::Uniform1i(location, value) }
    }

    fn uniform_1f(&self, location: i32, value: f32) {
        unsafe { gl::Uniform1f(location, value) }
    }

    fn uniform_3f(&self, location: i32, [x, y, z]: [f32; 3]) {
        unsafe { gl::Uniform3f(location, x, y, z) }
    }

    fn uniform_matrix_4fv(&self, location: i32, value: &[f32; 16]) {
        unsafe { gl::UniformMatrix4fv(location, 1, gl::FALSE, value.as_ptr()) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { gl::Viewport(x, y, width, height) }
    }

    fn get_viewport(&self) -> [i32; 4] {
        let mut dims = [0; 4];
        unsafe { gl::GetIntegerv(gl::VIEWPORT, dims.as_mut_ptr()) };
        dims
    }

    fn clear_color(&self, [r, g, b, a]: [f32; 4]) {
        unsafe { gl::ClearColor(r, g, b, a) }
    }

    fn clear(&self, mask: ClearMask) {
        unsafe { gl::Clear(mask.bits()) }
    }

    fn draw_arrays(&self, mode: Primitive, first: i32, count: i32) {
        unsafe { gl::DrawArrays(mode.gl_enum(), first, count) }
    }

    fn draw_elements(&self, mode: Primitive, count: i32) {
        unsafe { gl::DrawElements(mode.gl_enum(), count, gl::UNSIGNED_INT, ptr::null()) }
    }

    fn get_binding(&self, point: BindingPoint) -> Handle {
        get_integer(point.query_enum()).max(0) as Handle
    }

    fn get_error(&self) -> u32 {
        unsafe { gl::GetError() }
    }
}
