//! A software [`GlApi`] that tracks GL object and binding state without a
//! driver.
//!
//! `HeadlessGl` follows the parts of the OpenGL 3.3 core state machine that
//! the wrappers depend on:
//!
//! - one occupant per binding point, with the element-array binding stored
//!   in the bound vertex array
//! - per-unit 2D texture bindings behind an active unit selector
//! - buffer and texture contents kept for readback
//! - framebuffer completeness derived from the attachments
//! - shader compile/link outcomes and uniform values per program
//! - a log of issued draw calls
//!
//! Nothing is rasterised. Calls that GL would reject set an error flag that
//! [`GlApi::get_error`] reports, and otherwise leave state untouched.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::api::GlApi;
use crate::types::*;

const MAX_TEXTURE_UNITS: u32 = 16;

/// One recorded `glVertexAttribPointer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub components: i32,
    /// Bytes between consecutive vertices.
    pub stride: i32,
    /// Byte offset of the first component.
    pub offset: usize,
    /// Array buffer bound when the pointer was declared.
    pub buffer: Handle,
    pub enabled: bool,
}

/// Snapshot of a texture's storage.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<PixelFormat>,
    pub has_content: bool,
    pub mipmapped: bool,
    pub parameters: Vec<TexParameter>,
}

/// Last value written to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Mat4([f32; 16]),
}

/// One recorded draw call with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mode: Primitive,
    pub count: i32,
    pub indexed: bool,
    pub vertex_array: Handle,
    pub program: Handle,
    pub framebuffer: Handle,
    /// Non-zero 2D texture bindings as `(unit, texture)`.
    pub textures: Vec<(u32, Handle)>,
}

#[derive(Debug, Default)]
struct VertexArrayState {
    element_buffer: Handle,
    attributes: BTreeMap<u32, AttribPointer>,
}

#[derive(Debug, Default)]
struct TextureState {
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    pixels: Option<Vec<u8>>,
    mipmapped: bool,
    parameters: Vec<TexParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attached {
    Texture(Handle),
    Renderbuffer(Handle),
}

#[derive(Debug, Default)]
struct RenderbufferState {
    storage: Option<(RenderbufferFormat, u32, u32)>,
}

#[derive(Debug)]
struct ShaderState {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramState {
    shaders: Vec<Handle>,
    linked: bool,
    log: String,
    declared_uniforms: Vec<String>,
    locations: HashMap<String, i32>,
    values: HashMap<i32, UniformValue>,
}

#[derive(Debug)]
struct State {
    next_handle: Handle,
    buffers: HashMap<Handle, Vec<u8>>,
    array_buffer: Handle,
    vertex_arrays: HashMap<Handle, VertexArrayState>,
    vertex_array: Handle,
    textures: HashMap<Handle, TextureState>,
    active_unit: u32,
    unit_textures: Vec<Handle>,
    framebuffers: HashMap<Handle, BTreeMap<Attachment, Attached>>,
    framebuffer: Handle,
    renderbuffers: HashMap<Handle, RenderbufferState>,
    renderbuffer: Handle,
    shaders: HashMap<Handle, ShaderState>,
    programs: HashMap<Handle, ProgramState>,
    program: Handle,
    viewport: [i32; 4],
    clear_color: [f32; 4],
    clears: Vec<(Handle, ClearMask)>,
    draws: Vec<DrawCall>,
    errors: VecDeque<u32>,
}

impl State {
    fn new() -> Self {
        let mut vertex_arrays = HashMap::new();
        // The default vertex array holds element bindings made while no
        // array is bound.
        vertex_arrays.insert(DEFAULT_HANDLE, VertexArrayState::default());
        Self {
            next_handle: 1,
            buffers: HashMap::new(),
            array_buffer: DEFAULT_HANDLE,
            vertex_arrays,
            vertex_array: DEFAULT_HANDLE,
            textures: HashMap::new(),
            active_unit: 0,
            unit_textures: vec![DEFAULT_HANDLE; MAX_TEXTURE_UNITS as usize],
            framebuffers: HashMap::new(),
            framebuffer: DEFAULT_HANDLE,
            renderbuffers: HashMap::new(),
            renderbuffer: DEFAULT_HANDLE,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            program: DEFAULT_HANDLE,
            viewport: [0; 4],
            clear_color: [0.0; 4],
            clears: Vec::new(),
            draws: Vec::new(),
            errors: VecDeque::new(),
        }
    }

    fn next(&mut self) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn fail(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    fn current_vertex_array(&mut self) -> &mut VertexArrayState {
        self.vertex_arrays.entry(self.vertex_array).or_default()
    }

    fn bound_buffer(&self, target: BufferTarget) -> Handle {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self
                .vertex_arrays
                .get(&self.vertex_array)
                .map_or(DEFAULT_HANDLE, |vao| vao.element_buffer),
        }
    }

    fn bound_texture(&self) -> Handle {
        self.unit_textures[self.active_unit as usize]
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureState> {
        let handle = self.bound_texture();
        if handle == DEFAULT_HANDLE {
            return None;
        }
        self.textures.get_mut(&handle)
    }

    fn attachment_status(&self, attachment: Attachment, attached: Attached) -> bool {
        match attached {
            Attached::Texture(handle) => match self.textures.get(&handle) {
                Some(tex) => attachment.is_color() && tex.format.is_some() && tex.width > 0,
                None => false,
            },
            Attached::Renderbuffer(handle) => match self.renderbuffers.get(&handle) {
                Some(RenderbufferState {
                    storage: Some((format, width, height)),
                }) => format.fits(attachment) && *width > 0 && *height > 0,
                _ => false,
            },
        }
    }
}

/// Software GL state machine. See the module docs.
#[derive(Debug)]
pub struct HeadlessGl {
    state: RefCell<State>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
        }
    }

    /// Number of GL objects created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        let s = self.state.borrow();
        s.buffers.len()
            + s.vertex_arrays.len()
            - 1
            + s.textures.len()
            + s.framebuffers.len()
            + s.renderbuffers.len()
            + s.shaders.len()
            + s.programs.len()
    }

    pub fn attribute(&self, vertex_array: Handle, slot: u32) -> Option<AttribPointer> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|vao| vao.attributes.get(&slot).copied())
    }

    /// Slots with a declared pointer on `vertex_array`, ascending.
    pub fn attribute_slots(&self, vertex_array: Handle) -> Vec<u32> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .map(|vao| vao.attributes.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Element buffer recorded in `vertex_array`.
    pub fn element_buffer(&self, vertex_array: Handle) -> Option<Handle> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .map(|vao| vao.element_buffer)
    }

    pub fn texture_info(&self, texture: Handle) -> Option<TextureInfo> {
        self.state.borrow().textures.get(&texture).map(|t| TextureInfo {
            width: t.width,
            height: t.height,
            format: t.format,
            has_content: t.pixels.is_some(),
            mipmapped: t.mipmapped,
            parameters: t.parameters.clone(),
        })
    }

    /// 2D texture bound on `unit`.
    pub fn texture_on_unit(&self, unit: u32) -> Handle {
        self.state
            .borrow()
            .unit_textures
            .get(unit as usize)
            .copied()
            .unwrap_or(DEFAULT_HANDLE)
    }

    /// Whether `handle` names a live object of any kind.
    pub fn exists(&self, handle: Handle) -> bool {
        let s = self.state.borrow();
        handle != DEFAULT_HANDLE
            && (s.buffers.contains_key(&handle)
                || s.vertex_arrays.contains_key(&handle)
                || s.textures.contains_key(&handle)
                || s.framebuffers.contains_key(&handle)
                || s.renderbuffers.contains_key(&handle)
                || s.shaders.contains_key(&handle)
                || s.programs.contains_key(&handle))
    }

    /// Last value written to `name` on `program`.
    pub fn uniform(&self, program: Handle, name: &str) -> Option<UniformValue> {
        let s = self.state.borrow();
        let program = s.programs.get(&program)?;
        let location = program.locations.get(name)?;
        program.values.get(location).copied()
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    /// `(framebuffer, mask)` for every clear issued.
    pub fn clears(&self) -> Vec<(Handle, ClearMask)> {
        self.state.borrow().clears.clone()
    }

    pub fn last_clear_color(&self) -> [f32; 4] {
        self.state.borrow().clear_color
    }

    /// Forget recorded draws and clears, keeping all objects.
    pub fn reset_frame_log(&self) {
        let mut s = self.state.borrow_mut();
        s.draws.clear();
        s.clears.clear();
    }
}

/// Names declared with `uniform <type> <name>;`, array suffixes stripped.
fn declared_uniforms(source: &str) -> Vec<String> {
    source
        .split(';')
        .filter_map(|statement| {
            let mut tokens = statement.split_whitespace();
            while let Some(token) = tokens.next() {
                if token == "uniform" {
                    let _ty = tokens.next()?;
                    let name = tokens.next()?;
                    let name = name.split('[').next()?;
                    return Some(name.to_string());
                }
            }
            None
        })
        .collect()
}

fn has_entry_point(source: &str) -> bool {
    source.contains("main") && source.contains('{')
}

impl GlApi for HeadlessGl {
    fn gen_buffer(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.buffers.insert(handle, Vec::new());
        handle
    }

    fn delete_buffer(&self, buffer: Handle) {
        let mut s = self.state.borrow_mut();
        if s.buffers.remove(&buffer).is_none() {
            return;
        }
        if s.array_buffer == buffer {
            s.array_buffer = DEFAULT_HANDLE;
        }
        let current = s.vertex_array;
        if let Some(vao) = s.vertex_arrays.get_mut(&current) {
            if vao.element_buffer == buffer {
                vao.element_buffer = DEFAULT_HANDLE;
            }
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Handle) {
        let mut s = self.state.borrow_mut();
        if buffer != DEFAULT_HANDLE && !s.buffers.contains_key(&buffer) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        match target {
            BufferTarget::Array => s.array_buffer = buffer,
            BufferTarget::ElementArray => s.current_vertex_array().element_buffer = buffer,
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut s = self.state.borrow_mut();
        let bound = s.bound_buffer(target);
        if bound != DEFAULT_HANDLE {
            if let Some(contents) = s.buffers.get_mut(&bound) {
                *contents = data.to_vec();
                return;
            }
        }
        s.fail(gl::INVALID_OPERATION);
    }

    fn buffer_size(&self, target: BufferTarget) -> usize {
        let s = self.state.borrow();
        let bound = s.bound_buffer(target);
        s.buffers.get(&bound).map_or(0, Vec::len)
    }

    fn get_buffer_sub_data(&self, target: BufferTarget, offset: usize, out: &mut [u8]) {
        let mut s = self.state.borrow_mut();
        let bound = s.bound_buffer(target);
        let range = match s.buffers.get(&bound) {
            Some(contents) if offset + out.len() <= contents.len() => {
                out.copy_from_slice(&contents[offset..offset + out.len()]);
                return;
            }
            Some(_) => gl::INVALID_VALUE,
            None => gl::INVALID_OPERATION,
        };
        s.fail(range);
    }

    fn gen_vertex_array(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.vertex_arrays.insert(handle, VertexArrayState::default());
        handle
    }

    fn delete_vertex_array(&self, vertex_array: Handle) {
        if vertex_array == DEFAULT_HANDLE {
            return;
        }
        let mut s = self.state.borrow_mut();
        if s.vertex_arrays.remove(&vertex_array).is_some() && s.vertex_array == vertex_array {
            s.vertex_array = DEFAULT_HANDLE;
        }
    }

    fn bind_vertex_array(&self, vertex_array: Handle) {
        let mut s = self.state.borrow_mut();
        if !s.vertex_arrays.contains_key(&vertex_array) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        s.vertex_array = vertex_array;
    }

    fn vertex_attrib_pointer(&self, slot: u32, components: i32, stride: i32, offset: usize) {
        let mut s = self.state.borrow_mut();
        if s.vertex_array == DEFAULT_HANDLE || s.array_buffer == DEFAULT_HANDLE {
            // Core profile requires both a vertex array and an array buffer.
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        if !(1..=4).contains(&components) || stride < 0 {
            s.fail(gl::INVALID_VALUE);
            return;
        }
        let buffer = s.array_buffer;
        let vao = s.current_vertex_array();
        let enabled = vao.attributes.get(&slot).is_some_and(|a| a.enabled);
        vao.attributes.insert(
            slot,
            AttribPointer {
                components,
                stride,
                offset,
                buffer,
                enabled,
            },
        );
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        let mut s = self.state.borrow_mut();
        if s.vertex_array == DEFAULT_HANDLE {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        match s.current_vertex_array().attributes.get_mut(&slot) {
            Some(attribute) => attribute.enabled = true,
            None => {
                s.current_vertex_array().attributes.insert(
                    slot,
                    AttribPointer {
                        components: 4,
                        stride: 0,
                        offset: 0,
                        buffer: DEFAULT_HANDLE,
                        enabled: true,
                    },
                );
            }
        }
    }

    fn gen_texture(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.textures.insert(handle, TextureState::default());
        handle
    }

    fn delete_texture(&self, texture: Handle) {
        let mut s = self.state.borrow_mut();
        if s.textures.remove(&texture).is_none() {
            return;
        }
        for bound in s.unit_textures.iter_mut() {
            if *bound == texture {
                *bound = DEFAULT_HANDLE;
            }
        }
        // Deleting an object detaches it from the bound framebuffer only.
        let current = s.framebuffer;
        if let Some(attachments) = s.framebuffers.get_mut(&current) {
            attachments.retain(|_, a| *a != Attached::Texture(texture));
        }
    }

    fn active_texture(&self, unit: u32) {
        let mut s = self.state.borrow_mut();
        if unit >= MAX_TEXTURE_UNITS {
            s.fail(gl::INVALID_ENUM);
            return;
        }
        s.active_unit = unit;
    }

    fn active_texture_unit(&self) -> u32 {
        self.state.borrow().active_unit
    }

    fn max_texture_units(&self) -> u32 {
        MAX_TEXTURE_UNITS
    }

    fn bind_texture_2d(&self, texture: Handle) {
        let mut s = self.state.borrow_mut();
        if texture != DEFAULT_HANDLE && !s.textures.contains_key(&texture) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        let unit = s.active_unit as usize;
        s.unit_textures[unit] = texture;
    }

    fn tex_parameter(&self, parameter: TexParameter) {
        let mut s = self.state.borrow_mut();
        if let TexParameter::MagFilter(filter) = parameter {
            if filter.uses_mipmaps() {
                s.fail(gl::INVALID_ENUM);
                return;
            }
        }
        match s.bound_texture_mut() {
            Some(tex) => {
                tex.parameters
                    .retain(|p| std::mem::discriminant(p) != std::mem::discriminant(&parameter));
                tex.parameters.push(parameter);
            }
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn tex_image_2d(&self, format: PixelFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        let mut s = self.state.borrow_mut();
        if let Some(pixels) = pixels {
            if pixels.len() < format.byte_len(width, height) {
                s.fail(gl::INVALID_OPERATION);
                return;
            }
        }
        match s.bound_texture_mut() {
            Some(tex) => {
                tex.width = width;
                tex.height = height;
                tex.format = Some(format);
                tex.pixels = pixels.map(|p| p[..format.byte_len(width, height)].to_vec());
                tex.mipmapped = false;
            }
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn generate_mipmap(&self) {
        let mut s = self.state.borrow_mut();
        match s.bound_texture_mut() {
            Some(tex) if tex.format.is_some() => tex.mipmapped = true,
            _ => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn texture_size(&self, level: i32) -> (u32, u32) {
        let s = self.state.borrow();
        let handle = s.bound_texture();
        match s.textures.get(&handle) {
            Some(tex) if level >= 0 => {
                let shift = level as u32;
                if shift > 0 && !tex.mipmapped {
                    return (0, 0);
                }
                ((tex.width >> shift).max(1), (tex.height >> shift).max(1))
            }
            _ => (0, 0),
        }
    }

    fn get_tex_image(&self, format: PixelFormat, out: &mut [u8]) {
        let mut s = self.state.borrow_mut();
        let handle = s.bound_texture();
        let code = match s.textures.get(&handle) {
            Some(tex) if tex.format == Some(format) => {
                match &tex.pixels {
                    Some(pixels) => {
                        let n = out.len().min(pixels.len());
                        out[..n].copy_from_slice(&pixels[..n]);
                    }
                    // Storage without content reads back as zeros.
                    None => out.fill(0),
                }
                return;
            }
            // Format conversion on readback is not emulated.
            _ => gl::INVALID_OPERATION,
        };
        s.fail(code);
    }

    fn gen_framebuffer(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.framebuffers.insert(handle, BTreeMap::new());
        handle
    }

    fn delete_framebuffer(&self, framebuffer: Handle) {
        let mut s = self.state.borrow_mut();
        if s.framebuffers.remove(&framebuffer).is_some() && s.framebuffer == framebuffer {
            s.framebuffer = DEFAULT_HANDLE;
        }
    }

    fn bind_framebuffer(&self, framebuffer: Handle) {
        let mut s = self.state.borrow_mut();
        if framebuffer != DEFAULT_HANDLE && !s.framebuffers.contains_key(&framebuffer) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        s.framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(&self, attachment: Attachment, texture: Handle) {
        let mut s = self.state.borrow_mut();
        let current = s.framebuffer;
        if current == DEFAULT_HANDLE
            || (texture != DEFAULT_HANDLE && !s.textures.contains_key(&texture))
        {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        if let Some(attachments) = s.framebuffers.get_mut(&current) {
            if texture == DEFAULT_HANDLE {
                attachments.remove(&attachment);
            } else {
                attachments.insert(attachment, Attached::Texture(texture));
            }
        }
    }

    fn framebuffer_renderbuffer(&self, attachment: Attachment, renderbuffer: Handle) {
        let mut s = self.state.borrow_mut();
        let current = s.framebuffer;
        if current == DEFAULT_HANDLE
            || (renderbuffer != DEFAULT_HANDLE && !s.renderbuffers.contains_key(&renderbuffer))
        {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        if let Some(attachments) = s.framebuffers.get_mut(&current) {
            if renderbuffer == DEFAULT_HANDLE {
                attachments.remove(&attachment);
            } else {
                attachments.insert(attachment, Attached::Renderbuffer(renderbuffer));
            }
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        let s = self.state.borrow();
        if s.framebuffer == DEFAULT_HANDLE {
            return FramebufferStatus::Complete;
        }
        let Some(attachments) = s.framebuffers.get(&s.framebuffer) else {
            return FramebufferStatus::Undefined;
        };
        if attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }
        for (&attachment, &attached) in attachments {
            if !s.attachment_status(attachment, attached) {
                return FramebufferStatus::IncompleteAttachment;
            }
        }
        // The default draw buffer is COLOR_ATTACHMENT0.
        if !attachments.contains_key(&Attachment::Color(0)) {
            return FramebufferStatus::IncompleteDrawBuffer;
        }
        FramebufferStatus::Complete
    }

    fn gen_renderbuffer(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.renderbuffers.insert(handle, RenderbufferState::default());
        handle
    }

    fn delete_renderbuffer(&self, renderbuffer: Handle) {
        let mut s = self.state.borrow_mut();
        if s.renderbuffers.remove(&renderbuffer).is_none() {
            return;
        }
        if s.renderbuffer == renderbuffer {
            s.renderbuffer = DEFAULT_HANDLE;
        }
        let current = s.framebuffer;
        if let Some(attachments) = s.framebuffers.get_mut(&current) {
            attachments.retain(|_, a| *a != Attached::Renderbuffer(renderbuffer));
        }
    }

    fn bind_renderbuffer(&self, renderbuffer: Handle) {
        let mut s = self.state.borrow_mut();
        if renderbuffer != DEFAULT_HANDLE && !s.renderbuffers.contains_key(&renderbuffer) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        s.renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&self, format: RenderbufferFormat, width: u32, height: u32) {
        let mut s = self.state.borrow_mut();
        let current = s.renderbuffer;
        match s.renderbuffers.get_mut(&current) {
            Some(rb) => rb.storage = Some((format, width, height)),
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.shaders.insert(
            handle,
            ShaderState {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        handle
    }

    fn shader_source(&self, shader: Handle, source: &str) {
        let mut s = self.state.borrow_mut();
        match s.shaders.get_mut(&shader) {
            Some(state) => state.source = source.to_string(),
            None => s.fail(gl::INVALID_VALUE),
        }
    }

    fn compile_shader(&self, shader: Handle) {
        let mut s = self.state.borrow_mut();
        let Some(state) = s.shaders.get_mut(&shader) else {
            s.fail(gl::INVALID_VALUE);
            return;
        };
        if state.source.trim().is_empty() {
            state.compiled = false;
            state.log = "0:0: error: empty shader source".to_string();
        } else if !has_entry_point(&state.source) {
            state.compiled = false;
            state.log = format!("0:1: error: {} shader has no main function", state.stage);
        } else {
            state.compiled = true;
            state.log.clear();
        }
    }

    fn shader_compile_status(&self, shader: Handle) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: Handle) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: Handle) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Handle {
        let mut s = self.state.borrow_mut();
        let handle = s.next();
        s.programs.insert(handle, ProgramState::default());
        handle
    }

    fn attach_shader(&self, program: Handle, shader: Handle) {
        let mut s = self.state.borrow_mut();
        if !s.shaders.contains_key(&shader) {
            s.fail(gl::INVALID_VALUE);
            return;
        }
        match s.programs.get_mut(&program) {
            Some(p) => p.shaders.push(shader),
            None => s.fail(gl::INVALID_VALUE),
        }
    }

    fn link_program(&self, program: Handle) {
        let mut s = self.state.borrow_mut();
        let Some(attached) = s.programs.get(&program).map(|p| p.shaders.clone()) else {
            s.fail(gl::INVALID_VALUE);
            return;
        };
        let stages: Vec<&ShaderState> = attached.iter().filter_map(|h| s.shaders.get(h)).collect();
        let has_stage = |stage: ShaderStage| stages.iter().any(|sh| sh.stage == stage && sh.compiled);
        let (linked, log) = if stages.iter().any(|sh| !sh.compiled) {
            (false, "error: attached shader is not compiled".to_string())
        } else if !has_stage(ShaderStage::Vertex) {
            (false, "error: program has no vertex shader".to_string())
        } else if !has_stage(ShaderStage::Fragment) {
            (false, "error: program has no fragment shader".to_string())
        } else {
            (true, String::new())
        };
        let uniforms: Vec<String> = stages
            .iter()
            .flat_map(|sh| declared_uniforms(&sh.source))
            .collect();
        if let Some(p) = s.programs.get_mut(&program) {
            p.linked = linked;
            p.log = log;
            p.declared_uniforms = if linked { uniforms } else { Vec::new() };
            p.locations.clear();
            p.values.clear();
        }
    }

    fn program_link_status(&self, program: Handle) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: Handle) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: Handle) {
        let mut s = self.state.borrow_mut();
        if s.programs.remove(&program).is_some() && s.program == program {
            s.program = DEFAULT_HANDLE;
        }
    }

    fn use_program(&self, program: Handle) {
        let mut s = self.state.borrow_mut();
        if program != DEFAULT_HANDLE && !s.programs.get(&program).is_some_and(|p| p.linked) {
            s.fail(gl::INVALID_OPERATION);
            return;
        }
        s.program = program;
    }

    fn uniform_location(&self, program: Handle, name: &str) -> i32 {
        let mut s = self.state.borrow_mut();
        let Some(p) = s.programs.get_mut(&program) else {
            return -1;
        };
        if let Some(&location) = p.locations.get(name) {
            return location;
        }
        // Struct members resolve through their declared instance name.
        let base = name.split(&['.', '['][..]).next().unwrap_or(name);
        if !p.declared_uniforms.iter().any(|u| u == base) {
            return -1;
        }
        let location = p.locations.len() as i32;
        p.locations.insert(name.to_string(), location);
        location
    }

    fn uniform_1i(&self, location: i32, value: i32) {
        write_uniform(&self.state, location, UniformValue::Int(value));
    }

    fn uniform_1f(&self, location: i32, value: f32) {
        write_uniform(&self.state, location, UniformValue::Float(value));
    }

    fn uniform_3f(&self, location: i32, value: [f32; 3]) {
        write_uniform(&self.state, location, UniformValue::Vec3(value));
    }

    fn uniform_matrix_4fv(&self, location: i32, value: &[f32; 16]) {
        write_uniform(&self.state, location, UniformValue::Mat4(*value));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        let mut s = self.state.borrow_mut();
        if width < 0 || height < 0 {
            s.fail(gl::INVALID_VALUE);
            return;
        }
        s.viewport = [x, y, width, height];
    }

    fn get_viewport(&self) -> [i32; 4] {
        self.state.borrow().viewport
    }

    fn clear_color(&self, color: [f32; 4]) {
        self.state.borrow_mut().clear_color = color;
    }

    fn clear(&self, mask: ClearMask) {
        let mut s = self.state.borrow_mut();
        let framebuffer = s.framebuffer;
        s.clears.push((framebuffer, mask));
    }

    fn draw_arrays(&self, mode: Primitive, _first: i32, count: i32) {
        record_draw(&self.state, mode, count, false);
    }

    fn draw_elements(&self, mode: Primitive, count: i32) {
        record_draw(&self.state, mode, count, true);
    }

    fn get_binding(&self, point: BindingPoint) -> Handle {
        let s = self.state.borrow();
        match point {
            BindingPoint::ArrayBuffer => s.array_buffer,
            BindingPoint::ElementArrayBuffer => s.bound_buffer(BufferTarget::ElementArray),
            BindingPoint::VertexArray => s.vertex_array,
            BindingPoint::Texture2d => s.bound_texture(),
            BindingPoint::Framebuffer => s.framebuffer,
            BindingPoint::Renderbuffer => s.renderbuffer,
            BindingPoint::Program => s.program,
        }
    }

    fn get_error(&self) -> u32 {
        self.state
            .borrow_mut()
            .errors
            .pop_front()
            .unwrap_or(gl::NO_ERROR)
    }
}

fn write_uniform(state: &RefCell<State>, location: i32, value: UniformValue) {
    if location < 0 {
        // GL silently ignores location -1.
        return;
    }
    let mut s = state.borrow_mut();
    let current = s.program;
    match s.programs.get_mut(&current) {
        Some(p) => {
            p.values.insert(location, value);
        }
        None => s.fail(gl::INVALID_OPERATION),
    }
}

fn record_draw(state: &RefCell<State>, mode: Primitive, count: i32, indexed: bool) {
    let mut s = state.borrow_mut();
    let missing_program = s.program == DEFAULT_HANDLE;
    let missing_array = s.vertex_array == DEFAULT_HANDLE;
    let missing_indices = indexed && s.bound_buffer(BufferTarget::ElementArray) == DEFAULT_HANDLE;
    if missing_program || missing_array || missing_indices || count < 0 {
        s.fail(gl::INVALID_OPERATION);
        return;
    }
    let textures = s
        .unit_textures
        .iter()
        .enumerate()
        .filter(|(_, t)| **t != DEFAULT_HANDLE)
        .map(|(unit, t)| (unit as u32, *t))
        .collect();
    let call = DrawCall {
        mode,
        count,
        indexed,
        vertex_array: s.vertex_array,
        program: s.program,
        framebuffer: s.framebuffer,
        textures,
    };
    s.draws.push(call);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_binding_belongs_to_the_vertex_array() {
        let gl = HeadlessGl::new();
        let vao = gl.gen_vertex_array();
        let ebo = gl.gen_buffer();

        gl.bind_vertex_array(vao);
        gl.bind_buffer(BufferTarget::ElementArray, ebo);
        gl.bind_vertex_array(DEFAULT_HANDLE);

        assert_eq!(gl.get_binding(BindingPoint::ElementArrayBuffer), DEFAULT_HANDLE);
        gl.bind_vertex_array(vao);
        assert_eq!(gl.get_binding(BindingPoint::ElementArrayBuffer), ebo);
        assert_eq!(gl.element_buffer(vao), Some(ebo));
    }

    #[test]
    fn attribute_pointer_needs_array_buffer() {
        let gl = HeadlessGl::new();
        let vao = gl.gen_vertex_array();
        gl.bind_vertex_array(vao);

        gl.vertex_attrib_pointer(0, 3, 12, 0);
        assert_eq!(gl.get_error(), gl::INVALID_OPERATION);
        assert_eq!(gl.get_error(), gl::NO_ERROR);

        let vbo = gl.gen_buffer();
        gl.bind_buffer(BufferTarget::Array, vbo);
        gl.vertex_attrib_pointer(0, 3, 12, 0);
        gl.enable_vertex_attrib_array(0);
        let attribute = gl.attribute(vao, 0).expect("slot 0 declared");
        assert_eq!(attribute.buffer, vbo);
        assert!(attribute.enabled);
    }

    #[test]
    fn texture_bindings_are_per_unit() {
        let gl = HeadlessGl::new();
        let a = gl.gen_texture();
        let b = gl.gen_texture();

        gl.bind_texture_2d(a);
        gl.active_texture(3);
        gl.bind_texture_2d(b);

        assert_eq!(gl.get_binding(BindingPoint::Texture2d), b);
        assert_eq!(gl.texture_on_unit(0), a);
        gl.active_texture(0);
        assert_eq!(gl.get_binding(BindingPoint::Texture2d), a);
    }

    #[test]
    fn empty_framebuffer_is_missing_attachments() {
        let gl = HeadlessGl::new();
        let fbo = gl.gen_framebuffer();
        gl.bind_framebuffer(fbo);
        assert_eq!(gl.check_framebuffer_status(), FramebufferStatus::MissingAttachment);

        gl.bind_framebuffer(DEFAULT_HANDLE);
        assert_eq!(gl.check_framebuffer_status(), FramebufferStatus::Complete);
    }

    #[test]
    fn shader_without_main_fails_to_compile() {
        let gl = HeadlessGl::new();
        let shader = gl.create_shader(ShaderStage::Fragment);
        gl.shader_source(shader, "out vec4 color;");
        gl.compile_shader(shader);
        assert!(!gl.shader_compile_status(shader));
        assert!(gl.shader_info_log(shader).contains("no main"));
    }

    #[test]
    fn uniform_declarations_are_parsed() {
        let src = "uniform mat4 model;\nuniform sampler2D textures[2];\nuniform Material material;";
        assert_eq!(
            declared_uniforms(src),
            vec!["model".to_string(), "textures".to_string(), "material".to_string()]
        );
    }

    #[test]
    fn live_objects_tracks_deletion() {
        let gl = HeadlessGl::new();
        let buffer = gl.gen_buffer();
        let texture = gl.gen_texture();
        assert_eq!(gl.live_objects(), 2);
        gl.delete_buffer(buffer);
        gl.delete_texture(texture);
        assert_eq!(gl.live_objects(), 0);
        assert!(!gl.exists(buffer));
    }
}
