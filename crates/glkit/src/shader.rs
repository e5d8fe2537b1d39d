//! Vertex + fragment shader programs and typed uniform access.

use glam::{Mat4, Vec3};
use glkit_core::{BindingGuard, BindingPoint, Context, GlApi, Handle, ShaderStage};
use tracing::{debug, trace, warn};

use crate::error::ShaderError;

/// A linked vertex + fragment program.
pub struct ShaderProgram {
    ctx: Context,
    handle: Handle,
}

impl ShaderProgram {
    /// Compile both stages and link them.
    ///
    /// The stage objects are deleted once linking has been attempted; on
    /// failure the program object is deleted too and the driver's info log
    /// is returned in the error.
    pub fn from_sources(
        ctx: &Context,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(ctx, ShaderStage::Vertex, vertex_source)?;
        let fragment = match compile(ctx, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(e) => {
                ctx.delete_shader(vertex);
                return Err(e);
            }
        };

        let handle = ctx.create_program();
        ctx.attach_shader(handle, vertex);
        ctx.attach_shader(handle, fragment);
        ctx.link_program(handle);
        ctx.delete_shader(vertex);
        ctx.delete_shader(fragment);

        if !ctx.program_link_status(handle) {
            let log = ctx.program_info_log(handle);
            ctx.delete_program(handle);
            warn!(%log, "shader program failed to link");
            return Err(ShaderError::Link { log });
        }

        debug!(handle, "linked shader program");
        Ok(Self {
            ctx: ctx.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Make this the current program until the returned guard drops.
    pub fn use_program(&self) -> ProgramInUse<'_> {
        trace!(handle = self.handle, "use program");
        ProgramInUse {
            program: self,
            _bound: BindingGuard::bind(&self.ctx, BindingPoint::Program, self.handle),
        }
    }

    /// Uniform location of `name`, or -1 when the program has no such
    /// active uniform.
    pub fn location(&self, name: &str) -> i32 {
        self.ctx.uniform_location(self.handle, name)
    }

    /// Delete the GL object now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.ctx.delete_program(self.handle);
        debug!(handle = self.handle, "deleted shader program");
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("handle", &self.handle)
            .finish()
    }
}

fn compile(ctx: &Context, stage: ShaderStage, source: &str) -> Result<Handle, ShaderError> {
    let shader = ctx.create_shader(stage);
    ctx.shader_source(shader, source);
    ctx.compile_shader(shader);
    if ctx.shader_compile_status(shader) {
        return Ok(shader);
    }
    let log = ctx.shader_info_log(shader);
    ctx.delete_shader(shader);
    warn!(%stage, %log, "shader failed to compile");
    Err(ShaderError::Compile { stage, log })
}

/// Proof that a program is current. Uniform setters live here, so they can
/// only write to the program they name.
///
/// Unknown uniform names are ignored, as GL ignores location -1.
#[must_use = "dropping the guard immediately restores the previous program"]
pub struct ProgramInUse<'a> {
    program: &'a ShaderProgram,
    _bound: BindingGuard,
}

impl ProgramInUse<'_> {
    pub fn program(&self) -> &ShaderProgram {
        self.program
    }

    pub fn context(&self) -> &Context {
        &self.program.ctx
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_int(name, i32::from(value));
    }

    pub fn set_int(&self, name: &str, value: i32) {
        let location = self.program.location(name);
        self.program.ctx.uniform_1i(location, value);
    }

    pub fn set_float(&self, name: &str, value: f32) {
        let location = self.program.location(name);
        self.program.ctx.uniform_1f(location, value);
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        let location = self.program.location(name);
        self.program.ctx.uniform_3f(location, value.to_array());
    }

    /// Column-major, as glam stores it.
    pub fn set_mat4(&self, name: &str, value: &Mat4) {
        let location = self.program.location(name);
        self.program
            .ctx
            .uniform_matrix_4fv(location, &value.to_cols_array());
    }
}

impl std::fmt::Debug for ProgramInUse<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramInUse")
            .field("program", &self.program.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{headless, program, FRAGMENT, VERTEX};
    use glkit_core::headless::UniformValue;
    use glkit_core::DEFAULT_HANDLE;

    #[test]
    fn stage_objects_are_deleted_after_link() {
        let (gl, ctx) = headless();
        let shader = program(&ctx);
        assert!(gl.exists(shader.handle()));
        assert_eq!(gl.live_objects(), 1);
    }

    #[test]
    fn compile_failure_names_the_stage() {
        let (gl, ctx) = headless();
        let err = ShaderProgram::from_sources(&ctx, VERTEX, "").unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn vertex_failure_reported_before_fragment() {
        let (_gl, ctx) = headless();
        let err = ShaderProgram::from_sources(&ctx, "void broken", FRAGMENT).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn uniforms_land_on_the_current_program() {
        let (gl, ctx) = headless();
        let shader = program(&ctx);
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        {
            let in_use = shader.use_program();
            assert_eq!(gl.get_binding(BindingPoint::Program), shader.handle());
            in_use.set_mat4("model", &model);
            in_use.set_vec3("lightColor", Vec3::new(1.0, 0.5, 0.25));
            in_use.set_float("mixValue", 0.2);
            in_use.set_bool("flag", true);
        }
        assert_eq!(gl.get_binding(BindingPoint::Program), DEFAULT_HANDLE);

        let handle = shader.handle();
        assert_eq!(
            gl.uniform(handle, "model"),
            Some(UniformValue::Mat4(model.to_cols_array()))
        );
        assert_eq!(
            gl.uniform(handle, "lightColor"),
            Some(UniformValue::Vec3([1.0, 0.5, 0.25]))
        );
        assert_eq!(gl.uniform(handle, "mixValue"), Some(UniformValue::Float(0.2)));
        assert_eq!(gl.uniform(handle, "flag"), Some(UniformValue::Int(1)));
    }

    #[test]
    fn unknown_uniform_is_ignored() {
        let (gl, ctx) = headless();
        let shader = program(&ctx);
        let in_use = shader.use_program();
        in_use.set_int("doesNotExist", 3);
        assert_eq!(shader.location("doesNotExist"), -1);
        assert!(glkit_core::state::clear_errors(&*gl).is_empty());
    }
}
