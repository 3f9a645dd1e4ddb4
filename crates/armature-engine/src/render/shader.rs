use std::cell::Cell;

use crate::device::{
    ManagedContext, ProgramId, ProgramSource, RenderError, RenderResult, Restorable, RestorableId,
    UniformValue,
};

/// A linked vertex + fragment program.
///
/// The program handle is rebuilt lazily when the context epoch moves, so a
/// shader shared between renderers (`Rc<Shader>`) stays usable across context
/// restoration without external bookkeeping.
pub struct Shader {
    id: RestorableId,
    source: ProgramSource,
    program: Cell<Option<ProgramId>>,
    epoch: Cell<u64>,
    disposed: Cell<bool>,
}

impl Shader {
    pub const MVP_MATRIX: &'static str = "u_projTrans";
    pub const POSITION: &'static str = "a_position";
    pub const COLOR: &'static str = "a_color";
    pub const COLOR2: &'static str = "a_color2";
    pub const TEXCOORDS: &'static str = "a_texCoords";
    pub const SAMPLER: &'static str = "u_texture";

    /// Compiles and links a program from WGSL sources.
    pub fn new(
        ctx: &mut ManagedContext,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> RenderResult<Self> {
        let source = ProgramSource::new(vertex, fragment);
        let program = ctx.gl().create_program(&source)?;
        let id = ctx.add_restorable("shader");

        Ok(Self {
            id,
            source,
            program: Cell::new(Some(program)),
            epoch: Cell::new(ctx.epoch()),
            disposed: Cell::new(false),
        })
    }

    /// Per-vertex color times texture sample.
    pub fn new_colored_textured(ctx: &mut ManagedContext) -> RenderResult<Self> {
        Self::new(
            ctx,
            include_str!("shaders/textured.vert.wgsl"),
            include_str!("shaders/textured.frag.wgsl"),
        )
    }

    /// Light/dark two-color tint over a texture sample.
    pub fn new_two_colored_textured(ctx: &mut ManagedContext) -> RenderResult<Self> {
        Self::new(
            ctx,
            include_str!("shaders/two_color.vert.wgsl"),
            include_str!("shaders/two_color.frag.wgsl"),
        )
    }

    /// Per-vertex color only.
    pub fn new_colored(ctx: &mut ManagedContext) -> RenderResult<Self> {
        Self::new(
            ctx,
            include_str!("shaders/colored.vert.wgsl"),
            include_str!("shaders/colored.frag.wgsl"),
        )
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    pub fn restorable_id(&self) -> RestorableId {
        self.id
    }

    /// Returns the live program handle, recompiling first if the context was restored.
    pub fn program(&self, ctx: &mut ManagedContext) -> RenderResult<ProgramId> {
        if self.disposed.get() {
            return Err(RenderError::ResourceCreation {
                what: "shader",
                reason: "used after dispose".into(),
            });
        }
        match self.program.get() {
            Some(p) if self.epoch.get() == ctx.epoch() => Ok(p),
            _ => self.compile(ctx),
        }
    }

    fn compile(&self, ctx: &mut ManagedContext) -> RenderResult<ProgramId> {
        let program = ctx.gl().create_program(&self.source)?;
        self.program.set(Some(program));
        self.epoch.set(ctx.epoch());
        log::debug!("shader {:?} compiled for epoch {}", self.id, ctx.epoch());
        Ok(program)
    }

    pub fn bind(&self, ctx: &mut ManagedContext) -> RenderResult<()> {
        let program = self.program(ctx)?;
        ctx.gl().use_program(Some(program));
        Ok(())
    }

    pub fn unbind(&self, ctx: &mut ManagedContext) {
        ctx.gl().use_program(None);
    }

    /// Attribute location declared by the vertex stage, `None` when absent.
    pub fn attribute_location(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
    ) -> RenderResult<Option<u32>> {
        let program = self.program(ctx)?;
        Ok(ctx.gl_ref().attribute_location(program, name))
    }

    fn set_uniform(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        value: UniformValue,
    ) -> RenderResult<()> {
        let program = self.program(ctx)?;
        ctx.gl().set_uniform(program, name, value);
        Ok(())
    }

    pub fn set_uniformi(&self, ctx: &mut ManagedContext, name: &str, v: i32) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Int(v))
    }

    pub fn set_uniformf(&self, ctx: &mut ManagedContext, name: &str, v: f32) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Float(v))
    }

    pub fn set_uniform2f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        x: f32,
        y: f32,
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Vec2([x, y]))
    }

    pub fn set_uniform3f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        x: f32,
        y: f32,
        z: f32,
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Vec3([x, y, z]))
    }

    pub fn set_uniform4f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Vec4([x, y, z, w]))
    }

    pub fn set_uniform2x2f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        m: &[f32; 4],
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Mat2(*m))
    }

    pub fn set_uniform3x3f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        m: &[f32; 9],
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Mat3(*m))
    }

    /// Column-major 4x4 matrix, e.g. `glam::Mat4::to_cols_array`.
    pub fn set_uniform4x4f(
        &self,
        ctx: &mut ManagedContext,
        name: &str,
        m: &[f32; 16],
    ) -> RenderResult<()> {
        self.set_uniform(ctx, name, UniformValue::Mat4(*m))
    }

    /// Deletes the program and unregisters the shader. Later use is an error.
    pub fn dispose(&self, ctx: &mut ManagedContext) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(program) = self.program.take() {
            if self.epoch.get() == ctx.epoch() {
                ctx.gl().delete_program(program);
            }
        }
        ctx.remove_restorable(self.id);
    }
}

impl Restorable for Shader {
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.compile(ctx).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GlCommand, HeadlessContext};

    fn headless(ctx: &ManagedContext) -> &HeadlessContext {
        ctx.backend::<HeadlessContext>().unwrap()
    }

    #[test]
    fn builtin_programs_expose_expected_attributes() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let textured = Shader::new_colored_textured(&mut ctx).unwrap();
        let two_color = Shader::new_two_colored_textured(&mut ctx).unwrap();
        let colored = Shader::new_colored(&mut ctx).unwrap();

        assert_eq!(textured.attribute_location(&mut ctx, Shader::TEXCOORDS).unwrap(), Some(2));
        assert_eq!(two_color.attribute_location(&mut ctx, Shader::COLOR2).unwrap(), Some(3));
        assert_eq!(colored.attribute_location(&mut ctx, Shader::TEXCOORDS).unwrap(), None);
        assert!(textured.source().is_textured());
        assert!(!colored.source().is_textured());
    }

    #[test]
    fn uniforms_reach_the_backend() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Shader::new_colored(&mut ctx).unwrap();
        let program = shader.program(&mut ctx).unwrap();

        let m = glam::Mat4::from_scale(glam::Vec3::splat(2.0)).to_cols_array();
        shader.set_uniform4x4f(&mut ctx, Shader::MVP_MATRIX, &m).unwrap();
        shader.set_uniformi(&mut ctx, Shader::SAMPLER, 0).unwrap();

        let gl = headless(&ctx);
        assert_eq!(gl.uniform(program, Shader::MVP_MATRIX), Some(UniformValue::Mat4(m)));
        assert_eq!(gl.uniform(program, Shader::SAMPLER), Some(UniformValue::Int(0)));
    }

    #[test]
    fn invalid_source_is_a_compile_error() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let err = Shader::new(&mut ctx, "fn nothing() {}", "").err().unwrap();
        assert!(matches!(err, RenderError::ShaderCompile(_)));
        assert_eq!(ctx.restorable_count(), 0);
    }

    #[test]
    fn recompiles_after_context_restoration() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Shader::new_colored(&mut ctx).unwrap();

        ctx.restore_with(HeadlessContext::new());
        shader.bind(&mut ctx).unwrap();

        let cmds = headless(&ctx).commands();
        assert!(matches!(cmds[0], GlCommand::CreateProgram(_)));
        assert!(matches!(cmds[1], GlCommand::UseProgram(Some(_))));
        assert_eq!(headless(&ctx).live_programs(), 1);
    }

    #[test]
    fn dispose_deletes_and_blocks_reuse() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Shader::new_colored(&mut ctx).unwrap();
        shader.dispose(&mut ctx);

        assert_eq!(headless(&ctx).live_programs(), 0);
        assert_eq!(ctx.restorable_count(), 0);
        assert!(shader.bind(&mut ctx).is_err());
    }
}
