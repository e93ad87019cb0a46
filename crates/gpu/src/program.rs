use crate::backend::{Backend, GpuContext};
use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};
use crate::object::GpuObject;
use glam::{Mat4, Vec3, Vec4};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// A compiled shader program built from one WGSL module.
#[derive(Debug)]
pub struct Program<B: Backend> {
    object: GpuObject<B>,
    label: String,
    path: Option<PathBuf>,
}

impl<B: Backend> Program<B> {
    pub fn load(
        ctx: &GpuContext<B>,
        label: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, GpuError> {
        let label = label.into();
        let path = path.into();
        let source = read_source(&path)?;
        let object = compile(ctx, &label, &source)?;
        tracing::debug!(%label, path = %path.display(), handle = %object.handle(), "loaded program");
        Ok(Self {
            object,
            label,
            path: Some(path),
        })
    }

    /// A program with no file behind it; [`Program::reload`] is a no-op.
    pub fn from_source(
        ctx: &GpuContext<B>,
        label: impl Into<String>,
        source: &str,
    ) -> Result<Self, GpuError> {
        let label = label.into();
        let object = compile(ctx, &label, source)?;
        Ok(Self {
            object,
            label,
            path: None,
        })
    }

    /// Recompiles from the same path. On failure the previous program stays
    /// in place and usable.
    pub fn reload(&mut self) -> Result<(), GpuError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let source = read_source(path)?;
        let object = compile(self.object.context(), &self.label, &source)?;
        tracing::debug!(label = %self.label, handle = %object.handle(), "reloaded program");
        self.object = object;
        Ok(())
    }

    pub fn set_float(&self, name: &str, value: f32) -> &Self {
        self.set(name, UniformValue::Float(value))
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) -> &Self {
        self.set(name, UniformValue::Vec3(value))
    }

    pub fn set_vec4(&self, name: &str, value: Vec4) -> &Self {
        self.set(name, UniformValue::Vec4(value))
    }

    pub fn set_mat4(&self, name: &str, value: Mat4) -> &Self {
        self.set(name, UniformValue::Mat4(value))
    }

    fn set(&self, name: &str, value: UniformValue) -> &Self {
        self.object
            .context()
            .backend_mut()
            .set_uniform(self.object.handle(), name, value);
        self
    }

    pub fn use_program(&self) {
        self.object
            .context()
            .backend_mut()
            .use_program(Some(self.object.handle()));
    }

    pub fn unuse(ctx: &GpuContext<B>) {
        ctx.backend_mut().use_program(None);
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Rejects WGSL that does not declare both a vertex and a fragment stage.
/// Every backend runs this before handing source to its compiler.
pub fn validate_stages(label: &str, source: &str) -> Result<(), GpuError> {
    let missing: Vec<&str> = ["@vertex", "@fragment"]
        .into_iter()
        .filter(|stage| !source.contains(stage))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(GpuError::ShaderCompile {
        label: label.to_owned(),
        message: format!("missing entry point(s): {}", missing.join(", ")),
    })
}

fn read_source(path: &Path) -> Result<String, GpuError> {
    std::fs::read_to_string(path).map_err(|source| GpuError::ShaderIo {
        path: path.to_path_buf(),
        source,
    })
}

fn compile<B: Backend>(
    ctx: &GpuContext<B>,
    label: &str,
    source: &str,
) -> Result<GpuObject<B>, GpuError> {
    let object = GpuObject::new(ctx, ResourceKind::Program)?;
    let result = ctx
        .backend_mut()
        .compile_program(object.handle(), label, source);
    result.map(|()| object)
}

/// Programs looked up by name.
#[derive(Debug)]
pub struct ShaderTable<B: Backend> {
    programs: BTreeMap<String, Program<B>>,
}

impl<B: Backend> ShaderTable<B> {
    pub fn new() -> Self {
        Self {
            programs: BTreeMap::new(),
        }
    }

    pub fn load(
        &mut self,
        ctx: &GpuContext<B>,
        name: &str,
        path: impl Into<PathBuf>,
    ) -> Result<(), GpuError> {
        let program = Program::load(ctx, name, path)?;
        self.programs.insert(name.to_owned(), program);
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, program: Program<B>) {
        self.programs.insert(name.into(), program);
    }

    pub fn get(&self, name: &str) -> Option<&Program<B>> {
        self.programs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Reloads every program. Failures are logged and returned; each failing
    /// program keeps its previous compiled version.
    pub fn reload_all(&mut self) -> Vec<(String, GpuError)> {
        let mut failures = Vec::new();
        for (name, program) in &mut self.programs {
            if let Err(err) = program.reload() {
                tracing::warn!(program = %name, "shader reload failed: {err}");
                failures.push((name.clone(), err));
            }
        }
        if failures.is_empty() {
            tracing::info!(count = self.programs.len(), "shaders reloaded");
        }
        failures
    }
}

impl<B: Backend> Default for ShaderTable<B> {
    fn default() -> Self {
        Self::new()
    }
}
