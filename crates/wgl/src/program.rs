use crate::attributes::{AttributeTable, ProgramAttribute};
use crate::context::{Diagnostic, GlContext};
use crate::error::{ShaderKind, WglError};
use crate::gl::{Gl, ProgramId, ShaderId};
use crate::state::StateChange;
use crate::uniforms::{reflect, Uniform, UniformMap};

const EXCERPT_CONTEXT: usize = 10;

/// A linked program with its reflected uniforms and attributes.
#[derive(Debug, Default)]
pub struct Program {
    id: Option<ProgramId>,
    pub uniforms: UniformMap,
    pub attributes: AttributeTable,
}

impl Program {
    /// A program with no GPU object behind it, produced while the context
    /// is lost.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<ProgramId> {
        self.id
    }

    pub fn is_usable(&self) -> bool {
        self.id.is_some()
    }

    pub fn use_program<G: Gl>(&self, ctx: &mut GlContext<G>) -> StateChange {
        match self.id {
            Some(id) => ctx.use_program(Some(id)),
            None => StateChange::ContextLost,
        }
    }

    pub fn uniform(&mut self, name: &str) -> &mut Uniform {
        self.uniforms.get(name)
    }

    pub fn attribute(&mut self, name: &str) -> Option<&mut ProgramAttribute> {
        self.attributes.get_mut(name)
    }

    pub fn delete<G: Gl>(self, ctx: &mut GlContext<G>) {
        if let Some(id) = self.id {
            if ctx.state().program() == Some(id) {
                ctx.use_program(None);
            }
            ctx.gl_mut().delete_program(id);
        }
    }
}

pub fn compile_shader<G: Gl>(
    ctx: &mut GlContext<G>,
    kind: ShaderKind,
    source: &str,
) -> Result<Option<ShaderId>, WglError> {
    let gl = ctx.gl_mut();
    let Some(shader) = gl.create_shader(kind.gl_enum()) else {
        return Ok(None);
    };
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if gl.shader_compile_status(shader) {
        return Ok(Some(shader));
    }
    if gl.is_context_lost() {
        return Ok(None);
    }

    let log = gl.shader_info_log(shader);
    gl.delete_shader(shader);
    let excerpt = annotate_source(source, &log);
    tracing::error!(%kind, log = %log.trim(), "shader compile failed");
    if let Some(excerpt) = &excerpt {
        tracing::error!("{kind} shader source:\n{excerpt}");
    }
    ctx.push_diagnostic(Diagnostic::CompileFailed {
        kind,
        log: log.clone(),
    });
    Err(WglError::Compile { kind, log, excerpt })
}

/// Compiles, links and reflects a program.
///
/// Failed shader and program objects are deleted before the error is
/// returned. A lost context yields [`Program::detached`] instead of an error.
pub fn create_program<G: Gl>(
    ctx: &mut GlContext<G>,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<Program, WglError> {
    if ctx.is_lost() {
        return Ok(Program::detached());
    }
    let Some(vertex) = compile_shader(ctx, ShaderKind::Vertex, vertex_source)? else {
        return Ok(Program::detached());
    };
    let fragment = match compile_shader(ctx, ShaderKind::Fragment, fragment_source) {
        Ok(Some(fragment)) => fragment,
        Ok(None) => {
            ctx.gl_mut().delete_shader(vertex);
            return Ok(Program::detached());
        }
        Err(err) => {
            ctx.gl_mut().delete_shader(vertex);
            return Err(err);
        }
    };

    let gl = ctx.gl_mut();
    let Some(id) = gl.create_program() else {
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
        return Ok(Program::detached());
    };
    gl.attach_shader(id, vertex);
    gl.attach_shader(id, fragment);
    gl.link_program(id);
    let linked = gl.program_link_status(id);
    let log = if linked || gl.is_context_lost() {
        None
    } else {
        Some(gl.program_info_log(id))
    };
    // Linked programs keep their own copy; failed ones are discarded.
    gl.delete_shader(vertex);
    gl.delete_shader(fragment);
    if !linked {
        gl.delete_program(id);
        let Some(log) = log else {
            return Ok(Program::detached());
        };
        tracing::error!(program = %id, log = %log.trim(), "program link failed");
        ctx.push_diagnostic(Diagnostic::LinkFailed { log: log.clone() });
        return Err(WglError::Link { log });
    }

    let (uniforms, attributes) = reflect(ctx, id);
    tracing::debug!(
        program = %id,
        uniforms = uniforms.active_len(),
        attributes = attributes.len(),
        "program linked"
    );
    Ok(Program {
        id: Some(id),
        uniforms,
        attributes,
    })
}

/// Numbers the source lines around the line an `ERROR: 0:<line>:` log entry
/// points at, marking the failing one with `>`.
pub fn annotate_source(source: &str, log: &str) -> Option<String> {
    let line = log.lines().find_map(error_line)?;
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let first = line.saturating_sub(EXCERPT_CONTEXT).max(1);
    let last = (line + EXCERPT_CONTEXT).min(lines.len());
    let excerpt = (first..=last)
        .map(|number| {
            let marker = if number == line { '>' } else { ' ' };
            format!("{marker}{number:>4}: {}", lines[number - 1])
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(excerpt)
}

fn error_line(entry: &str) -> Option<usize> {
    let rest = &entry[entry.find("ERROR:")?..];
    rest.split(':').nth(2)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessGl};

    const VERTEX: &str = "attribute vec2 position;\nvoid main() { gl_Position = vec4(position, 0.0, 1.0); }";
    const FRAGMENT: &str = "precision mediump float;\nuniform vec4 u_color;\nvoid main() { gl_FragColor = u_color; }";

    fn context() -> GlContext<HeadlessGl> {
        GlContext::new(HeadlessGl::new(HeadlessConfig::default()))
    }

    #[test]
    fn linked_program_releases_its_shaders() {
        let mut ctx = context();
        let program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        assert!(program.is_usable());
        assert_eq!(ctx.gl().live_shaders(), 0);
        assert_eq!(ctx.gl().live_programs(), 1);
        assert!(program.use_program(&mut ctx).applied());
        assert!(!program.use_program(&mut ctx).applied());
        program.delete(&mut ctx);
        assert_eq!(ctx.gl().live_programs(), 0);
        assert_eq!(ctx.state().program(), None);
    }

    #[test]
    fn compile_failure_is_annotated_and_cleaned_up() {
        let fragment = "precision mediump float;\nvoid main() {\n#error missing colour\n}";
        let mut ctx = context();
        let err = create_program(&mut ctx, VERTEX, fragment).unwrap_err();
        match err {
            WglError::Compile { kind, log, excerpt } => {
                assert_eq!(kind, ShaderKind::Fragment);
                assert!(log.contains("0:3"));
                let excerpt = excerpt.unwrap();
                assert!(excerpt.contains(">   3: #error missing colour"), "{excerpt}");
                assert!(excerpt.contains("    1: precision mediump float;"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.gl().live_shaders(), 0);
        assert_eq!(ctx.gl().live_programs(), 0);
        assert!(matches!(
            ctx.diagnostics(),
            [Diagnostic::CompileFailed {
                kind: ShaderKind::Fragment,
                ..
            }]
        ));
    }

    #[test]
    fn link_failure_without_vertex_stage() {
        // Two fragment stages cannot be linked.
        let mut ctx = context();
        let gl = ctx.gl_mut();
        let program = gl.create_program().unwrap();
        for _ in 0..2 {
            let shader = gl
                .create_shader(crate::gl::constants::FRAGMENT_SHADER)
                .unwrap();
            gl.shader_source(shader, FRAGMENT);
            gl.compile_shader(shader);
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        assert!(!gl.program_link_status(program));
        assert!(!gl.program_info_log(program).is_empty());
    }

    #[test]
    fn lost_context_yields_detached_program_quietly() {
        let mut ctx = context();
        ctx.gl_mut().lose_context();
        let program = create_program(&mut ctx, VERTEX, "void main() {").unwrap();
        assert!(!program.is_usable());
        assert_eq!(program.use_program(&mut ctx), StateChange::ContextLost);
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn excerpt_is_clipped_to_ten_lines_each_side() {
        let source: String = (1..=30).map(|n| format!("line {n}\n")).collect();
        let excerpt = annotate_source(&source, "ERROR: 0:15: 'x' : undeclared").unwrap();
        let lines: Vec<&str> = excerpt.lines().collect();
        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], "    5: line 5");
        assert_eq!(lines[10], ">  15: line 15");
        assert_eq!(annotate_source(&source, "no line here"), None);
    }
}
