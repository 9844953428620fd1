//! Shader compilation shared by the GL renderers

use glow::*;

use crate::error::{RenderError, Result};

/// GLSL header every program starts with
pub const GLSL_HEADER: &str = "#version 300 es\nprecision highp float;\n";

/// Compile a shader from source code
///
/// # Safety
/// Requires an active OpenGL context
pub unsafe fn compile_shader(gl: &Context, shader_type: u32, source: &str) -> Result<Shader> {
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(RenderError::resource("shader"))?;

        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RenderError::ShaderCompile(log));
        }

        Ok(shader)
    }
}

/// Create and link a program from vertex and fragment sources
///
/// # Safety
/// Requires an active OpenGL context
pub unsafe fn create_program(gl: &Context, vertex_src: &str, fragment_src: &str) -> Result<Program> {
    unsafe {
        let program = gl
            .create_program()
            .map_err(RenderError::resource("program"))?;

        let vertex_shader = compile_shader(gl, VERTEX_SHADER, vertex_src)?;
        let fragment_shader = match compile_shader(gl, FRAGMENT_SHADER, fragment_src) {
            Ok(s) => s,
            Err(e) => {
                gl.delete_shader(vertex_shader);
                gl.delete_program(program);
                return Err(e);
            }
        };

        gl.attach_shader(program, vertex_shader);
        gl.attach_shader(program, fragment_shader);
        gl.link_program(program);

        let linked = gl.get_program_link_status(program);

        gl.detach_shader(program, vertex_shader);
        gl.detach_shader(program, fragment_shader);
        gl.delete_shader(vertex_shader);
        gl.delete_shader(fragment_shader);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(RenderError::ProgramLink(log));
        }

        Ok(program)
    }
}

/// Join the header, generated functions and a shader body
pub fn assemble(declarations: &str, functions: &str, body: &str) -> String {
    let mut src = String::with_capacity(
        GLSL_HEADER.len() + declarations.len() + functions.len() + body.len() + 2,
    );
    src.push_str(GLSL_HEADER);
    src.push_str(declarations);
    src.push('\n');
    src.push_str(functions);
    src.push('\n');
    src.push_str(body);
    src
}
