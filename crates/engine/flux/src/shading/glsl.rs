//! GLSL code generation for the shading functions
//!
//! Generated snippets are plain function definitions meant to be spliced into
//! a `#version 300 es` shader after the uniform declarations.

use std::fmt::Write;

use super::{BeamFalloff, HeatmapSurface, HEATMAP_STOPS};

/// Uniform carrying the surface displacement scale
pub const DISPLACEMENT_SCALE_UNIFORM: &str = "u_displacement_scale";

/// Format a float as a GLSL literal that always parses as float
pub fn glsl_float(v: f32) -> String {
    let s = format!("{v:?}");
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

fn glsl_vec3(v: glam::Vec3) -> String {
    format!(
        "vec3({}, {}, {})",
        glsl_float(v.x),
        glsl_float(v.y),
        glsl_float(v.z)
    )
}

/// `vec3 heatmap(float t)` reproducing [`super::heatmap`]
pub fn heatmap_glsl() -> String {
    let n = HEATMAP_STOPS.len();
    let mut src = String::new();
    let _ = writeln!(src, "const vec3 HEATMAP_STOPS[{n}] = vec3[{n}](");
    for (i, stop) in HEATMAP_STOPS.iter().enumerate() {
        let sep = if i + 1 < n { "," } else { "" };
        let _ = writeln!(src, "    {}{sep}", glsl_vec3(*stop));
    }
    src.push_str(");\n\n");
    let _ = writeln!(src, "vec3 heatmap(float t) {{");
    let _ = writeln!(src, "    float scaled = clamp(t, 0.0, 1.0) * {};", glsl_float((n - 1) as f32));
    let _ = writeln!(src, "    int i = min(int(floor(scaled)), {});", n - 2);
    src.push_str("    return mix(HEATMAP_STOPS[i], HEATMAP_STOPS[i + 1], scaled - float(i));\n");
    src.push_str("}\n");
    src
}

pub(super) fn heatmap_surface(_surface: &HeatmapSurface) -> String {
    let mut src = heatmap_glsl();
    src.push('\n');
    let _ = writeln!(src, "float displace(float n) {{");
    let _ = writeln!(src, "    return clamp(n, 0.0, 1.0) * {DISPLACEMENT_SCALE_UNIFORM};");
    src.push_str("}\n\n");
    let _ = writeln!(src, "vec3 surface_color(float elevation) {{");
    let _ = writeln!(src, "    float range = {DISPLACEMENT_SCALE_UNIFORM} * 0.5;");
    src.push_str("    if (range <= 0.0) {\n        return HEATMAP_STOPS[0];\n    }\n");
    src.push_str("    return heatmap(elevation / range);\n");
    src.push_str("}\n");
    src
}

pub(super) fn beam_falloff(falloff: &BeamFalloff) -> String {
    let mut src = String::new();
    let _ = writeln!(src, "float beam_alpha(float radial, float along) {{");
    let _ = writeln!(
        src,
        "    float edge = 1.0 - smoothstep({}, 1.0, radial);",
        glsl_float(falloff.edge_start)
    );
    src.push_str("    float fade = 1.0 - clamp(along, 0.0, 1.0);\n");
    let _ = writeln!(
        src,
        "    return edge * fade * {};",
        glsl_float(falloff.base_opacity)
    );
    src.push_str("}\n");
    src
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::{BeamShader, SurfaceShader};

    #[test]
    fn test_float_literals() {
        assert_eq!(glsl_float(1.0), "1.0");
        assert_eq!(glsl_float(0.35), "0.35");
        assert_eq!(glsl_float(-2.0), "-2.0");
    }

    #[test]
    fn test_heatmap_has_all_stops() {
        let src = heatmap_glsl();
        assert!(src.contains("vec3[7]("));
        assert!(src.contains("vec3(0.0, 0.0, 0.35)"));
        assert!(src.contains("vec3(1.0, 1.0, 1.0)"));
        assert!(src.contains("* 6.0"));
        assert!(src.contains("vec3 heatmap(float t)"));
    }

    #[test]
    fn test_surface_functions() {
        let src = HeatmapSurface::new(3.0).glsl_functions();
        assert!(src.contains("float displace(float n)"));
        assert!(src.contains("vec3 surface_color(float elevation)"));
        assert!(src.contains(DISPLACEMENT_SCALE_UNIFORM));
    }

    #[test]
    fn test_beam_constants_embedded() {
        let src = BeamFalloff::new(0.25, 0.5).glsl_functions();
        assert!(src.contains("smoothstep(0.5, 1.0, radial)"));
        assert!(src.contains("* 0.25;"));
    }
}
