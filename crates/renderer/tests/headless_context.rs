use std::collections::BTreeSet;

use renderer::{
    BindError, CompileStage, Context, DeviceCommand, GeometryResource, HeadlessDevice, InputKind, PixelFormat,
    RenderError, ShaderSource, SurfaceSize, TextureResource, UniformMap, UniformValue, Viewport,
};

const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 in_position;
layout(location = 1) in vec3 in_normal;
layout(location = 2) in vec2 in_uv;

layout(location = 0) out vec3 v_normal;
layout(location = 1) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform Model {
    mat4 localToProjection;
    mat4 modelMatrix;
    vec3 cameraPosition;
} uModel;

void main() {
    v_normal = (uModel.modelMatrix * vec4(in_normal, 0.0)).xyz;
    v_uv = in_uv;
    gl_Position = uModel.localToProjection * uModel.modelMatrix * vec4(in_position, 1.0);
}
";

const FRAGMENT: &str = r"#version 450
layout(location = 0) in vec3 v_normal;
layout(location = 1) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 1) uniform Material {
    vec3 albedo;
    float roughness;
    float metalness;
} uMaterial;

layout(std140, set = 0, binding = 2) uniform PointLights {
    vec3 position[POINT_LIGHT_COUNT];
    vec3 color[POINT_LIGHT_COUNT];
    float intensity[POINT_LIGHT_COUNT];
} uPointLights;

layout(set = 1, binding = 0) uniform texture2D baseColorMap;
layout(set = 1, binding = 1) uniform sampler baseColorMapSampler;
layout(set = 1, binding = 2) uniform texture2D roughnessMap;
layout(set = 1, binding = 3) uniform sampler roughnessMapSampler;

void main() {
    vec3 n = normalize(v_normal);
    vec3 color = vec3(0.0);
    for (int i = 0; i < POINT_LIGHT_COUNT; ++i) {
        vec3 l = normalize(uPointLights.position[i]);
        color += uMaterial.albedo * uPointLights.color[i] * uPointLights.intensity[i] * max(dot(n, l), 0.0);
    }
    vec3 base = texture(sampler2D(baseColorMap, baseColorMapSampler), v_uv).rgb;
    float r = texture(sampler2D(roughnessMap, roughnessMapSampler), v_uv).r * uMaterial.roughness;
    out_color = vec4(color * base * (1.0 - r * uMaterial.metalness), 1.0);
}
";

fn source(lights: usize) -> ShaderSource {
    ShaderSource::new("lit", VERTEX, FRAGMENT).with_define("POINT_LIGHT_COUNT", lights)
}

fn context() -> Context<HeadlessDevice> {
    Context::new(HeadlessDevice::new(800, 600))
}

/// Latitude/longitude grid on the unit sphere with `segments` divisions each way.
fn grid_sphere(segments: u32) -> GeometryResource {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for y in 0..=segments {
        let v = y as f32 / segments as f32;
        let theta = v * std::f32::consts::PI;
        for x in 0..=segments {
            let u = x as f32 / segments as f32;
            let phi = u * std::f32::consts::TAU;
            let normal = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            positions.extend(normal.iter().map(|c| c * 0.12));
            normals.extend(normal);
            uvs.extend([u, v]);
        }
    }
    let row = segments + 1;
    let mut indices = Vec::new();
    for y in 0..segments {
        for x in 0..segments {
            let a = y * row + x;
            let b = a + row;
            indices.extend([a, b, a + 1, b, b + 1, a + 1]);
        }
    }
    GeometryResource::builder("sphere")
        .positions(positions)
        .normals(normals)
        .uvs(uvs)
        .indices(indices)
        .build()
        .unwrap()
}

fn light_uniforms(count: usize) -> UniformMap {
    let mut uniforms = UniformMap::new();
    let positions: Vec<f32> = (0..count).flat_map(|i| [i as f32, 6.0, 8.0]).collect();
    uniforms.set("uPointLights.position[0]", positions);
    uniforms.set("uPointLights.color[0]", vec![1.0f32; count * 3]);
    uniforms.set("uPointLights.intensity[0]", vec![1.0f32; count]);
    uniforms
}

fn count(commands: &[DeviceCommand], predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
    commands.iter().filter(|command| predicate(command)).count()
}

#[test]
fn declared_inputs_match_the_source() {
    let mut context = context();
    let program = context.compile_program(&source(4)).unwrap();
    let names: BTreeSet<&str> = program.declared_inputs().names().collect();
    let expected: BTreeSet<&str> = [
        "in_position",
        "in_normal",
        "in_uv",
        "uModel.localToProjection",
        "uModel.modelMatrix",
        "uModel.cameraPosition",
        "uMaterial.albedo",
        "uMaterial.roughness",
        "uMaterial.metalness",
        "uPointLights.position[0]",
        "uPointLights.color[0]",
        "uPointLights.intensity[0]",
        "baseColorMap",
        "roughnessMap",
    ]
    .into_iter()
    .collect();
    assert_eq!(names, expected);

    let inputs = program.declared_inputs();
    assert_eq!(inputs.get("uModel.modelMatrix").unwrap().kind, InputKind::Mat4);
    assert_eq!(inputs.get("uMaterial.roughness").unwrap().kind, InputKind::Float);
    assert_eq!(inputs.get("uPointLights.intensity[0]").unwrap().array_len, Some(4));
    assert_eq!(inputs.get("roughnessMap").unwrap().kind, InputKind::Sampler);
    assert_eq!(context.current_program(), program.handle());
}

#[test]
fn four_lights_without_textures_draws_light_arrays_only() {
    let mut context = context();
    let mut sphere = grid_sphere(24);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(4)).unwrap();
    context.device_mut().take_commands();

    let mut uniforms = light_uniforms(4);
    let albedo = 200.0f32 / 255.0;
    uniforms.set("uMaterial.albedo", [albedo, albedo, albedo]);
    context.draw(&sphere, &program, &uniforms).unwrap();

    let commands = context.device_mut().take_commands();
    assert_eq!(count(&commands, |c| matches!(c, DeviceCommand::BindTexture { .. })), 0);
    assert_eq!(count(&commands, |c| matches!(c, DeviceCommand::SetSamplerUnit { .. })), 0);

    let written: BTreeSet<String> = commands
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::WriteUniform { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    let expected: BTreeSet<String> = [
        "uMaterial.albedo",
        "uPointLights.color[0]",
        "uPointLights.intensity[0]",
        "uPointLights.position[0]",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(written, expected);

    assert_eq!(
        commands.last(),
        Some(&DeviceCommand::DrawIndexed {
            index_count: sphere.index_count()
        })
    );
    assert_eq!(sphere.index_count(), 24 * 24 * 6);
}

#[test]
fn light_array_is_written_in_one_strided_call() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(4)).unwrap();
    context.device_mut().take_commands();

    context.draw(&sphere, &program, &light_uniforms(4)).unwrap();

    let commands = context.device_mut().take_commands();
    let positions: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::WriteUniform { name, bytes, offset, .. } if name == "uPointLights.position[0]" => {
                Some((*offset, bytes.len()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![(0, 3 * 16 + 12)]);
}

#[test]
fn matrix_for_scalar_raises_type_mismatch_without_drawing() {
    let mut context = context();
    let mut sphere = grid_sphere(8);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(4)).unwrap();
    context.device_mut().take_commands();

    let mut uniforms = light_uniforms(4);
    uniforms.set("uMaterial.roughness", glam::Mat4::IDENTITY);
    let err = context.draw(&sphere, &program, &uniforms).unwrap_err();

    match err {
        RenderError::TypeMismatch(mismatch) => {
            assert_eq!(mismatch.name, "uMaterial.roughness");
            assert_eq!(mismatch.expected, InputKind::Float);
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
    assert!(context.device().commands().is_empty());
    assert_eq!(context.device().draw_count(), 0);
}

#[test]
fn resize_before_any_upload_is_safe_and_applies_to_next_draw() {
    let mut context = context();
    context.set_surface_size(1024, 768);
    context.resize();
    assert_eq!(context.viewport(), Viewport::covering(SurfaceSize::new(1024, 768)));

    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    context.draw(&sphere, &program, &light_uniforms(1)).unwrap();

    let commands = context.device().commands();
    let last_viewport = commands
        .iter()
        .rev()
        .find_map(|command| match command {
            DeviceCommand::SetViewport(viewport) => Some(*viewport),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_viewport, Viewport::covering(SurfaceSize::new(1024, 768)));
    assert_eq!(context.device().draw_count(), 1);
}

#[test]
fn surface_size_notifications_wait_for_resize() {
    let mut context = context();
    context.device_mut().take_commands();
    context.set_surface_size(320, 200);
    assert!(context.device().commands().is_empty());
    assert_eq!(context.viewport(), Viewport::covering(SurfaceSize::new(800, 600)));
}

#[test]
fn texture_unit_is_reused_across_draws_and_frames() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(2)).unwrap();
    let mut base = TextureResource::solid("base", [255, 0, 0, 255], PixelFormat::Rgba8UnormSrgb);
    let handle = context.upload_texture(&mut base).unwrap();
    context.device_mut().take_commands();

    let mut uniforms = light_uniforms(2);
    uniforms.set("baseColorMap", handle);
    for _ in 0..2 {
        context.clear().unwrap();
        for _ in 0..3 {
            context.draw(&sphere, &program, &uniforms).unwrap();
        }
        context.present().unwrap();
    }

    let commands = context.device().commands();
    let binds: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![(0, handle)]);
    assert_eq!(count(commands, |c| matches!(c, DeviceCommand::SetSamplerUnit { .. })), 1);
    assert_eq!(count(commands, |c| matches!(c, DeviceCommand::BindProgram(_))), 1);
    assert_eq!(context.device().draw_count(), 6);
    assert_eq!(context.frames_presented(), 2);
}

#[test]
fn distinct_textures_take_distinct_units_until_exhausted() {
    let mut context = Context::new(HeadlessDevice::new(64, 64).with_texture_units(1));
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    let mut base = TextureResource::solid("base", [255; 4], PixelFormat::Rgba8Unorm);
    let mut rough = TextureResource::solid("rough", [128; 4], PixelFormat::Rgba8Unorm);
    let base = context.upload_texture(&mut base).unwrap();
    let rough = context.upload_texture(&mut rough).unwrap();

    let uniforms = light_uniforms(1)
        .with("baseColorMap", base)
        .with("roughnessMap", rough);
    let err = context.draw(&sphere, &program, &uniforms).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Bind(BindError::TextureUnitsExhausted { capacity: 1 })
    ));
    assert_eq!(context.device().draw_count(), 0);
}

#[test]
fn undeclared_keys_are_ignored() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();

    let uniforms = light_uniforms(1)
        .with("uParameters.renderIBL", true)
        .with("uNotDeclared.anything", glam::Mat4::IDENTITY)
        .with("in_position", 1.0f32);
    context.draw(&sphere, &program, &uniforms).unwrap();
    context.draw(&sphere, &program, &uniforms).unwrap();
    assert_eq!(context.device().draw_count(), 2);
}

#[test]
fn npot_texture_round_trips_dimensions_and_keeps_handle_on_reupload() {
    let mut context = context();
    let mut texture = TextureResource::new("npot", 3, 5, PixelFormat::Rgba8Unorm, vec![9; 3 * 5 * 4]).unwrap();
    assert!(texture.handle().is_none());
    let handle = context.upload_texture(&mut texture).unwrap();
    assert_eq!(texture.handle(), Some(handle));

    let info = context.texture_info(handle).unwrap();
    assert_eq!((info.width, info.height), (3, 5));
    assert_eq!(info.format, PixelFormat::Rgba8Unorm);

    context.device_mut().take_commands();
    let again = context.upload_texture(&mut texture).unwrap();
    assert_eq!(again, handle);
    assert_eq!(
        context.device().commands(),
        &[
            DeviceCommand::DestroyTexture(handle),
            DeviceCommand::CreateTexture {
                handle,
                width: 3,
                height: 5
            },
        ]
    );
    assert_eq!(context.device().live_textures(), 1);

    context.release_texture(&mut texture);
    assert!(texture.handle().is_none());
    assert!(context.texture_info(handle).is_none());
}

#[test]
fn released_texture_cannot_be_bound() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    let mut texture = TextureResource::solid("gone", [0; 4], PixelFormat::Rgba8Unorm);
    let handle = context.upload_texture(&mut texture).unwrap();
    context.release_texture(&mut texture);

    let err = context
        .draw(&sphere, &program, &light_uniforms(1).with("baseColorMap", handle))
        .unwrap_err();
    assert!(matches!(err, RenderError::Bind(BindError::TextureNotUploaded { .. })));
}

#[test]
fn geometry_missing_an_attribute_is_a_bind_error() {
    let mut context = context();
    let mut flat = GeometryResource::builder("flat")
        .positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
        .indices(vec![0, 1, 2])
        .build()
        .unwrap();
    context.upload_geometry(&mut flat).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    context.device_mut().take_commands();

    let err = context.draw(&flat, &program, &UniformMap::new()).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Bind(BindError::MissingAttribute { ref attribute, .. }) if attribute == "in_normal"
    ));
    assert!(context.device().commands().is_empty());
}

#[test]
fn drawing_unuploaded_geometry_is_a_bind_error() {
    let mut context = context();
    let program = context.compile_program(&source(1)).unwrap();
    let sphere = grid_sphere(4);
    let err = context.draw(&sphere, &program, &UniformMap::new()).unwrap_err();
    assert!(matches!(err, RenderError::Bind(BindError::GeometryNotUploaded(_))));
}

#[test]
fn texture_value_for_float_is_a_type_mismatch() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    let mut texture = TextureResource::solid("t", [0; 4], PixelFormat::Rgba8Unorm);
    let handle = context.upload_texture(&mut texture).unwrap();

    let err = context
        .draw(&sphere, &program, &UniformMap::new().with("uMaterial.metalness", handle))
        .unwrap_err();
    assert!(matches!(err, RenderError::TypeMismatch(_)));

    let err = context
        .draw(&sphere, &program, &UniformMap::new().with("baseColorMap", 0.5f32))
        .unwrap_err();
    assert!(matches!(err, RenderError::TypeMismatch(_)));
}

#[test]
fn too_many_light_values_are_rejected() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(2)).unwrap();

    let uniforms = UniformMap::new().with("uPointLights.intensity[0]", UniformValue::FloatArray(vec![1.0; 3]));
    let err = context.draw(&sphere, &program, &uniforms).unwrap_err();
    assert!(matches!(err, RenderError::TypeMismatch(ref m) if m.found == "float[3]"));
}

#[test]
fn compile_errors_carry_their_stage() {
    let mut context = context();
    let broken = ShaderSource::new("broken", VERTEX, "#version 450\nvoid main() { oops }\n");
    match context.compile_program(&broken) {
        Err(RenderError::Compile(err)) => assert_eq!(err.stage, CompileStage::Fragment),
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert!(context.current_program().is_none());
}

#[test]
fn depth_test_changes_are_deduplicated() {
    let mut context = context();
    context.device_mut().take_commands();
    context.set_depth_test(true);
    context.set_depth_test(true);
    context.set_depth_test(false);
    assert_eq!(
        context.device().commands(),
        &[DeviceCommand::SetDepthTest(true), DeviceCommand::SetDepthTest(false)]
    );
}

#[test]
fn geometry_reupload_replaces_device_buffers_and_rebinds() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    let program = context.compile_program(&source(1)).unwrap();
    let first = context.upload_geometry(&mut sphere).unwrap();
    context.draw(&sphere, &program, &light_uniforms(1)).unwrap();
    context.device_mut().take_commands();

    let second = context.upload_geometry(&mut sphere).unwrap();
    assert_eq!(first, second);
    assert_eq!(sphere.handle(), Some(first));
    assert_eq!(context.device().live_geometries(), 1);

    context.draw(&sphere, &program, &light_uniforms(1)).unwrap();
    let commands = context.device().commands();
    let destroyed = commands
        .iter()
        .position(|c| *c == DeviceCommand::DestroyGeometry(first))
        .unwrap();
    let created = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::CreateGeometry { handle, .. } if *handle == first))
        .unwrap();
    let rebound = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::BindGeometry { handle, .. } if *handle == first))
        .unwrap();
    assert!(destroyed < created && created < rebound);
    assert_eq!(count(commands, |c| matches!(c, DeviceCommand::CreateGeometry { .. })), 1);
}

#[test]
fn counts_survive_draining_the_log() {
    let mut context = context();
    let mut sphere = grid_sphere(4);
    context.upload_geometry(&mut sphere).unwrap();
    let program = context.compile_program(&source(1)).unwrap();
    let mut base = TextureResource::solid("base", [255; 4], PixelFormat::Rgba8UnormSrgb);
    let base = context.upload_texture(&mut base).unwrap();

    let uniforms = light_uniforms(1).with("baseColorMap", base);
    context.draw(&sphere, &program, &uniforms).unwrap();
    let drained = context.device_mut().take_commands();
    context.draw(&sphere, &program, &uniforms).unwrap();

    let counts = context.device().counts();
    assert_eq!(counts.draws, 2);
    assert_eq!(counts.texture_binds, 1);
    let writes = count(&drained, |c| matches!(c, DeviceCommand::WriteUniform { .. }))
        + count(context.device().commands(), |c| matches!(c, DeviceCommand::WriteUniform { .. }));
    assert_eq!(counts.uniform_writes, writes);
}
