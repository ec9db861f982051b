//! Named uniform sets packed to std140.
//!
//! Effects declare their uniform block once as an ordered `name -> value`
//! list; the block computes std140 offsets, keeps a CPU byte mirror, and the
//! paired [`UniformBuffer`] writes the whole mirror through the queue each
//! frame. Updating a value by name never reallocates the GPU buffer, which
//! is what makes live config tweaks cheap.
//!
//! The GLSL side must declare the same members in the same order; std140
//! then yields identical offsets on both sides.

use thiserror::Error;

/// A single uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    /// Stored as a 4-byte integer, matching GLSL `bool` in std140 blocks.
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major, as produced by the usual math crates.
    Mat4([[f32; 4]; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformValue {
    fn kind(&self) -> Kind {
        match self {
            UniformValue::Float(_) => Kind::Float,
            UniformValue::Int(_) => Kind::Int,
            UniformValue::Bool(_) => Kind::Bool,
            UniformValue::Vec2(_) => Kind::Vec2,
            UniformValue::Vec3(_) => Kind::Vec3,
            UniformValue::Vec4(_) => Kind::Vec4,
            UniformValue::Mat4(_) => Kind::Mat4,
        }
    }
}

impl Kind {
    fn align(self) -> usize {
        match self {
            Kind::Float | Kind::Int | Kind::Bool => 4,
            Kind::Vec2 => 8,
            Kind::Vec3 | Kind::Vec4 | Kind::Mat4 => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            Kind::Float | Kind::Int | Kind::Bool => 4,
            Kind::Vec2 => 8,
            Kind::Vec3 => 12,
            Kind::Vec4 => 16,
            Kind::Mat4 => 64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Float => "float",
            Kind::Int => "int",
            Kind::Bool => "bool",
            Kind::Vec2 => "vec2",
            Kind::Vec3 => "vec3",
            Kind::Vec4 => "vec4",
            Kind::Mat4 => "mat4",
        }
    }
}

#[derive(Debug, Error)]
pub enum UniformError {
    #[error("unknown uniform '{0}'")]
    UnknownName(String),
    #[error("uniform '{name}' is {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("duplicate uniform '{0}'")]
    DuplicateName(String),
}

struct Entry {
    name: String,
    kind: Kind,
    offset: usize,
}

/// CPU mirror of one std140 uniform block.
pub struct UniformBlock {
    entries: Vec<Entry>,
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Lays the values out in declaration order and seeds the byte mirror.
    pub fn build(values: Vec<(&str, UniformValue)>) -> Result<Self, UniformError> {
        let mut entries = Vec::with_capacity(values.len());
        let mut cursor = 0usize;
        for (name, value) in &values {
            if entries.iter().any(|entry: &Entry| entry.name == *name) {
                return Err(UniformError::DuplicateName((*name).to_owned()));
            }
            let kind = value.kind();
            let offset = align_up(cursor, kind.align());
            cursor = offset + kind.size();
            entries.push(Entry {
                name: (*name).to_owned(),
                kind,
                offset,
            });
        }

        let mut block = Self {
            entries,
            bytes: vec![0u8; align_up(cursor.max(4), 16)],
        };
        for (name, value) in values {
            block.set(name, value)?;
        }
        Ok(block)
    }

    /// Writes `value` at its std140 slot.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| UniformError::UnknownName(name.to_owned()))?;
        if entry.kind != value.kind() {
            return Err(UniformError::TypeMismatch {
                name: name.to_owned(),
                expected: entry.kind.name(),
                found: value.kind().name(),
            });
        }
        write_value(&mut self.bytes[entry.offset..], &value);
        Ok(())
    }

    /// std140 offset of a member, if declared.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.offset)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

fn write_value(out: &mut [u8], value: &UniformValue) {
    match value {
        UniformValue::Float(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
        UniformValue::Int(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
        UniformValue::Bool(v) => out[..4].copy_from_slice(&u32::from(*v).to_le_bytes()),
        UniformValue::Vec2(v) => write_floats(out, v),
        UniformValue::Vec3(v) => write_floats(out, v),
        UniformValue::Vec4(v) => write_floats(out, v),
        UniformValue::Mat4(columns) => {
            for (index, column) in columns.iter().enumerate() {
                write_floats(&mut out[index * 16..], column);
            }
        }
    }
}

fn write_floats(out: &mut [u8], values: &[f32]) {
    for (index, value) in values.iter().enumerate() {
        out[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// A [`UniformBlock`] bound to a GPU buffer and bind group.
pub struct UniformBuffer {
    block: UniformBlock,
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl UniformBuffer {
    pub fn new(device: &wgpu::Device, label: &str, block: UniformBlock) -> Self {
        use wgpu::util::DeviceExt;

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: block.as_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            block,
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        self.block.set(name, value)
    }

    /// Writes the CPU mirror through the queue.
    pub fn upload(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, self.block.as_bytes());
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std140_offsets_follow_alignment_rules() {
        let block = UniformBlock::build(vec![
            ("resolution", UniformValue::Vec4([800.0, 600.0, 0.0, 0.0])),
            ("tint", UniformValue::Vec3([1.0, 0.5, 0.25])),
            ("gain", UniformValue::Float(1.0)),
            ("offset", UniformValue::Vec2([0.0, 0.0])),
            ("frame", UniformValue::Int(0)),
            ("enabled", UniformValue::Bool(true)),
        ])
        .unwrap();

        assert_eq!(block.offset_of("resolution"), Some(0));
        assert_eq!(block.offset_of("tint"), Some(16));
        // A float may pack directly after a vec3's 12 bytes.
        assert_eq!(block.offset_of("gain"), Some(28));
        assert_eq!(block.offset_of("offset"), Some(32));
        assert_eq!(block.offset_of("frame"), Some(40));
        assert_eq!(block.offset_of("enabled"), Some(44));
        assert_eq!(block.byte_len(), 48);
    }

    #[test]
    fn vec2_after_scalar_skips_to_eight_byte_boundary() {
        let block = UniformBlock::build(vec![
            ("a", UniformValue::Float(0.0)),
            ("b", UniformValue::Vec2([0.0, 0.0])),
        ])
        .unwrap();
        assert_eq!(block.offset_of("b"), Some(8));
        assert_eq!(block.byte_len(), 16);
    }

    #[test]
    fn mat4_occupies_four_columns() {
        let block = UniformBlock::build(vec![
            ("m", UniformValue::Mat4([[0.0; 4]; 4])),
            ("t", UniformValue::Float(0.0)),
        ])
        .unwrap();
        assert_eq!(block.offset_of("t"), Some(64));
        assert_eq!(block.byte_len(), 80);
    }

    #[test]
    fn set_rejects_unknown_names_and_type_mismatches() {
        let mut block =
            UniformBlock::build(vec![("speed", UniformValue::Float(1.0))]).unwrap();
        assert!(matches!(
            block.set("missing", UniformValue::Float(0.0)),
            Err(UniformError::UnknownName(_))
        ));
        assert!(matches!(
            block.set("speed", UniformValue::Vec2([0.0, 0.0])),
            Err(UniformError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn set_updates_bytes_in_place() {
        let mut block =
            UniformBlock::build(vec![("speed", UniformValue::Float(1.0))]).unwrap();
        let before = block.byte_len();
        block.set("speed", UniformValue::Float(4.0)).unwrap();
        assert_eq!(block.byte_len(), before);
        assert_eq!(&block.as_bytes()[0..4], &4.0f32.to_le_bytes());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = UniformBlock::build(vec![
            ("speed", UniformValue::Float(1.0)),
            ("speed", UniformValue::Float(2.0)),
        ]);
        assert!(matches!(result, Err(UniformError::DuplicateName(_))));
    }

    #[test]
    fn bool_packs_as_four_byte_integer() {
        let block = UniformBlock::build(vec![("flag", UniformValue::Bool(true))]).unwrap();
        assert_eq!(&block.as_bytes()[0..4], &1u32.to_le_bytes());
    }
}
