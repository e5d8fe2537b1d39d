//! The two interleaved vertex formats the wrappers understand.
//!
//! | layout          | stride | slot 0          | slot 1           | slot 2          |
//! |-----------------|--------|-----------------|------------------|-----------------|
//! | `PosTex`        | 5      | position (3) @0 | texcoord (2) @3  |                 |
//! | `PosNormalTex`  | 8      | position (3) @0 | normal (3) @3    | texcoord (2) @6 |
//!
//! Strides and offsets are in floats.

use std::mem::size_of;

/// What a vertex attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    TexCoord,
}

/// One float attribute inside an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub slot: u32,
    pub semantic: Semantic,
    pub components: i32,
    /// Offset from the start of the vertex, in floats.
    pub offset: usize,
}

impl Attribute {
    pub fn offset_bytes(&self) -> usize {
        self.offset * size_of::<f32>()
    }
}

const POS_TEX: [Attribute; 2] = [
    Attribute {
        slot: 0,
        semantic: Semantic::Position,
        components: 3,
        offset: 0,
    },
    Attribute {
        slot: 1,
        semantic: Semantic::TexCoord,
        components: 2,
        offset: 3,
    },
];

const POS_NORMAL_TEX: [Attribute; 3] = [
    Attribute {
        slot: 0,
        semantic: Semantic::Position,
        components: 3,
        offset: 0,
    },
    Attribute {
        slot: 1,
        semantic: Semantic::Normal,
        components: 3,
        offset: 3,
    },
    Attribute {
        slot: 2,
        semantic: Semantic::TexCoord,
        components: 2,
        offset: 6,
    },
];

/// Fixed interleaved vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// `[pos3, tex2]`
    PosTex,
    /// `[pos3, normal3, tex2]`
    PosNormalTex,
}

impl Layout {
    pub fn with_normals(has_normals: bool) -> Self {
        if has_normals {
            Layout::PosNormalTex
        } else {
            Layout::PosTex
        }
    }

    pub fn has_normals(self) -> bool {
        self == Layout::PosNormalTex
    }

    /// Attributes in slot order.
    pub fn attributes(self) -> &'static [Attribute] {
        match self {
            Layout::PosTex => &POS_TEX,
            Layout::PosNormalTex => &POS_NORMAL_TEX,
        }
    }

    /// Floats per vertex.
    pub fn stride(self) -> usize {
        self.attributes()
            .iter()
            .map(|a| a.components as usize)
            .sum()
    }

    pub fn stride_bytes(self) -> usize {
        self.stride() * size_of::<f32>()
    }

    pub fn slot(self, slot: u32) -> Option<&'static Attribute> {
        self.attributes().iter().find(|a| a.slot == slot)
    }

    pub fn attribute(self, semantic: Semantic) -> Option<&'static Attribute> {
        self.attributes().iter().find(|a| a.semantic == semantic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_tex_shape() {
        let layout = Layout::with_normals(false);
        assert_eq!(layout, Layout::PosTex);
        assert_eq!(layout.stride(), 5);
        assert_eq!(layout.stride_bytes(), 20);

        let tex = layout.slot(1).expect("slot 1");
        assert_eq!(tex.semantic, Semantic::TexCoord);
        assert_eq!(tex.offset, 3);
        assert_eq!(tex.components, 2);
        assert!(layout.slot(2).is_none());
    }

    #[test]
    fn pos_normal_tex_shape() {
        let layout = Layout::with_normals(true);
        assert_eq!(layout.stride(), 8);

        let normal = layout.slot(1).expect("slot 1");
        assert_eq!(normal.semantic, Semantic::Normal);
        assert_eq!(normal.offset, 3);

        let tex = layout.slot(2).expect("slot 2");
        assert_eq!(tex.semantic, Semantic::TexCoord);
        assert_eq!(tex.offset, 6);
        assert_eq!(tex.offset_bytes(), 24);
    }

    #[test]
    fn position_is_always_slot_zero() {
        for layout in [Layout::PosTex, Layout::PosNormalTex] {
            let position = layout.attribute(Semantic::Position).expect("position");
            assert_eq!((position.slot, position.offset, position.components), (0, 0, 3));
        }
    }
}
