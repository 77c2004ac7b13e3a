//! Common types used across proxyview
//!
//! This module provides shared type definitions used by the decoders, the
//! negotiator and the driver façade.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::format::ResourceFormat;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque resource identity
///
/// `ResourceId::NULL` never names a resource. Fresh identities come from a
/// process-wide counter so backend handles and façade identities never collide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub const NULL: Self = Self(0);

    /// Allocate a new, never before seen identity
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Check if this is the null identity
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceId::{}", self.0)
    }
}

/// One (mip, slice, sample) coordinate within a texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subresource {
    pub mip: u32,
    pub slice: u32,
    pub sample: u32,
}

impl Subresource {
    pub fn new(mip: u32, slice: u32) -> Self {
        Self { mip, slice, sample: 0 }
    }

    /// Coordinate for a flat `slice * mips + mip` index
    pub fn from_index(index: u32, mips: u32) -> Self {
        let mips = mips.max(1);
        Self::new(index % mips, index / mips)
    }

    /// Flat index into a subresource list ordered slice-major
    pub fn index(&self, mips: u32) -> usize {
        self.slice as usize * mips.max(1) as usize + self.mip as usize
    }
}

/// Texture shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureType {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    TextureCube,
    TextureCubeArray,
    Texture3D,
}

impl TextureType {
    /// Derive type and dimension from the structural fields.
    ///
    /// depth > 1 wins over cubemap, which wins over height > 1.
    pub fn derive(height: u32, depth: u32, array_size: u32, cubemap: bool) -> (Self, u32) {
        let arrayed = array_size > 1;
        if depth > 1 {
            (TextureType::Texture3D, 3)
        } else if cubemap {
            let ty = if arrayed { TextureType::TextureCubeArray } else { TextureType::TextureCube };
            (ty, 2)
        } else if height > 1 {
            let ty = if arrayed { TextureType::Texture2DArray } else { TextureType::Texture2D };
            (ty, 2)
        } else {
            let ty = if arrayed { TextureType::Texture1DArray } else { TextureType::Texture1D };
            (ty, 1)
        }
    }
}

/// Texture usage categories
pub mod texture_category {
    pub const SHADER_READ: u32 = 0x1;
    pub const COLOR_TARGET: u32 = 0x2;
    pub const DEPTH_TARGET: u32 = 0x4;
    pub const SHADER_READ_WRITE: u32 = 0x8;
}

/// Canonical texture metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDescription {
    pub resource_id: ResourceId,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub mips: u32,
    pub cubemap: bool,
    pub dimension: u32,
    pub texture_type: TextureType,
    pub format: ResourceFormat,
    pub creation_flags: u32,
    pub ms_samples: u32,
    pub ms_quality: u32,
    pub byte_size: u64,
}

impl TextureDescription {
    /// Check whether `other` can reuse a texture created for `self`
    ///
    /// Structural fields are the dimensions, mip/array counts, cubemap flag
    /// and pixel format. Identity, byte size and flags are not structural.
    pub fn same_structure(&self, other: &TextureDescription) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.cubemap == other.cubemap
            && self.mips == other.mips
            && self.array_size == other.array_size
            && self.format == other.format
    }

    /// Number of (mip, slice) subresources
    pub fn subresource_count(&self) -> usize {
        self.array_size.max(1) as usize * self.mips.max(1) as usize
    }

    /// Width, height and depth of a mip level
    pub fn mip_dimensions(&self, mip: u32) -> (u32, u32, u32) {
        (
            self.width.checked_shr(mip).unwrap_or(0).max(1),
            self.height.checked_shr(mip).unwrap_or(0).max(1),
            self.depth.checked_shr(mip).unwrap_or(0).max(1),
        )
    }

    /// Recompute `texture_type` and `dimension` from the structural fields
    pub fn refresh_type(&mut self) {
        let (ty, dim) = TextureType::derive(self.height, self.depth, self.array_size, self.cubemap);
        self.texture_type = ty;
        self.dimension = dim;
    }
}

impl Default for TextureDescription {
    fn default() -> Self {
        Self {
            resource_id: ResourceId::NULL,
            width: 1,
            height: 1,
            depth: 1,
            array_size: 1,
            mips: 1,
            cubemap: false,
            dimension: 2,
            texture_type: TextureType::Texture2D,
            format: ResourceFormat::rgba8_srgb(),
            creation_flags: texture_category::SHADER_READ | texture_category::COLOR_TARGET,
            ms_samples: 1,
            ms_quality: 0,
            byte_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert!(ResourceId::NULL.is_null());
    }

    #[test]
    fn test_subresource_indexing() {
        let sub = Subresource::from_index(7, 3);
        assert_eq!(sub, Subresource::new(1, 2));
        assert_eq!(sub.index(3), 7);
    }

    #[test]
    fn test_type_derivation() {
        assert_eq!(TextureType::derive(16, 4, 1, false), (TextureType::Texture3D, 3));
        assert_eq!(TextureType::derive(16, 1, 6, true), (TextureType::TextureCube, 2));
        assert_eq!(TextureType::derive(16, 1, 12, true), (TextureType::TextureCubeArray, 2));
        assert_eq!(TextureType::derive(16, 1, 1, false), (TextureType::Texture2D, 2));
        assert_eq!(TextureType::derive(16, 1, 3, false), (TextureType::Texture2DArray, 2));
        assert_eq!(TextureType::derive(1, 1, 1, false), (TextureType::Texture1D, 1));
        assert_eq!(TextureType::derive(1, 1, 2, false), (TextureType::Texture1DArray, 1));
    }

    #[test]
    fn test_same_structure_ignores_identity() {
        let a = TextureDescription { width: 8, height: 8, ..Default::default() };
        let mut b = a.clone();
        b.resource_id = ResourceId::next();
        b.byte_size = 1234;
        assert!(a.same_structure(&b));

        b.width = 16;
        assert!(!a.same_structure(&b));
    }

    #[test]
    fn test_mip_dimensions_clamp() {
        let desc = TextureDescription { width: 8, height: 2, depth: 4, ..Default::default() };
        assert_eq!(desc.mip_dimensions(0), (8, 2, 4));
        assert_eq!(desc.mip_dimensions(2), (2, 1, 1));
        assert_eq!(desc.mip_dimensions(5), (1, 1, 1));
        assert_eq!(desc.mip_dimensions(32), (1, 1, 1));
        assert_eq!(desc.mip_dimensions(u32::MAX), (1, 1, 1));
    }
}
