//! Packed RGBA8 texels.
//!
//! Byte layout matches WGSL `pack4x8unorm`: red in the low byte, alpha in
//! the high byte. Alpha is the occupancy flag, so `0` is the empty
//! sentinel and every written voxel carries `0xFF` in the top byte.

/// The empty texel.
pub const EMPTY_TEXEL: u32 = 0;

/// Packs a linear RGBA color, clamping each channel to `[0, 1]`.
#[must_use]
pub fn pack_rgba8(color: [f32; 4]) -> u32 {
    let bytes = color.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8);
    u32::from_le_bytes(bytes)
}

/// Unpacks into linear RGBA in `[0, 1]`.
#[must_use]
pub fn unpack_rgba8(texel: u32) -> [f32; 4] {
    texel.to_le_bytes().map(|b| f32::from(b) / 255.0)
}

/// Packs a surface color as an occupied texel (alpha forced to 1).
#[must_use]
pub fn occupied_texel(albedo: [f32; 4]) -> u32 {
    pack_rgba8([albedo[0], albedo[1], albedo[2], 1.0])
}

/// Alpha byte of a texel.
#[must_use]
pub const fn alpha(texel: u32) -> u8 {
    (texel >> 24) as u8
}

/// True if the texel holds geometry.
#[must_use]
pub const fn is_occupied(texel: u32) -> bool {
    alpha(texel) != 0
}

/// Downsample filter for one parent texel.
///
/// Alpha is the maximum of the children, so a parent is occupied when any
/// child is. Color is the mean of the occupied children only.
#[must_use]
pub fn downsample(children: &[u32; 8]) -> u32 {
    let mut sum = [0u32; 3];
    let mut occupied = 0u32;
    let mut max_alpha = 0u8;
    for &texel in children {
        let a = alpha(texel);
        if a == 0 {
            continue;
        }
        let [r, g, b, _] = texel.to_le_bytes();
        sum[0] += u32::from(r);
        sum[1] += u32::from(g);
        sum[2] += u32::from(b);
        occupied += 1;
        max_alpha = max_alpha.max(a);
    }
    if occupied == 0 {
        return EMPTY_TEXEL;
    }
    let mean = sum.map(|s| ((s + occupied / 2) / occupied) as u8);
    u32::from_le_bytes([mean[0], mean[1], mean[2], max_alpha])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout_matches_wgsl() {
        assert_eq!(pack_rgba8([1.0, 0.0, 0.0, 0.0]), 0x0000_00FF);
        assert_eq!(pack_rgba8([0.0, 0.0, 0.0, 1.0]), 0xFF00_0000);
        assert_eq!(pack_rgba8([2.0, -1.0, 0.5, 1.0]), 0xFF80_00FF);
    }

    #[test]
    fn test_occupied_texel_is_never_empty() {
        let texel = occupied_texel([0.0, 0.0, 0.0, 0.0]);
        assert!(is_occupied(texel));
        assert_ne!(texel, EMPTY_TEXEL);
        assert!(!is_occupied(EMPTY_TEXEL));
    }

    #[test]
    fn test_unpack() {
        let rgba = unpack_rgba8(0xFF00_FF00);
        assert_eq!(rgba, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_downsample_ignores_empty_children() {
        let red = occupied_texel([1.0, 0.0, 0.0, 1.0]);
        let mut children = [EMPTY_TEXEL; 8];
        children[5] = red;
        assert_eq!(downsample(&children), red);
        assert_eq!(downsample(&[EMPTY_TEXEL; 8]), EMPTY_TEXEL);
    }

    #[test]
    fn test_downsample_averages_color() {
        let mut children = [occupied_texel([1.0, 0.0, 0.0, 1.0]); 8];
        for child in children.iter_mut().skip(4) {
            *child = occupied_texel([0.0, 0.0, 1.0, 1.0]);
        }
        let [r, g, b, a] = downsample(&children).to_le_bytes();
        assert_eq!((r, g, b, a), (128, 0, 128, 255));
    }
}
