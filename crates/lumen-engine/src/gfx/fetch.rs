//! Draw-time bounds checks shared by the backends.
//!
//! Both backends reject a draw before anything is rasterized or recorded if it would read
//! past the end of a vertex or index buffer.

use super::error::GfxError;
use super::types::{IndexFormat, VertexAttribute};

/// Checks that vertices `0..=max_vertex` of `desc` fit in a buffer of `available` bytes.
/// Returns the byte just past the furthest element read. A draw that reads no vertex
/// (`None`) reads no bytes.
pub(crate) fn check_attribute(
    desc: &VertexAttribute,
    max_vertex: Option<u32>,
    available: u64,
) -> Result<u64, GfxError> {
    let Some(max_vertex) = max_vertex else {
        return Ok(0);
    };
    let out_of_bounds = |required| GfxError::AttributeOutOfBounds {
        slot: desc.slot,
        required,
        available,
    };
    let end = u64::from(max_vertex)
        .checked_mul(desc.effective_stride())
        .and_then(|bytes| bytes.checked_add(desc.offset))
        .and_then(|bytes| bytes.checked_add(desc.byte_size()))
        .ok_or(out_of_bounds(u64::MAX))?;
    if end > available {
        return Err(out_of_bounds(end));
    }
    Ok(end)
}

/// Decodes the first `count` indices of an index buffer.
pub(crate) fn decode_indices(
    data: &[u8],
    count: u32,
    format: IndexFormat,
) -> Result<Vec<u32>, GfxError> {
    let limit = data.len() as u64 / format.size();
    if u64::from(count) > limit {
        return Err(GfxError::IndexOutOfBounds {
            index: u64::from(count),
            limit,
        });
    }
    let count = count as usize;
    Ok(match format {
        IndexFormat::U16 => data
            .chunks_exact(2)
            .take(count)
            .map(|b| u32::from(u16::from_le_bytes([b[0], b[1]])))
            .collect(),
        IndexFormat::U32 => data
            .chunks_exact(4)
            .take(count)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    })
}

/// Vertex ids of a non-indexed draw of `count` vertices starting at `first`.
pub(crate) fn array_range(first: u32, count: u32) -> Result<std::ops::Range<u32>, GfxError> {
    let end = first.checked_add(count).ok_or(GfxError::IndexOutOfBounds {
        index: u64::from(first) + u64::from(count),
        limit: u64::from(u32::MAX),
    })?;
    Ok(first..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_extent_is_exact() {
        // Four packed vec3 positions: 4 * 12 bytes.
        let a = VertexAttribute::f32(0, 3, 12, 0);
        assert_eq!(check_attribute(&a, Some(3), 48), Ok(48));
        assert_eq!(
            check_attribute(&a, Some(4), 48),
            Err(GfxError::AttributeOutOfBounds {
                slot: 0,
                required: 60,
                available: 48
            })
        );
    }

    #[test]
    fn interleaved_attribute_respects_offset() {
        // pos3 + uv2, stride 20; uv sits at byte 12.
        let uv = VertexAttribute::f32(1, 2, 20, 12);
        assert_eq!(check_attribute(&uv, Some(35), 36 * 20), Ok(36 * 20));
    }

    #[test]
    fn empty_draw_reads_nothing() {
        let a = VertexAttribute::f32(0, 2, 8, 0);
        assert_eq!(check_attribute(&a, None, 0), Ok(0));
    }

    #[test]
    fn huge_offset_is_out_of_bounds() {
        let a = VertexAttribute::f32(0, 2, 8, u64::MAX - 4);
        assert_eq!(
            check_attribute(&a, Some(2), 24),
            Err(GfxError::AttributeOutOfBounds {
                slot: 0,
                required: u64::MAX,
                available: 24
            })
        );
        let wide = VertexAttribute::f32(0, 4, u64::MAX / 2, 0);
        assert!(check_attribute(&wide, Some(3), 64).is_err());
    }

    #[test]
    fn indices_are_decoded_and_bounded() {
        let data: Vec<u8> = bytemuck::cast_slice(&[0u16, 1, 3, 1, 2, 3]).to_vec();
        assert_eq!(decode_indices(&data, 6, IndexFormat::U16), Ok(vec![0, 1, 3, 1, 2, 3]));
        assert!(matches!(
            decode_indices(&data, 4, IndexFormat::U32),
            Err(GfxError::IndexOutOfBounds { index: 4, limit: 3 })
        ));
    }

    #[test]
    fn array_range_rejects_overflow() {
        assert_eq!(array_range(2, 3), Ok(2..5));
        assert!(array_range(u32::MAX, 1).is_err());
    }
}
