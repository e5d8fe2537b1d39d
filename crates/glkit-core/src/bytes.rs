//! Byte views of plain vertex and index data for buffer upload.

/// Types that can be uploaded to a GPU buffer verbatim.
///
/// # Safety
///
/// Only implement on `#[repr(C)]` structs (or primitives) whose fields are
/// all plain numeric types (f32, i32, u32, etc.) with no pointers,
/// references, or padding bytes.
///
/// # Example
///
/// ```rust
/// use glkit_core::AsBytes;
///
/// #[repr(C)]
/// struct ColoredVertex {
///     position: [f32; 3],
///     color: [f32; 3],
/// }
///
/// unsafe impl AsBytes for ColoredVertex {}
///
/// let v = ColoredVertex { position: [0.0; 3], color: [1.0; 3] };
/// assert_eq!(v.as_bytes().len(), 24);
/// ```
pub unsafe trait AsBytes: Sized {
    /// View `self` as a byte slice of length `size_of::<Self>()`.
    fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, std::mem::size_of::<Self>())
        }
    }
}

unsafe impl AsBytes for f32 {}
unsafe impl AsBytes for u32 {}
unsafe impl AsBytes for i32 {}
unsafe impl AsBytes for u8 {}
unsafe impl<T: AsBytes, const N: usize> AsBytes for [T; N] {}

/// View a slice of plain values as its underlying bytes.
pub fn slice_as_bytes<T: AsBytes>(items: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(items.as_ptr() as *const u8, std::mem::size_of_val(items)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_view_covers_every_element() {
        let data = [1.0f32, 2.0, 3.0];
        let bytes = slice_as_bytes(&data);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[4..8], &2.0f32.to_ne_bytes());
    }

    #[test]
    fn arrays_are_plain_data() {
        let indices = [[0u32, 1, 3], [1, 2, 3]];
        assert_eq!(slice_as_bytes(&indices).len(), 24);
    }
}
