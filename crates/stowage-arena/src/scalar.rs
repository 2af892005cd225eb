//! Fixed-width little-endian values readable from and writable to bytes.

use byteorder::{ByteOrder, LittleEndian};

/// A fixed-width value with a little-endian byte encoding.
///
/// `read` and `write` take slices of exactly [`Scalar::WIDTH`] bytes;
/// callers bounds-check before slicing.
pub trait Scalar: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Decode from `buf`.
    fn read(buf: &[u8]) -> Self;

    /// Encode into `buf`.
    fn write(self, buf: &mut [u8]);
}

impl Scalar for u8 {
    const WIDTH: usize = 1;

    fn read(buf: &[u8]) -> Self {
        buf[0]
    }

    fn write(self, buf: &mut [u8]) {
        buf[0] = self;
    }
}

impl Scalar for i8 {
    const WIDTH: usize = 1;

    fn read(buf: &[u8]) -> Self {
        buf[0] as i8
    }

    fn write(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }
}

impl Scalar for bool {
    const WIDTH: usize = 1;

    fn read(buf: &[u8]) -> Self {
        buf[0] != 0
    }

    fn write(self, buf: &mut [u8]) {
        buf[0] = u8::from(self);
    }
}

macro_rules! impl_scalar_le {
    ($($ty:ty => $read:ident, $write:ident);* $(;)?) => {
        $(
            impl Scalar for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn read(buf: &[u8]) -> Self {
                    LittleEndian::$read(buf)
                }

                fn write(self, buf: &mut [u8]) {
                    LittleEndian::$write(buf, self);
                }
            }
        )*
    };
}

impl_scalar_le! {
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}
