//! Fixed-width ASCII slots.
//!
//! Names and labels travel in caller-provided byte arrays of 8, 24, 32 or 64
//! bytes. Writing is lossy: non-ASCII characters are dropped and the text is
//! cut so that a terminating null always fits. Reading stops at the first
//! null byte.

use std::ffi::{c_char, CStr};
use std::fmt;

/// Fixed-size, null-terminated ASCII buffer with the wire layout of a
/// `char[N]` slot.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct AsciiBuf<const N: usize>([u8; N]);

/// Parameter name, label and display text.
pub type Ascii8 = AsciiBuf<8>;
/// Program names.
pub type Ascii24 = AsciiBuf<24>;
/// Plugin (effect) name.
pub type Ascii32 = AsciiBuf<32>;
/// Vendor and product strings, pin and parameter labels.
pub type Ascii64 = AsciiBuf<64>;

impl<const N: usize> AsciiBuf<N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self([0; N])
    }

    pub fn encode(text: &str) -> Self {
        let mut buf = Self::new();
        copy_ascii(&mut buf.0, text);
        buf
    }

    pub fn decode(&self) -> String {
        read_ascii(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; N] {
        &mut self.0
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }
}

impl<const N: usize> Default for AsciiBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<[u8; N]> for AsciiBuf<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> fmt::Display for AsciiBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decode())
    }
}

impl<const N: usize> fmt::Debug for AsciiBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ascii{}({:?})", N, self.decode())
    }
}

/// Writes the ASCII characters of `text` into `dst`, truncated to
/// `dst.len() - 1` bytes, and null-fills the remainder. Returns the number
/// of content bytes written.
pub fn copy_ascii(dst: &mut [u8], text: &str) -> usize {
    if dst.is_empty() {
        return 0;
    }
    let limit = dst.len() - 1;
    let mut written = 0;
    for byte in text.chars().filter(char::is_ascii).map(|c| c as u8) {
        if written == limit {
            break;
        }
        dst[written] = byte;
        written += 1;
    }
    dst[written..].fill(0);
    written
}

/// Decodes bytes up to, excluding, the first null. The whole slice is used
/// when no null is present. Non-ASCII bytes are dropped.
pub fn read_ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

/// Writes into a foreign `char[N]` slot.
///
/// # Safety
/// `ptr` must be null or valid for writes of `N` bytes.
pub unsafe fn write_slot<const N: usize>(ptr: *mut std::ffi::c_void, text: &str) -> bool {
    if ptr.is_null() {
        return false;
    }
    // SAFETY: the caller guarantees N writable bytes behind ptr.
    let slot = unsafe { std::slice::from_raw_parts_mut(ptr as *mut u8, N) };
    copy_ascii(slot, text);
    true
}

/// Reads a foreign null-terminated string of unknown length.
///
/// # Safety
/// `ptr` must be null or point to a valid null-terminated string.
pub unsafe fn read_c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        // SAFETY: the caller guarantees a terminated string.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}
