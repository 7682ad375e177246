//! Thin wrapper over the platform iconv subsystem.
//!
//! This module owns the three raw operations the rest of the crate is
//! built on: `iconv_open`, the single-step `iconv` call, and
//! `iconv_close`. It does no encoding work itself and no error
//! classification beyond capturing `errno`.

use std::ffi::CString;
use std::io;

/// Value returned by `iconv_open` on failure, `(iconv_t)-1` in C.
const INVALID_DESCRIPTOR: usize = usize::MAX;

/// Owned conversion descriptor for one (from, to) encoding pair.
///
/// The handle is a unique resource: `Descriptor` is deliberately not
/// `Clone`, and `Drop` closes it exactly once. Moving the value moves
/// the handle with it.
#[derive(Debug)]
pub(crate) struct Descriptor {
    cd: libc::iconv_t,
}

// The descriptor's internal shift state travels with the handle; it is
// not tied to the thread that opened it. `&mut` is still required for
// stepping, so there is no shared-state access to make `Sync` a question.
unsafe impl Send for Descriptor {}

/// Outcome of one conversion step.
pub(crate) struct Step {
    /// Input bytes the subsystem consumed this step.
    pub consumed: usize,
    /// Output bytes written into the scratch buffer this step.
    pub written: usize,
    /// Raw `errno` if the step stopped early, `None` if the whole
    /// remaining input was converted.
    pub stop: Option<i32>,
}

impl Descriptor {
    /// Acquire a descriptor converting `from` into `to`.
    ///
    /// Returns the raw `errno` on failure; classification into error
    /// kinds happens at the crate surface.
    pub fn open(from: &str, to: &str) -> Result<Self, i32> {
        // An embedded NUL can never name a real encoding.
        let from_c = CString::new(from).map_err(|_| libc::EINVAL)?;
        let to_c = CString::new(to).map_err(|_| libc::EINVAL)?;

        let cd = unsafe { libc::iconv_open(to_c.as_ptr(), from_c.as_ptr()) };
        if cd as usize == INVALID_DESCRIPTOR {
            return Err(last_errno());
        }
        Ok(Self { cd })
    }

    /// Run one conversion step over `input`, writing into `scratch`.
    ///
    /// The subsystem consumes as many input bytes as it can and writes
    /// as much converted output as fits; both counts are reported even
    /// when the step stops early, so partial progress is never lost.
    pub fn step(&mut self, input: &[u8], scratch: &mut [u8]) -> Step {
        let mut in_ptr = input.as_ptr() as *mut libc::c_char;
        let mut in_left: libc::size_t = input.len();
        let mut out_ptr = scratch.as_mut_ptr() as *mut libc::c_char;
        let mut out_left: libc::size_t = scratch.len();

        let rc = unsafe {
            libc::iconv(
                self.cd,
                &mut in_ptr,
                &mut in_left,
                &mut out_ptr,
                &mut out_left,
            )
        };

        Step {
            consumed: input.len() - in_left,
            written: scratch.len() - out_left,
            stop: (rc == libc::size_t::MAX).then(last_errno),
        }
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        // Close failures have nowhere to go; the handle is gone either way.
        unsafe {
            libc::iconv_close(self.cd);
        }
    }
}

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
