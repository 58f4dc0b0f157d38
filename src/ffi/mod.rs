//! FFI quarantine zone: all unsafe code of the crate lives here.
//!
//! # Safety Rules
//!
//! - Every `unsafe` block has a `// SAFETY:` comment
//! - No raw pointers escape this module; out-parameters are `&mut` borrows
//!   on the safe side of [`NativeDriver`](crate::driver::NativeDriver)
//! - No panic unwinds across the foreign boundary: the interrupt trampoline
//!   dispatches through a handler that catches panics
//!
//! # Module Structure
//!
//! ```text
//! ffi/
//! ├── mod.rs          # This file - module router
//! └── ctr700drv.rs    # extern "C" declarations, trampoline, LinkedDriver
//! ```

// Allow unsafe in this module only - quarantine zone
#![allow(unsafe_code)]

#[cfg(feature = "native")]
pub mod ctr700drv;
