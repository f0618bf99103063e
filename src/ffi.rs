//! C ABI entry points.
//!
//! The two kernels are exported as `Logit` and `LogitGrad` so a host can load
//! them from the shared library. Buffers are flat, contiguous and hold `len`
//! elements of the type given by the dtype code (see [`DType::code`]).
//!
//! Input and output pointers may alias; every element is read before the
//! same position is written.

use std::ffi::c_void;

use crate::dtype::{DType, LogitElement};
use crate::kernels::{self, FORWARD_OP, GRADIENT_OP};

/// Return codes of the exported functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    UnsupportedDType = 1,
    NullPointer = 2,
}

/// Resolves a dtype code to one the kernels accept.
fn float_dtype(op: &str, code: u32) -> Option<DType> {
    match DType::from_code(code) {
        Some(dtype) if dtype.is_float() => Some(dtype),
        other => {
            log::warn!("{op} called with unsupported dtype {other:?} (code {code})");
            None
        }
    }
}

unsafe fn forward_raw<T: LogitElement>(x: *const T, y: *mut T, len: usize) {
    log::trace!("{FORWARD_OP} over {len} {} element(s)", T::DTYPE);
    for i in 0..len {
        unsafe {
            let p = x.add(i).read();
            y.add(i).write(kernels::logit(p));
        }
    }
}

unsafe fn gradient_raw<T: LogitElement>(x: *const T, dz_dy: *const T, dz_dx: *mut T, len: usize) {
    log::trace!("{GRADIENT_OP} over {len} {} element(s)", T::DTYPE);
    for i in 0..len {
        unsafe {
            let p = x.add(i).read();
            let g = dz_dy.add(i).read();
            dz_dx.add(i).write(kernels::logit_grad(p, g));
        }
    }
}

/// `y[i] = logit(x[i])` for `i < len`.
///
/// # Safety
///
/// `x` must be valid for `len` reads and `y` for `len` writes of the element
/// type named by `dtype`. Both may point to the same buffer.
#[unsafe(export_name = "Logit")]
pub unsafe extern "C" fn logit_symbol(
    dtype: u32,
    x: *const c_void,
    y: *mut c_void,
    len: usize,
) -> i32 {
    let Some(dtype) = float_dtype(FORWARD_OP, dtype) else {
        return Status::UnsupportedDType as i32;
    };
    if len == 0 {
        return Status::Ok as i32;
    }
    if x.is_null() || y.is_null() {
        log::warn!("{FORWARD_OP} called with a null buffer");
        return Status::NullPointer as i32;
    }
    match dtype {
        DType::F32 => unsafe { forward_raw(x as *const f32, y as *mut f32, len) },
        _ => unsafe { forward_raw(x as *const f64, y as *mut f64, len) },
    }
    Status::Ok as i32
}

/// `dz_dx[i] = dz_dy[i] / (x[i] * (1 - x[i]))` for `i < len`.
///
/// # Safety
///
/// `x` and `dz_dy` must be valid for `len` reads and `dz_dx` for `len` writes
/// of the element type named by `dtype`.
#[unsafe(export_name = "LogitGrad")]
pub unsafe extern "C" fn logit_grad_symbol(
    dtype: u32,
    x: *const c_void,
    dz_dy: *const c_void,
    dz_dx: *mut c_void,
    len: usize,
) -> i32 {
    let Some(dtype) = float_dtype(GRADIENT_OP, dtype) else {
        return Status::UnsupportedDType as i32;
    };
    if len == 0 {
        return Status::Ok as i32;
    }
    if x.is_null() || dz_dy.is_null() || dz_dx.is_null() {
        log::warn!("{GRADIENT_OP} called with a null buffer");
        return Status::NullPointer as i32;
    }
    match dtype {
        DType::F32 => unsafe {
            gradient_raw(
                x as *const f32,
                dz_dy as *const f32,
                dz_dx as *mut f32,
                len,
            )
        },
        _ => unsafe {
            gradient_raw(
                x as *const f64,
                dz_dy as *const f64,
                dz_dx as *mut f64,
                len,
            )
        },
    }
    Status::Ok as i32
}
