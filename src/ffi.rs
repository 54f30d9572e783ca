//! C boundary for embedding the engine in non-Rust hosts.
//!
//! The engine lives in a process-wide cell: one `skiff_ocr_init` call
//! constructs it, every `skiff_ocr_run` call borrows it, and results cross
//! the boundary as heap-allocated JSON strings released through
//! `skiff_ocr_free_result`.

use crate::pipeline::OcrEngineBuilder;
use once_cell::sync::OnceCell;
use std::ffi::{CStr, CString, c_char};
use tracing::{error, warn};

static ENGINE: OnceCell<crate::pipeline::OcrEngine> = OnceCell::new();

/// Installs a tracing subscriber if the host process has none yet.
fn init_tracing_once() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Borrows a C string argument as `&str`, rejecting null and non-UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated string that
/// outlives the returned reference.
unsafe fn cstr_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Initializes the process-wide OCR engine.
///
/// Returns `true` on success. Calling again after a successful
/// initialization keeps the existing engine and returns `true`. Returns
/// `false` when any argument is null or not UTF-8, or when model or
/// dictionary loading fails; failure leaves the engine uninitialized so the
/// call can be retried.
///
/// # Safety
///
/// Each argument must be null or a valid NUL-terminated string pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_ocr_init(
    det_model_path: *const c_char,
    rec_model_path: *const c_char,
    dict_path: *const c_char,
) -> bool {
    init_tracing_once();

    let (Some(det), Some(rec), Some(dict)) = (
        unsafe { cstr_arg(det_model_path) },
        unsafe { cstr_arg(rec_model_path) },
        unsafe { cstr_arg(dict_path) },
    ) else {
        error!("skiff_ocr_init called with a null or non-UTF-8 path");
        return false;
    };

    if ENGINE.get().is_some() {
        warn!("skiff_ocr_init called again; keeping the existing engine");
        return true;
    }

    match OcrEngineBuilder::new(det, rec, dict).build() {
        Ok(engine) => {
            if ENGINE.set(engine).is_err() {
                warn!("skiff_ocr_init raced with another initialization; keeping the first engine");
            }
            true
        }
        Err(err) => {
            error!("engine initialization failed: {err}");
            false
        }
    }
}

/// Runs OCR on the image at `image_path`.
///
/// Returns a NUL-terminated JSON array of text lines
/// (`[{"box": [[x, y] * 4], "text": ..., "confidence": ...}]`), allocated
/// on this library's heap. Ownership transfers to the caller, who must
/// release it exactly once with [`skiff_ocr_free_result`]. Returns null if
/// the engine is uninitialized, the argument is null or not UTF-8, or the
/// pipeline fails; the cause is logged.
///
/// # Safety
///
/// `image_path` must be null or a valid NUL-terminated string pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_ocr_run(image_path: *const c_char) -> *mut c_char {
    let Some(engine) = ENGINE.get() else {
        error!("skiff_ocr_run called before skiff_ocr_init");
        return std::ptr::null_mut();
    };
    let Some(path) = (unsafe { cstr_arg(image_path) }) else {
        error!("skiff_ocr_run called with a null or non-UTF-8 path");
        return std::ptr::null_mut();
    };

    let lines = match engine.run(path) {
        Ok(lines) => lines,
        Err(err) => {
            error!("ocr run failed: {err}");
            return std::ptr::null_mut();
        }
    };

    let json = match serde_json::to_string(&lines) {
        Ok(json) => json,
        Err(err) => {
            error!("result serialization failed: {err}");
            return std::ptr::null_mut();
        }
    };

    match CString::new(json) {
        Ok(out) => out.into_raw(),
        Err(_) => {
            error!("result contains an interior NUL byte");
            std::ptr::null_mut()
        }
    }
}

/// Releases a string returned by [`skiff_ocr_run`]. Null is a no-op.
///
/// # Safety
///
/// `result` must be null or a pointer obtained from [`skiff_ocr_run`] that
/// has not already been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_ocr_free_result(result: *mut c_char) {
    if result.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(result) });
}
