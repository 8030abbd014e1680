use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::Once;

/// Forward whisper.cpp / ggml log lines into `tracing`.
///
/// whisper.cpp prints to stderr by default; routing through `tracing` keeps it behind the
/// same filter as the rest of our diagnostics.
unsafe extern "C" fn whisper_log_callback(
    _level: u32,
    c_msg: *const c_char,
    _user_data: *mut c_void,
) {
    if c_msg.is_null() {
        return;
    }

    // SAFETY: whisper.cpp hands us a NUL-terminated string valid for the duration of the call.
    let msg = unsafe { CStr::from_ptr(c_msg) }.to_string_lossy();
    let msg = trim_line(&msg);
    if !msg.is_empty() {
        tracing::trace!(target: "whisper_cpp", "{msg}");
    }
}

fn trim_line<'a>(msg: &'a Cow<'_, str>) -> &'a str {
    msg.trim_end_matches(['\n', '\r'])
}

/// Install the forwarding callback exactly once for the lifetime of the process.
pub(crate) fn init_whisper_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    });
}
