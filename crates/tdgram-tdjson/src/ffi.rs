//! Runtime bindings to the tdjson client interface
//!
//! The shared library is opened with `libloading`, so the caller picks which
//! build of tdjson to use and a missing library is an ordinary error.

use std::ffi::{c_char, c_double, c_int, c_void, CStr, OsString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::Library;

type ClientCreate = unsafe extern "C" fn() -> *mut c_void;
type ClientSend = unsafe extern "C" fn(*mut c_void, *const c_char);
type ClientReceive = unsafe extern "C" fn(*mut c_void, c_double) -> *const c_char;
type ClientExecute = unsafe extern "C" fn(*mut c_void, *const c_char) -> *const c_char;
type ClientDestroy = unsafe extern "C" fn(*mut c_void);
type SetLogVerbosityLevel = unsafe extern "C" fn(c_int);
type FatalErrorCallback = extern "C" fn(*const c_char);
type SetLogFatalErrorCallback = unsafe extern "C" fn(Option<FatalErrorCallback>);

/// Platform file name of the library when no path is configured
pub fn default_library_name() -> OsString {
    libloading::library_filename("tdjson")
}

// ----------------------------------------------------------------------------
// Library
// ----------------------------------------------------------------------------

/// A loaded tdjson library and the entry points tdgram uses
///
/// The function pointers stay valid for as long as `_library` is loaded.
pub(crate) struct TdJsonLibrary {
    path: PathBuf,
    create: ClientCreate,
    send: ClientSend,
    receive: ClientReceive,
    execute: ClientExecute,
    destroy: ClientDestroy,
    set_log_verbosity_level: SetLogVerbosityLevel,
    set_log_fatal_error_callback: SetLogFatalErrorCallback,
    _library: Library,
}

impl TdJsonLibrary {
    /// Open `path`, or the platform's `tdjson` from the loader search path
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, libloading::Error> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(default_library_name()));

        // SAFETY: loading tdjson runs no initialisers with preconditions, and
        // every symbol type matches the library's C declarations
        unsafe {
            let library = Library::new(&path)?;
            let create = *library.get::<ClientCreate>(b"td_json_client_create\0")?;
            let send = *library.get::<ClientSend>(b"td_json_client_send\0")?;
            let receive = *library.get::<ClientReceive>(b"td_json_client_receive\0")?;
            let execute = *library.get::<ClientExecute>(b"td_json_client_execute\0")?;
            let destroy = *library.get::<ClientDestroy>(b"td_json_client_destroy\0")?;
            let set_log_verbosity_level =
                *library.get::<SetLogVerbosityLevel>(b"td_set_log_verbosity_level\0")?;
            let set_log_fatal_error_callback =
                *library.get::<SetLogFatalErrorCallback>(b"td_set_log_fatal_error_callback\0")?;

            Ok(Self {
                path,
                create,
                send,
                receive,
                execute,
                destroy,
                set_log_verbosity_level,
                set_log_fatal_error_callback,
                _library: library,
            })
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_log_verbosity_level(&self, level: i32) {
        // SAFETY: no preconditions
        unsafe { (self.set_log_verbosity_level)(level) }
    }

    pub(crate) fn install_fatal_error_callback(&self) {
        // SAFETY: the callback is a plain function valid for the program's lifetime
        unsafe { (self.set_log_fatal_error_callback)(Some(on_fatal_error)) }
    }
}

extern "C" fn on_fatal_error(message: *const c_char) {
    // SAFETY: the library passes a NUL-terminated message or null
    let message = unsafe { owned(message) }.unwrap_or_default();
    tracing::error!(%message, "tdjson fatal error");
}

unsafe fn owned(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
    }
}

// ----------------------------------------------------------------------------
// Client Handle
// ----------------------------------------------------------------------------

/// Owned tdjson client handle
///
/// The library allows `send` and `execute` from any thread; `receive` must
/// not run concurrently with itself, which the transport enforces.
pub(crate) struct RawClient {
    library: Arc<TdJsonLibrary>,
    handle: NonNull<c_void>,
}

// SAFETY: tdjson client handles may be used from any thread
unsafe impl Send for RawClient {}
unsafe impl Sync for RawClient {}

impl RawClient {
    pub(crate) fn create(library: Arc<TdJsonLibrary>) -> Option<Self> {
        // SAFETY: no preconditions
        let handle = NonNull::new(unsafe { (library.create)() })?;
        Some(Self { library, handle })
    }

    pub(crate) fn send(&self, request: &CStr) {
        // SAFETY: the handle is live and `request` is NUL-terminated
        unsafe { (self.library.send)(self.handle.as_ptr(), request.as_ptr()) }
    }

    /// Returns an owned copy; the library reuses its buffer on the next call
    pub(crate) fn receive(&self, timeout_secs: f64) -> Option<String> {
        // SAFETY: the handle is live; the result is valid until the next receive
        unsafe { owned((self.library.receive)(self.handle.as_ptr(), timeout_secs)) }
    }

    pub(crate) fn execute(&self, request: &CStr) -> Option<String> {
        // SAFETY: as for send; the result is copied before returning
        unsafe { owned((self.library.execute)(self.handle.as_ptr(), request.as_ptr())) }
    }
}

impl Drop for RawClient {
    fn drop(&mut self) {
        // SAFETY: the handle is destroyed exactly once, here
        unsafe { (self.library.destroy)(self.handle.as_ptr()) }
    }
}
