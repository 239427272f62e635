//! Process-wide tdjson setup
//!
//! Log verbosity and the fatal-error callback are global to the library, so
//! they are applied once per process. The first caller's verbosity wins.

use std::sync::Once;

use crate::ffi::TdJsonLibrary;

static INIT: Once = Once::new();

pub(crate) fn init_process(library: &TdJsonLibrary, verbosity: i32) {
    INIT.call_once(|| {
        library.set_log_verbosity_level(verbosity);
        library.install_fatal_error_callback();
        tracing::debug!(verbosity, "tdjson process settings applied");
    });
}
