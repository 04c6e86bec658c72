use std::panic;

/// Readable backtraces in debug builds, and a log line before the default hook
/// so a crash shows up in the log file too.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("readmark panicked: {panic_info}");
        default_hook(panic_info);
    }));
}
