use std::io::{self, Write};
use std::panic;

/// Install the panic hook: detailed backtraces in debug builds, a
/// crash-report message in release builds.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("panic: {panic_info}");
        let _ = io::stdout().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}
