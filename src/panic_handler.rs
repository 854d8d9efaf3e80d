use std::panic;

/// Install the process panic hook.
///
/// Debug builds get `better_panic` backtraces. Release builds write a
/// `human_panic` crash report and point the user at it. Either way the
/// panic is logged first so it ends up next to the rest of the session.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .install();
    } else {
        human_panic::setup_panic!(human_panic::Metadata::new(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("Panic: {panic_info}");
        default_hook(panic_info);
        std::process::exit(1);
    }));
}
