mod api;
mod app;
mod app_runtime;
mod audio;
mod auth;
mod config;
mod config_persistence;
mod console;
mod cover_art;
mod error;
mod library;
mod model;
mod playback;
mod protocol;
mod queue;
mod session;
mod transport;

use app_runtime::AppRuntime;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    println!("{}", console::HELP_TEXT);
    AppRuntime::build()?.run()
}
