use std::time::Duration;
use thread_js_set_interval::{set_interval, set_timeout, TimerError};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), TimerError> {
    // RUST_LOG=thread_js_set_interval=debug shows when timers start and stop
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("hello1");
    // dropped handles detach the timers, as in Javascript
    let _ = set_timeout!(println!("hello2"), 1900)?;
    println!("hello3");
    let _ = set_timeout!(println!("hello4"), 0)?;
    println!("hello5");
    let interval = set_interval!(println!("hello but from interval"), 333)?;

    std::thread::sleep(Duration::from_millis(2000));
    interval.cancel();
    let count = interval.join()?;
    println!("interval fired {count} times");
    Ok(())
}
