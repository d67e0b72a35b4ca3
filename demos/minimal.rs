use std::time::Duration;
use thread_js_set_interval::{clear_interval, set_interval, set_timeout, TimerError};

fn main() -> Result<(), TimerError> {
    let timeout = set_timeout!(println!("hello from timeout"), 25)?;
    let interval = set_interval!(println!("hello from interval"), 10)?;
    let id = set_interval!(
        println!("hello from interval that will be cleared shortly"),
        5
    )?
    .detach();

    std::thread::sleep(Duration::from_millis(20));
    clear_interval(id);
    std::thread::sleep(Duration::from_millis(40));

    timeout.join()?;
    interval.cancel();
    interval.join()?;
    Ok(())
}
